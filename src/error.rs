//! Error types returned by `ProbeHashTable` and its cursor

use thiserror::Error;

/// Errors raised while constructing a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    /// The requested initial capacity was zero
    #[error("capacity must be greater than zero")]
    Zero,
}

/// Errors raised while advancing a [`Cursor`](crate::Cursor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IterError {
    /// The table was structurally modified after the cursor was created
    #[error("table was modified during iteration (expected modification count {expected}, found {found})")]
    ConcurrentModification {
        /// Modification count captured when the cursor was created
        expected: u64,
        /// Modification count observed on the table
        found: u64,
    },
    /// The cursor was advanced against a table other than the one that created it
    #[error("cursor belongs to a different table")]
    ForeignTable,
    /// The cursor was advanced past its last entry
    #[error("no more elements to iterate")]
    OutOfElements,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(CapacityError::Zero.to_string(), "capacity must be greater than zero");
        assert_eq!(
            IterError::ConcurrentModification { expected: 3, found: 5 }.to_string(),
            "table was modified during iteration (expected modification count 3, found 5)"
        );
        assert_eq!(IterError::OutOfElements.to_string(), "no more elements to iterate");
        assert_eq!(IterError::ForeignTable.to_string(), "cursor belongs to a different table");
    }
}
