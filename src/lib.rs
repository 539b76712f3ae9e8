//! # Probe Table
//!
//! A Rust implementation of an open-addressing hash table with linear probing.
//!
//! `ProbeHashTable` keeps every entry directly in a flat array of slots. Collisions are
//! resolved by scanning forward from the key's home slot, and the array doubles in size only
//! when an insertion finds its whole chain occupied.
//!
//! Two ways of walking a table are offered:
//!
//! - [`ProbeHashTable::iter`]: a borrowing iterator. The borrow checker rules out mutation
//!   while it is alive.
//! - [`ProbeHashTable::cursor`]: a fail-fast [`Cursor`] that holds no borrow. Mutating the
//!   table between steps is allowed, but the next step reports
//!   [`IterError::ConcurrentModification`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use probe_table::ProbeHashTable;
//!
//! // Create a new table
//! let mut table = ProbeHashTable::new();
//!
//! // Insert values
//! table.set("apple".to_string(), 1);
//! table.set("banana".to_string(), 2);
//!
//! // Retrieve values
//! assert_eq!(table.get("apple"), Some(&1));
//!
//! // Update values
//! table.set("apple".to_string(), 10);
//! assert_eq!(table.get("apple"), Some(&10));
//!
//! // Remove values
//! assert_eq!(table.remove("apple"), Some(10));
//! assert_eq!(table.get("apple"), None);
//! assert_eq!(table.len(), 1);
//! ```
//!
//! ## Fail-fast Iteration
//!
//! ```rust
//! use probe_table::{IterError, ProbeHashTable};
//!
//! let mut table = ProbeHashTable::with_capacity(1).unwrap();
//! table.set(1, "a");
//! table.set(2, "b");
//!
//! let mut cursor = table.cursor();
//! assert!(cursor.try_next(&table).is_ok());
//!
//! table.remove(&2);
//! assert!(matches!(
//!     cursor.try_next(&table),
//!     Err(IterError::ConcurrentModification { .. })
//! ));
//! ```

/// Error types for table construction and cursors
mod error;
/// Module implementing the linear-probing hash table
mod probe_table;

pub use error::{CapacityError, IterError};
pub use probe_table::{
    Cursor, DEFAULT_CAPACITY, DefaultHashBuilder, IntoIter, Iter, Keys, ProbeHashTable, Values,
};
