use std::{
    borrow::Borrow,
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{BuildHasher, BuildHasherDefault, Hash},
    iter::{self, FusedIterator},
    mem, slice,
    sync::atomic::{AtomicU64, Ordering},
    vec,
};

use log::{debug, trace};

use crate::error::{CapacityError, IterError};

/// Initial number of slots used by [`ProbeHashTable::new`]
pub const DEFAULT_CAPACITY: usize = 10;

/// Hasher builder used when the caller does not supply one
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

/// Source of table identities handed to cursors
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

/// A stored key-value pair. `set` writes a new entry rather than updating this one.
#[derive(Debug, Clone)]
struct Entry<K, V> {
    /// The key of the pair
    key: K,
    /// The value associated with the key
    value: V,
}

/// One position of the backing array
#[derive(Debug, Clone)]
enum Slot<K, V> {
    /// Never used since the last grow or clear; terminates a probe
    Empty,
    /// Tombstone left by a removal; probes walk past it
    Deleted,
    /// Holds a live entry
    Occupied(Entry<K, V>),
}

impl<K, V> Slot<K, V> {
    /// Returns the live entry in this slot, if any
    fn entry(&self) -> Option<&Entry<K, V>> {
        match self {
            Self::Occupied(entry) => Some(entry),
            Self::Empty | Self::Deleted => None,
        }
    }
}

/// Where an insertion probe ended
enum Probe {
    /// The key already lives at this position
    Match(usize),
    /// The key is absent and may be written at this position
    Vacant(usize),
    /// Every slot on the chain holds a different key
    Full,
}

/// Allocates `len` empty slots
fn empty_slots<K, V>(len: usize) -> Box<[Slot<K, V>]> {
    iter::repeat_with(|| Slot::Empty).take(len).collect()
}

/// Maps a hash onto the slot range `0..len`
#[allow(clippy::cast_possible_truncation)]
fn home_slot(hash: u64, len: usize) -> usize {
    (hash as usize).checked_rem(len).unwrap_or(0)
}

/// The position after `position`, wrapping around at `len`
fn next_slot(position: usize, len: usize) -> usize {
    let next = position.saturating_add(1);
    if next >= len { 0 } else { next }
}

/// A hash table using open addressing with linear probing.
///
/// Every entry lives directly in the backing array. A key is stored at its home slot
/// (`hash mod capacity`) or at the first free slot after it, wrapping around at the end of the
/// array. The table only grows when an insertion walks the whole array without finding a free
/// slot or its key, in which case the capacity doubles. Capacity never shrinks.
///
/// Removed entries leave a tombstone so that keys further along the same probe chain stay
/// reachable. Tombstones are reused by later insertions and discarded on grow and clear.
///
/// Note: This implementation is not thread-safe.
pub struct ProbeHashTable<K, V, S = DefaultHashBuilder> {
    /// The backing array
    slots: Box<[Slot<K, V>]>,
    /// Number of live entries
    len: usize,
    /// Bumped on every structural change; checked by cursors
    mod_count: u64,
    /// Builds the hasher used for keys
    hash_builder: S,
    /// Identity checked by cursors; unique per table, clones included
    id: u64,
}

impl<K: Clone, V: Clone, S: Clone> Clone for ProbeHashTable<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            len: self.len,
            mod_count: self.mod_count,
            hash_builder: self.hash_builder.clone(),
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<K, V> ProbeHashTable<K, V, DefaultHashBuilder> {
    /// Creates an empty table with [`DEFAULT_CAPACITY`] slots
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with `capacity` slots
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Zero`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S: Default> Default for ProbeHashTable<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> ProbeHashTable<K, V, S> {
    /// Creates an empty table with [`DEFAULT_CAPACITY`] slots and the given hasher builder
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::from_parts(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty table with `capacity` slots and the given hasher builder
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Zero`] if `capacity` is zero.
    pub fn with_capacity_and_hasher(
        capacity: usize,
        hash_builder: S,
    ) -> Result<Self, CapacityError> {
        if capacity == 0 {
            debug!("rejecting probe table with zero capacity");
            return Err(CapacityError::Zero);
        }
        Ok(Self::from_parts(capacity, hash_builder))
    }

    /// Builds the table; `capacity` must be non-zero
    fn from_parts(capacity: usize, hash_builder: S) -> Self {
        Self {
            slots: empty_slots(capacity),
            len: 0,
            mod_count: 0,
            hash_builder,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the number of entries in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the table holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots in the backing array
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns a reference to the table's hasher builder
    #[must_use]
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes every entry. The capacity is kept.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        trace!("cleared probe table ({} live entries dropped)", self.len);
        self.len = 0;
        self.touch();
    }

    /// Returns an iterator over the entries in slot order
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { slots: self.slots.iter(), remaining: self.len }
    }

    /// Returns an iterator over the keys in slot order
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values in slot order
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns a fail-fast cursor positioned before the first entry.
    ///
    /// Unlike [`iter`](Self::iter), the cursor does not borrow the table, so the table may be
    /// modified between steps. Any such modification makes the next
    /// [`try_next`](Cursor::try_next) fail with [`IterError::ConcurrentModification`].
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor { table_id: self.id, position: 0, expected_mod_count: self.mod_count }
    }

    /// Records a structural change
    fn touch(&mut self) {
        self.mod_count = self.mod_count.wrapping_add(1);
    }
}

impl<K, V, S> ProbeHashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Associates `value` with `key`, returning the previous value if the key was present.
    ///
    /// Doubles the capacity when the probe from the key's home slot wraps all the way around
    /// without finding the key, a free slot, or a tombstone.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_builder.hash_one(&key);
        loop {
            match self.probe_insert(hash, &key) {
                Probe::Match(position) => {
                    let slot = self.slots.get_mut(position)?;
                    let previous = mem::replace(slot, Slot::Occupied(Entry { key, value }));
                    self.touch();
                    return match previous {
                        Slot::Occupied(entry) => Some(entry.value),
                        Slot::Empty | Slot::Deleted => None,
                    };
                }
                Probe::Vacant(position) => {
                    let slot = self.slots.get_mut(position)?;
                    *slot = Slot::Occupied(Entry { key, value });
                    self.len = self.len.saturating_add(1);
                    self.touch();
                    return None;
                }
                Probe::Full => self.grow(),
            }
        }
    }

    /// Returns a reference to the value stored for `key`
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let position = self.find(key)?;
        self.slots.get(position)?.entry().map(|entry| &entry.value)
    }

    /// Returns a mutable reference to the value stored for `key`.
    ///
    /// Writing through it changes no structure, so open cursors stay valid.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let position = self.find(key)?;
        match self.slots.get_mut(position)? {
            Slot::Occupied(entry) => Some(&mut entry.value),
            Slot::Empty | Slot::Deleted => None,
        }
    }

    /// Returns true if the table holds an entry for `key`
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Removes `key` from the table, returning its value if it was present
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let position = self.find(key)?;
        let slot = self.slots.get_mut(position)?;
        match mem::replace(slot, Slot::Deleted) {
            Slot::Occupied(entry) => {
                self.len = self.len.saturating_sub(1);
                self.touch();
                Some(entry.value)
            }
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Finds the position holding `key`.
    ///
    /// Stops at the first empty slot or after one full cycle, so a dense table never loops.
    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let len = self.slots.len();
        let mut position = home_slot(self.hash_builder.hash_one(key), len);
        for _ in 0..len {
            match self.slots.get(position)? {
                Slot::Empty => return None,
                Slot::Deleted => {}
                Slot::Occupied(entry) => {
                    if entry.key.borrow() == key {
                        return Some(position);
                    }
                }
            }
            position = next_slot(position, len);
        }
        None
    }

    /// Walks the chain of `key` looking for it, remembering the first reusable tombstone
    fn probe_insert(&self, hash: u64, key: &K) -> Probe {
        let len = self.slots.len();
        let mut position = home_slot(hash, len);
        let mut first_deleted = None;
        for _ in 0..len {
            match self.slots.get(position) {
                None => break,
                Some(Slot::Empty) => return Probe::Vacant(first_deleted.unwrap_or(position)),
                Some(Slot::Deleted) => {
                    if first_deleted.is_none() {
                        first_deleted = Some(position);
                    }
                }
                Some(Slot::Occupied(entry)) => {
                    if entry.key == *key {
                        return Probe::Match(position);
                    }
                }
            }
            position = next_slot(position, len);
        }
        first_deleted.map_or(Probe::Full, Probe::Vacant)
    }

    /// Doubles the capacity and re-places every live entry
    fn grow(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = old_capacity.saturating_mul(2);
        trace!(
            "growing probe table from {old_capacity} to {new_capacity} slots ({} live entries)",
            self.len
        );

        let old_slots = mem::replace(&mut self.slots, empty_slots(new_capacity));
        for slot in old_slots.into_vec() {
            if let Slot::Occupied(entry) = slot {
                let hash = self.hash_builder.hash_one(&entry.key);
                self.place(hash, entry);
            }
        }
        self.touch();
    }

    /// Writes `entry` into the first empty slot of its chain. Keys are already distinct.
    fn place(&mut self, hash: u64, entry: Entry<K, V>) {
        let len = self.slots.len();
        let mut position = home_slot(hash, len);
        for _ in 0..len {
            if matches!(self.slots.get(position), Some(Slot::Empty)) {
                break;
            }
            position = next_slot(position, len);
        }
        if let Some(slot) = self.slots.get_mut(position) {
            *slot = Slot::Occupied(entry);
        }
    }
}

impl<K, V, S> fmt::Debug for ProbeHashTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Renders the live entries in slot order, e.g. `[(key=1,value=a),(key=2,value=b)]`
impl<K, V, S> fmt::Display for ProbeHashTable<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "(key={key},value={value})")?;
        }
        f.write_str("]")
    }
}

impl<K, V, S> Extend<(K, V)> for ProbeHashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for ProbeHashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::default();
        table.extend(iter);
        table
    }
}

impl<'a, K, V, S> IntoIterator for &'a ProbeHashTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> IntoIterator for ProbeHashTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { slots: self.slots.into_vec().into_iter(), remaining: self.len }
    }
}

/// Iterator over the entries of a table, in slot order
#[derive(Debug, Clone)]
pub struct Iter<'a, K, V> {
    /// Slots not yet visited
    slots: slice::Iter<'a, Slot<K, V>>,
    /// Live entries not yet yielded
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.by_ref().find_map(Slot::entry)?;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over the keys of a table, in slot order
#[derive(Debug, Clone)]
pub struct Keys<'a, K, V> {
    /// Entry iterator the keys are taken from
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over the values of a table, in slot order
#[derive(Debug, Clone)]
pub struct Values<'a, K, V> {
    /// Entry iterator the values are taken from
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Owning iterator over the entries of a table, in slot order
#[derive(Debug)]
pub struct IntoIter<K, V> {
    /// Slots not yet visited
    slots: vec::IntoIter<Slot<K, V>>,
    /// Live entries not yet yielded
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.by_ref().find_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            Slot::Empty | Slot::Deleted => None,
        })?;
        self.remaining = self.remaining.saturating_sub(1);
        Some((entry.key, entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

/// A fail-fast position within a [`ProbeHashTable`].
///
/// The cursor remembers the table's modification count at creation. Each call to
/// [`try_next`](Self::try_next) compares it against the table it is given and refuses to
/// continue once they differ. It also remembers which table created it and rejects any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Identity of the table that created the cursor
    table_id: u64,
    /// Next slot to examine
    position: usize,
    /// Modification count of the table when the cursor was created
    expected_mod_count: u64,
}

impl Cursor {
    /// Returns true if another entry follows the cursor's position.
    ///
    /// Always false for a table other than the one that created the cursor.
    #[must_use]
    pub fn has_next<K, V, S>(&self, table: &ProbeHashTable<K, V, S>) -> bool {
        table.id == self.table_id
            && table.slots.iter().skip(self.position).any(|slot| slot.entry().is_some())
    }

    /// Advances to the next entry and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`IterError::ForeignTable`] if `table` did not create this cursor,
    /// [`IterError::ConcurrentModification`] if `table` was structurally modified since the
    /// cursor was created, and [`IterError::OutOfElements`] if no entry remains.
    pub fn try_next<'t, K, V, S>(
        &mut self,
        table: &'t ProbeHashTable<K, V, S>,
    ) -> Result<(&'t K, &'t V), IterError> {
        if table.id != self.table_id {
            return Err(IterError::ForeignTable);
        }
        if table.mod_count != self.expected_mod_count {
            return Err(IterError::ConcurrentModification {
                expected: self.expected_mod_count,
                found: table.mod_count,
            });
        }

        let next = table
            .slots
            .iter()
            .enumerate()
            .skip(self.position)
            .find_map(|(position, slot)| slot.entry().map(|entry| (position, entry)));
        if let Some((position, entry)) = next {
            self.position = position.saturating_add(1);
            Ok((&entry.key, &entry.value))
        } else {
            self.position = table.slots.len();
            Err(IterError::OutOfElements)
        }
    }
}
