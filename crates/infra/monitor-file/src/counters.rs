//! Labelled counters inside one label/value buffer pair
//!
//! Counter `k` owns a cache line at `k * COUNTER_VALUE_LENGTH` in the values
//! buffer (the value is the first 8-byte word of that line) and a label
//! record at `k * LABEL_RECORD_LENGTH` in the labels buffer:
//!
//! ```text
//! | state: i32 | type id: i32 | label: length-prefixed UTF-8 (2040 bytes) |
//! ```
//!
//! `state` flips to `RECORD_ALLOCATED` only after the rest of the record is
//! written. Records are handed out in order, so a factory created over
//! buffers that already hold counters resumes after the last allocated one.

use crate::config::NamePolicy;
use crate::error::{MonitorError, MonitorResult};
use crate::region::{IntField, StrField};
use crate::writer::check_name;
use common::{CACHE_LINE_LENGTH, SIZE_OF_INT, SIZE_OF_LONG};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, trace, warn};

/// Bytes reserved per counter in a values buffer
pub const COUNTER_VALUE_LENGTH: usize = CACHE_LINE_LENGTH;

/// Bytes reserved per counter in a labels buffer
pub const LABEL_RECORD_LENGTH: usize = 32 * COUNTER_VALUE_LENGTH;

/// Label record state of an unused slot
pub const RECORD_UNUSED: i32 = 0;

/// Label record state of a registered counter
pub const RECORD_ALLOCATED: i32 = 1;

/// Type id given to counters registered without one
pub const DEFAULT_TYPE_ID: i32 = 0;

const WORDS_PER_COUNTER: usize = COUNTER_VALUE_LENGTH / SIZE_OF_LONG;
const STATE: IntField = IntField::at(0);
const TYPE_ID: IntField = IntField::at(SIZE_OF_INT);
const LABEL: StrField = StrField::new(2 * SIZE_OF_INT, LABEL_RECORD_LENGTH - 2 * SIZE_OF_INT);

/// Largest label stored without truncation
pub const MAX_LABEL_LENGTH: usize = LABEL.capacity();

/// Reinterpret an exclusively borrowed byte buffer as atomic words
fn atomic_words(bytes: &mut [u8]) -> MonitorResult<&[AtomicI64]> {
    let address = bytes.as_ptr() as usize;
    let alignment = std::mem::align_of::<AtomicI64>();
    if address % alignment != 0 || bytes.len() % SIZE_OF_LONG != 0 {
        return Err(MonitorError::MisalignedBuffer { address, alignment });
    }

    let len = bytes.len() / SIZE_OF_LONG;
    #[allow(clippy::cast_ptr_alignment)] // alignment checked above
    let words = bytes.as_mut_ptr().cast::<AtomicI64>();
    // SAFETY: `words` is aligned for `AtomicI64` and covers exactly `len`
    // words of the borrowed buffer. `AtomicI64` has the size and in-memory
    // representation of `i64`, and every bit pattern is a valid `i64`. The
    // exclusive borrow is consumed, so the atomics are the only access path
    // for its lifetime.
    Ok(unsafe { std::slice::from_raw_parts(words, len) })
}

/// State word of label record `id`
fn record_state(labels: &[u8], id: usize) -> MonitorResult<i32> {
    STATE.read(&labels[id * LABEL_RECORD_LENGTH..])
}

/// A registered counter
///
/// A single aligned 8-byte word in the mapped file. Every operation is one
/// relaxed atomic access, so readers in other processes never observe a torn
/// value.
#[derive(Debug, Clone, Copy)]
pub struct Counter<'a> {
    id: usize,
    cell: &'a AtomicI64,
}

impl Counter<'_> {
    /// Index of the counter within its buffer pair
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Add one, returning the previous value
    #[inline]
    pub fn increment(&self) -> i64 {
        self.cell.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `delta`, returning the previous value
    #[inline]
    pub fn add(&self, delta: i64) -> i64 {
        self.cell.fetch_add(delta, Ordering::Relaxed)
    }

    /// Overwrite the value
    #[inline]
    pub fn set(&self, value: i64) {
        self.cell.store(value, Ordering::Relaxed);
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn get(&self) -> i64 {
        self.cell.load(Ordering::Relaxed)
    }
}

/// Registers counters inside one gateway or service buffer pair
#[derive(Debug)]
pub struct CountersFactory<'a> {
    labels: &'a mut [u8],
    values: &'a [AtomicI64],
    capacity: usize,
    next_id: usize,
    name_policy: NamePolicy,
}

impl<'a> CountersFactory<'a> {
    /// Factory over a labels buffer and its paired values buffer
    ///
    /// Counters already recorded in `labels` are kept; registration resumes
    /// at the first unused record.
    ///
    /// # Errors
    ///
    /// Returns `MisalignedBuffer` if `values` is not 8-byte aligned or not a
    /// whole number of words, and `CorruptHeader` if a label record holds a
    /// state no writer produces.
    pub fn new(
        labels: &'a mut [u8],
        values: &'a mut [u8],
        name_policy: NamePolicy,
    ) -> MonitorResult<Self> {
        let capacity = (labels.len() / LABEL_RECORD_LENGTH).min(values.len() / COUNTER_VALUE_LENGTH);
        let values = atomic_words(values)?;

        let mut next_id = 0;
        while next_id < capacity {
            match record_state(labels, next_id)? {
                RECORD_ALLOCATED => next_id += 1,
                RECORD_UNUSED => break,
                state => {
                    return Err(MonitorError::CorruptHeader {
                        offset: next_id * LABEL_RECORD_LENGTH,
                        details: format!("label record {next_id} has unknown state {state}"),
                    });
                }
            }
        }
        if next_id > 0 {
            debug!("Resuming counter registration after {} existing counters", next_id);
        }

        Ok(Self {
            labels,
            values,
            capacity,
            next_id,
            name_policy,
        })
    }

    /// Maximum number of counters
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered counters
    #[must_use]
    pub const fn len(&self) -> usize {
        self.next_id
    }

    /// Whether no counter has been registered
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    /// Register a counter with the default type id
    ///
    /// # Errors
    ///
    /// See [`Self::register_with_type`].
    pub fn register(&mut self, label: &str) -> MonitorResult<Counter<'a>> {
        self.register_with_type(label, DEFAULT_TYPE_ID)
    }

    /// Register a counter, writing its label record and zeroing its value
    ///
    /// # Errors
    ///
    /// Returns `CountersFull` when every record is taken and `NameTooLong`
    /// for an over-long label under the reject policy.
    pub fn register_with_type(&mut self, label: &str, type_id: i32) -> MonitorResult<Counter<'a>> {
        if self.next_id >= self.capacity {
            return Err(MonitorError::CountersFull {
                capacity: self.capacity,
            });
        }
        check_name(self.name_policy, LABEL.width(), label)?;

        let id = self.next_id;
        let cell = self.cell(id);
        let record = &mut self.labels[id * LABEL_RECORD_LENGTH..(id + 1) * LABEL_RECORD_LENGTH];
        TYPE_ID.write(record, type_id)?;
        let encoded = LABEL.write(record, label)?;
        if encoded.truncated {
            warn!(
                "Truncated counter label '{}' to {} bytes",
                label, encoded.written
            );
        }

        cell.store(0, Ordering::Relaxed);
        STATE.write(record, RECORD_ALLOCATED)?;

        self.next_id += 1;
        trace!("Registered counter {} '{}'", id, label);
        Ok(Counter { id, cell })
    }

    /// Handle to counter `id`, registered by this or an earlier factory
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an id that was never registered.
    pub fn counter(&self, id: usize) -> MonitorResult<Counter<'a>> {
        self.check_registered(id)?;
        Ok(Counter {
            id,
            cell: self.cell(id),
        })
    }

    fn cell(&self, id: usize) -> &'a AtomicI64 {
        let values: &'a [AtomicI64] = self.values;
        &values[id * WORDS_PER_COUNTER]
    }

    fn check_registered(&self, id: usize) -> MonitorResult<()> {
        if id >= self.next_id {
            return Err(MonitorError::CapacityExceeded {
                requested: id,
                capacity: self.next_id,
            });
        }
        Ok(())
    }

    /// Label of counter `id`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an id that was never registered.
    pub fn label(&self, id: usize) -> MonitorResult<&str> {
        self.check_registered(id)?;
        let record = &self.labels[id * LABEL_RECORD_LENGTH..(id + 1) * LABEL_RECORD_LENGTH];
        LABEL.read(record)
    }

    /// Iterate over `(id, label)` for every registered counter
    pub fn labels(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        (0..self.next_id).filter_map(move |id| self.label(id).ok().map(|label| (id, label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memmap2::MmapMut;

    fn mapping(counters: usize) -> MmapMut {
        MmapMut::map_anon(counters * (LABEL_RECORD_LENGTH + COUNTER_VALUE_LENGTH)).unwrap()
    }

    fn factory(map: &mut MmapMut, policy: NamePolicy) -> CountersFactory<'_> {
        let split = map.len() / (LABEL_RECORD_LENGTH + COUNTER_VALUE_LENGTH) * LABEL_RECORD_LENGTH;
        let (labels, values) = map.split_at_mut(split);
        CountersFactory::new(labels, values, policy).unwrap()
    }

    #[test]
    fn test_register_and_update() {
        let mut map = mapping(4);
        let mut counters = factory(&mut map, NamePolicy::Truncate);
        assert_eq!(counters.capacity(), 4);
        assert!(counters.is_empty());

        let sessions = counters.register("current-sessions").unwrap();
        let bytes = counters.register_with_type("bytes-read", 7).unwrap();
        assert_eq!(sessions.id(), 0);
        assert_eq!(bytes.id(), 1);

        assert_eq!(sessions.increment(), 0);
        assert_eq!(sessions.increment(), 1);
        assert_eq!(bytes.add(512), 0);
        bytes.set(100);

        assert_eq!(sessions.get(), 2);
        assert_eq!(bytes.get(), 100);
        assert_eq!(counters.label(1).unwrap(), "bytes-read");
        assert_eq!(
            counters.labels().collect::<Vec<_>>(),
            vec![(0, "current-sessions"), (1, "bytes-read")]
        );
    }

    #[test]
    fn test_records_land_at_fixed_offsets() {
        let mut map = mapping(2);
        {
            let mut counters = factory(&mut map, NamePolicy::Truncate);
            let counter = counters.register_with_type("errors", 3).unwrap();
            counters.register("second").unwrap().set(-5);
            counter.set(0x0102_0304_0506_0708);
        }

        let labels_end = 2 * LABEL_RECORD_LENGTH;
        assert_eq!(STATE.read(&map).unwrap(), RECORD_ALLOCATED);
        assert_eq!(TYPE_ID.read(&map).unwrap(), 3);
        assert_eq!(LABEL.read(&map).unwrap(), "errors");
        assert_eq!(
            STATE.read(&map[LABEL_RECORD_LENGTH..]).unwrap(),
            RECORD_ALLOCATED
        );
        assert_eq!(
            &map[labels_end..labels_end + SIZE_OF_LONG],
            &0x0102_0304_0506_0708i64.to_ne_bytes()
        );
        let second = labels_end + COUNTER_VALUE_LENGTH;
        assert_eq!(&map[second..second + SIZE_OF_LONG], &(-5i64).to_ne_bytes());
    }

    #[test]
    fn test_register_resets_stale_value() {
        let mut map = mapping(1);
        let split = LABEL_RECORD_LENGTH;
        map[split..split + SIZE_OF_LONG].copy_from_slice(&42i64.to_ne_bytes());

        let mut counters = factory(&mut map, NamePolicy::Truncate);
        assert_eq!(counters.register("fresh").unwrap().get(), 0);
    }

    #[test]
    fn test_factory_full() {
        let mut map = mapping(2);
        let mut counters = factory(&mut map, NamePolicy::Truncate);
        counters.register("a").unwrap();
        counters.register("b").unwrap();

        assert!(matches!(
            counters.register("c"),
            Err(MonitorError::CountersFull { capacity: 2 })
        ));
        assert_eq!(counters.len(), 2);
    }

    #[test]
    fn test_label_policy() {
        let long_label = "x".repeat(MAX_LABEL_LENGTH + 1);

        let mut map = mapping(1);
        let mut counters = factory(&mut map, NamePolicy::Truncate);
        let counter = counters.register(&long_label).unwrap();
        assert_eq!(counters.label(counter.id()).unwrap().len(), MAX_LABEL_LENGTH);

        let mut map = mapping(1);
        let mut counters = factory(&mut map, NamePolicy::Reject);
        assert!(matches!(
            counters.register(&long_label),
            Err(MonitorError::NameTooLong { .. })
        ));
        assert!(counters.is_empty());
    }

    #[test]
    fn test_unregistered_label_lookup() {
        let mut map = mapping(1);
        let counters = factory(&mut map, NamePolicy::Truncate);
        assert!(counters.label(0).is_err());
    }

    #[test]
    fn test_misaligned_values_buffer() {
        let mut map = mapping(1);
        let (labels, values) = map.split_at_mut(LABEL_RECORD_LENGTH + 1);
        assert!(matches!(
            CountersFactory::new(labels, values, NamePolicy::Truncate),
            Err(MonitorError::MisalignedBuffer { .. })
        ));
    }

    #[test]
    fn test_counters_shared_across_threads() {
        let mut map = mapping(2);
        let mut counters = factory(&mut map, NamePolicy::Truncate);
        let hits = counters.register("hits").unwrap();
        let misses = counters.register("misses").unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        hits.increment();
                        misses.add(2);
                    }
                });
            }
        });

        assert_eq!(hits.get(), 4000);
        assert_eq!(misses.get(), 8000);
    }

    #[test]
    fn test_new_factory_resumes_after_existing_counters() {
        let mut map = mapping(4);
        {
            let mut counters = factory(&mut map, NamePolicy::Truncate);
            counters.register("sessions").unwrap().add(42);
            counters.register("errors").unwrap().set(3);
        }

        let mut counters = factory(&mut map, NamePolicy::Truncate);
        assert_eq!(counters.len(), 2);
        assert_eq!(counters.label(0).unwrap(), "sessions");
        assert_eq!(counters.counter(0).unwrap().get(), 42);
        assert_eq!(counters.counter(1).unwrap().get(), 3);

        let drops = counters.register("drops").unwrap();
        assert_eq!(drops.id(), 2);
        assert_eq!(counters.counter(0).unwrap().get(), 42);
        assert_eq!(
            counters.labels().map(|(_, label)| label).collect::<Vec<_>>(),
            vec!["sessions", "errors", "drops"]
        );
        assert!(counters.counter(3).is_err());
    }

    #[test]
    fn test_full_buffer_stays_full_across_factories() {
        let mut map = mapping(1);
        factory(&mut map, NamePolicy::Truncate).register("only").unwrap();

        let mut counters = factory(&mut map, NamePolicy::Truncate);
        assert!(matches!(
            counters.register("another"),
            Err(MonitorError::CountersFull { capacity: 1 })
        ));
    }

    #[test]
    fn test_unknown_record_state_is_corrupt() {
        let mut map = mapping(2);
        STATE.write(&mut map[LABEL_RECORD_LENGTH..], 7).unwrap();
        STATE.write(&mut map, RECORD_ALLOCATED).unwrap();

        let split = 2 * LABEL_RECORD_LENGTH;
        let (labels, values) = map.split_at_mut(split);
        assert!(matches!(
            CountersFactory::new(labels, values, NamePolicy::Truncate),
            Err(MonitorError::CorruptHeader { offset, .. }) if offset == LABEL_RECORD_LENGTH
        ));
    }

    #[test]
    fn test_values_buffer_must_be_whole_words() {
        let mut map = mapping(1);
        let (labels, values) = map.split_at_mut(LABEL_RECORD_LENGTH);
        let values_len = values.len();
        assert!(matches!(
            CountersFactory::new(labels, &mut values[..values_len - 4], NamePolicy::Truncate),
            Err(MonitorError::MisalignedBuffer { alignment: 8, .. })
        ));
    }
}
