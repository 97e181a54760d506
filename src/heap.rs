//! Array-backed max-heap of task records.
//!
//! The heap is a pure data structure: every operation assumes the caller
//! already holds the scheduler lock, and none of them blocks or notifies.
//! Ordering follows the record's current priority; ties go to the earliest
//! arrival, then to the lowest sequence number, so equal-priority work runs
//! in submission order.

use std::cmp::Ordering;

use crate::task::TaskRecord;

/// True if `a` must be dispatched before `b`.
pub(crate) fn dispatches_before(a: &TaskRecord, b: &TaskRecord) -> bool {
    match a.current_priority().cmp(&b.current_priority()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match a.arrival_time().cmp(&b.arrival_time()) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.sequence() < b.sequence(),
        },
    }
}

#[derive(Debug, Default)]
pub struct PriorityHeap {
    records: Vec<TaskRecord>,
}

impl PriorityHeap {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the record that `extract_max` would return next.
    pub fn peek(&self) -> Option<&TaskRecord> {
        self.records.first()
    }

    /// Place a record at the end and sift it up. O(log n).
    pub fn insert(&mut self, record: TaskRecord) {
        self.records.push(record);
        self.sift_up(self.records.len() - 1);
    }

    /// Remove and return the highest-priority record. O(log n).
    pub fn extract_max(&mut self) -> Option<TaskRecord> {
        if self.records.is_empty() {
            return None;
        }
        let last = self.records.len() - 1;
        self.records.swap(0, last);
        let record = self.records.pop();
        if !self.records.is_empty() {
            self.sift_down(0);
        }
        record
    }

    /// Re-establish the heap property after current priorities were mutated
    /// in place. O(n) bottom-up heapify.
    pub fn rebuild(&mut self) {
        for index in (0..self.records.len() / 2).rev() {
            self.sift_down(index);
        }
    }

    /// Remove every record, in no particular order. Used at teardown.
    pub fn take_all(&mut self) -> Vec<TaskRecord> {
        std::mem::take(&mut self.records)
    }

    /// Mutable sweep over all records for the aging pass. Mutating a
    /// priority through this iterator invalidates the heap property until
    /// [`PriorityHeap::rebuild`] runs.
    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut TaskRecord> {
        self.records.iter_mut()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if dispatches_before(&self.records[index], &self.records[parent]) {
                self.records.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.records.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut top = index;
            if left < len && dispatches_before(&self.records[left], &self.records[top]) {
                top = left;
            }
            if right < len && dispatches_before(&self.records[right], &self.records[top]) {
                top = right;
            }
            if top == index {
                break;
            }
            self.records.swap(index, top);
            index = top;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn record(priority: i64, name: &str) -> TaskRecord {
        TaskRecord::new(priority, Some(name.to_string()), || {})
    }

    fn assert_heap_valid(heap: &PriorityHeap) {
        for index in 1..heap.records.len() {
            let parent = (index - 1) / 2;
            assert!(
                !dispatches_before(&heap.records[index], &heap.records[parent]),
                "heap property violated between {parent} and {index}"
            );
        }
    }

    fn drain_names(heap: &mut PriorityHeap) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(record) = heap.extract_max() {
            assert_heap_valid(heap);
            names.push(record.name().unwrap().to_string());
        }
        names
    }

    #[test]
    fn extract_follows_priority_order() {
        let mut heap = PriorityHeap::new();
        for (priority, name) in [(10, "low"), (50, "mid"), (99, "high"), (30, "mid-low")] {
            heap.insert(record(priority, name));
            assert_heap_valid(&heap);
        }
        assert_eq!(drain_names(&mut heap), vec!["high", "mid", "mid-low", "low"]);
    }

    #[test]
    fn extract_on_empty_heap_is_none() {
        let mut heap = PriorityHeap::new();
        assert!(heap.extract_max().is_none());
        assert!(heap.is_empty());
    }

    #[test]
    fn equal_priority_breaks_ties_by_arrival() {
        let base = Instant::now();
        let mut early = record(5, "early");
        let mut late = record(5, "late");
        early.set_arrival(base);
        late.set_arrival(base + Duration::from_millis(1));

        let mut heap = PriorityHeap::new();
        heap.insert(late);
        heap.insert(early);
        assert_eq!(drain_names(&mut heap), vec!["early", "late"]);
    }

    #[test]
    fn identical_arrivals_fall_back_to_sequence() {
        let base = Instant::now();
        let mut first = record(5, "first");
        let mut second = record(5, "second");
        first.set_arrival(base);
        second.set_arrival(base);

        let mut heap = PriorityHeap::new();
        heap.insert(second);
        heap.insert(first);
        assert_eq!(drain_names(&mut heap), vec!["first", "second"]);
    }

    #[test]
    fn rebuild_restores_order_after_external_promotion() {
        let mut heap = PriorityHeap::new();
        heap.insert(record(10, "aged"));
        heap.insert(record(50, "mid"));
        heap.insert(record(60, "top"));

        for queued in heap.records_mut() {
            if queued.name() == Some("aged") {
                queued.promote_to(99);
            }
        }
        heap.rebuild();
        assert_heap_valid(&heap);
        assert_eq!(heap.peek().unwrap().name(), Some("aged"));
        assert_eq!(drain_names(&mut heap), vec!["aged", "top", "mid"]);
    }

    #[test]
    fn interleaved_inserts_and_extracts_keep_heap_valid() {
        let mut heap = PriorityHeap::new();
        for step in 0..40i64 {
            heap.insert(record((step * 17) % 23, "task"));
            assert_heap_valid(&heap);
            if step % 3 == 0 {
                heap.extract_max();
                assert_heap_valid(&heap);
            }
        }
        let mut previous = i64::MAX;
        while let Some(next) = heap.extract_max() {
            assert!(next.current_priority() <= previous);
            previous = next.current_priority();
        }
    }

    #[test]
    fn take_all_empties_the_heap() {
        let mut heap = PriorityHeap::new();
        heap.insert(record(1, "a"));
        heap.insert(record(2, "b"));
        let drained = heap.take_all();
        assert_eq!(drained.len(), 2);
        assert!(heap.is_empty());
    }
}
