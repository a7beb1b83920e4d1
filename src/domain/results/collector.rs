use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::results::records::{RequestRecord, RunSummary};

#[derive(Debug, Default)]
struct CollectorState {
    records: Vec<RequestRecord>,
    next_sequence: u64,
    summaries: Vec<RunSummary>,
}

/// Thread-safe sink for request records and run summaries.
///
/// Records are kept in completion order: whichever worker takes the lock
/// first is recorded first. The same lock hands out start and completion
/// sequence numbers, so the two are directly comparable within an iteration.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    state: Arc<Mutex<CollectorState>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CollectorState> {
        // A panicking worker cannot leave the vectors half-written, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves the next event number. Called by a worker right before it issues its call.
    pub fn next_sequence(&self) -> u64 {
        let mut state = self.state();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        sequence
    }

    /// Appends a completed call and stamps its completion sequence number.
    pub fn record(&self, mut record: RequestRecord) {
        let mut state = self.state();
        record.completion_sequence = state.next_sequence;
        state.next_sequence += 1;
        state.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands out everything recorded since the last take and starts a new iteration.
    pub fn take_iteration(&self) -> IterationResults {
        let mut state = self.state();
        state.next_sequence = 0;
        IterationResults { records: std::mem::take(&mut state.records) }
    }

    /// Drops the records of a cancelled iteration.
    pub fn discard_iteration(&self) -> usize {
        let discarded = self.take_iteration().len();
        if discarded > 0 {
            log::info!("Discarded {} request records of an incomplete iteration.", discarded);
        }
        discarded
    }

    pub fn push_summary(&self, summary: RunSummary) {
        self.state().summaries.push(summary);
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.state().summaries.clone()
    }
}

/// The request records of one iteration, in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationResults {
    records: Vec<RequestRecord>,
}

impl IterationResults {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RequestRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[RequestRecord] {
        &self.records
    }

    pub fn failed(&self) -> impl Iterator<Item = &RequestRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    pub fn by_hit_index(&self, hit_index: usize) -> Option<&RequestRecord> {
        self.records.iter().find(|r| r.hit_index == hit_index)
    }
}

impl IntoIterator for IterationResults {
    type Item = RequestRecord;
    type IntoIter = std::vec::IntoIter<RequestRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a IterationResults {
    type Item = &'a RequestRecord;
    type IntoIter = std::slice::Iter<'a, RequestRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    fn record(hit_index: usize, status_code: u16) -> RequestRecord {
        RequestRecord {
            hit_index,
            url: format!("http://localhost/{}", hit_index),
            status_code,
            header_duration: Duration::ZERO,
            body_duration: Duration::ZERO,
            started_at: Duration::ZERO,
            completed_at: Duration::ZERO,
            start_sequence: 0,
            completion_sequence: 0,
            error: None,
        }
    }

    #[test]
    fn concurrent_records_are_neither_lost_nor_duplicated() {
        let collector = ResultCollector::new();
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let collector = collector.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        collector.record(record(worker * 100 + i, 200));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let results = collector.take_iteration();
        assert_eq!(results.len(), 800);

        let hit_indices: HashSet<usize> = results.iter().map(|r| r.hit_index).collect();
        assert_eq!(hit_indices.len(), 800);

        // Completion sequence follows insertion order.
        let sequences: Vec<u64> = results.iter().map(|r| r.completion_sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn take_iteration_resets_for_the_next_iteration() {
        let collector = ResultCollector::new();
        collector.next_sequence();
        collector.record(record(0, 200));
        collector.record(record(1, 503));

        let first = collector.take_iteration();
        assert_eq!(first.len(), 2);
        assert_eq!(first.failed().count(), 1);
        assert_eq!(first.by_hit_index(1).unwrap().completion_sequence, 2);
        // Restartable: iterating twice yields the same sequence.
        assert_eq!(first.iter().count(), first.iter().count());

        assert!(collector.is_empty());
        collector.record(record(0, 200));
        assert_eq!(collector.take_iteration().by_hit_index(0).unwrap().completion_sequence, 0);
    }

    #[test]
    fn discard_drops_partial_iteration() {
        let collector = ResultCollector::new();
        collector.record(record(0, 200));
        assert_eq!(collector.discard_iteration(), 1);
        assert!(collector.take_iteration().is_empty());
    }
}
