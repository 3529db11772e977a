use crate::signal::Sample;
use std::num::NonZeroUsize;

/// Fixed-capacity ring of the most recent samples.
///
/// Storage is allocated once; pushing into a full buffer overwrites the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Vec<Sample>,
    capacity: usize,
    /// Index of the oldest sample once the buffer has wrapped.
    head: usize,
}

impl SampleBuffer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        if self.data.len() < self.capacity {
            self.data.push(sample);
        } else {
            self.data[self.head] = sample;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn latest(&self) -> Option<&Sample> {
        if self.data.is_empty() {
            return None;
        }
        let idx = if self.head == 0 {
            self.data.len() - 1
        } else {
            self.head - 1
        };
        self.data.get(idx)
    }

    /// Contents as two slices, oldest first.
    pub fn as_slices(&self) -> (&[Sample], &[Sample]) {
        let (newer, older) = self.data.split_at(self.head);
        (older, newer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        let (older, newer) = self.as_slices();
        older.iter().chain(newer.iter())
    }

    /// Ordered copy of the buffer, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.data.len());
        self.copy_into(&mut out);
        out
    }

    /// Like [`SampleBuffer::snapshot`] but reuses the caller's allocation.
    pub fn copy_into(&self, out: &mut Vec<Sample>) {
        out.clear();
        let (older, newer) = self.as_slices();
        out.extend_from_slice(older);
        out.extend_from_slice(newer);
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}
