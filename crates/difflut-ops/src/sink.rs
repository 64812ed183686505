//! Destinations for scattered gradient contributions.
//!
//! The scatter kernel is written once against [`GradientSink`]; the
//! strategy decides which sink it gets. A plain slice is used when one
//! thread owns the buffer, [`AtomicBuffer`] when many threads share it.

use std::sync::atomic::{AtomicU32, Ordering};

/// Receives `value` additions at flat grid indices.
pub trait GradientSink {
    /// Adds `value` to the cell at `index`.
    fn add(&mut self, index: usize, value: f32);
}

impl GradientSink for [f32] {
    #[inline]
    fn add(&mut self, index: usize, value: f32) {
        self[index] += value;
    }
}

impl GradientSink for Vec<f32> {
    #[inline]
    fn add(&mut self, index: usize, value: f32) {
        self[index] += value;
    }
}

/// A grid-sized buffer of `f32` cells that can be added to concurrently.
///
/// Each cell stores the bit pattern of an `f32` in an [`AtomicU32`]; adds
/// retry a compare-exchange until no other thread raced them.
pub struct AtomicBuffer {
    cells: Vec<AtomicU32>,
}

impl AtomicBuffer {
    /// Creates a zeroed buffer of `len` cells.
    pub fn zeros(len: usize) -> Self {
        // 0u32 is the bit pattern of +0.0f32.
        Self {
            cells: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Atomically adds `value` to cell `index`.
    #[inline]
    pub fn fetch_add(&self, index: usize, value: f32) {
        let cell = &self.cells[index];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// A per-thread handle implementing [`GradientSink`].
    #[inline]
    pub fn sink(&self) -> AtomicSink<'_> {
        AtomicSink { buffer: self }
    }

    /// Consumes the buffer and returns the plain values.
    pub fn into_values(self) -> Vec<f32> {
        self.cells
            .into_iter()
            .map(|cell| f32::from_bits(cell.into_inner()))
            .collect()
    }
}

/// Shared-reference sink over an [`AtomicBuffer`].
#[derive(Clone, Copy)]
pub struct AtomicSink<'a> {
    buffer: &'a AtomicBuffer,
}

impl GradientSink for AtomicSink<'_> {
    #[inline]
    fn add(&mut self, index: usize, value: f32) {
        self.buffer.fetch_add(index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_sink_adds() {
        let mut buf = vec![1.0f32; 4];
        buf.as_mut_slice().add(2, 0.5);
        buf.add(2, 0.25);
        assert_eq!(buf, vec![1.0, 1.0, 1.75, 1.0]);
    }

    #[test]
    fn test_atomic_buffer_concurrent_adds() {
        let buffer = AtomicBuffer::zeros(3);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let mut sink = buffer.sink();
                    for _ in 0..1000 {
                        sink.add(1, 1.0);
                    }
                });
            }
        });
        assert_eq!(buffer.into_values(), vec![0.0, 8000.0, 0.0]);
    }
}
