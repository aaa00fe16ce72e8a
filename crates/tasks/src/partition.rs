//! Splitting oversized batches into task-sized pieces.

use contentflow_core::MaxTaskSize;

/// Split `items` into ordered batches of at most `max` items.
///
/// Always yields at least one batch: with the limit disabled, or when the
/// input fits, the single batch is the whole input (possibly empty).
pub fn partition<T>(items: &[T], max: MaxTaskSize) -> Batches<'_, T> {
    Batches {
        items,
        size: max.limit(),
        pos: 0,
        emitted: false,
    }
}

/// Lazy batch iterator. Cloning it restarts from the current position.
pub struct Batches<'a, T> {
    items: &'a [T],
    size: Option<usize>,
    pos: usize,
    emitted: bool,
}

impl<T> Batches<'_, T> {
    /// Total number of batches the iterator yields from the start.
    pub fn batch_count(&self) -> usize {
        match self.size {
            Some(n) if !self.items.is_empty() => self.items.len().div_ceil(n),
            _ => 1,
        }
    }
}

impl<T> Clone for Batches<'_, T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items,
            size: self.size,
            pos: self.pos,
            emitted: self.emitted,
        }
    }
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.items.len();
        if self.emitted && self.pos >= len {
            return None;
        }
        let end = match self.size {
            Some(n) => (self.pos + n).min(len),
            None => len,
        };
        let batch = &self.items[self.pos..end];
        self.pos = end;
        self.emitted = true;
        Some(batch)
    }
}
