//! Order-preserving batch splitting.

use std::iter::FusedIterator;
use std::ops::Range;

use crate::core::errors::PipelineError;

/// A contiguous slice of the input tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    /// Position of this batch in yield order.
    pub index: usize,
    /// Offset of the first item within the original sequence.
    pub offset: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn span(&self) -> BatchSpan {
        BatchSpan {
            index: self.index,
            offset: self.offset,
            len: self.items.len(),
        }
    }
}

/// Owned description of a batch: index, offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpan {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

impl BatchSpan {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Lazy iterator over consecutive batches of `items`.
///
/// Every batch holds `batch_size` items except possibly the last. The
/// iterator borrows `items` and keeps its own cursor, so calling
/// [`split`] again restarts from the beginning.
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    items: &'a [T],
    batch_size: usize,
    offset: usize,
    index: usize,
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = Batch<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.items.len() {
            return None;
        }
        let end = (self.offset + self.batch_size).min(self.items.len());
        let batch = Batch {
            index: self.index,
            offset: self.offset,
            items: &self.items[self.offset..end],
        };
        self.offset = end;
        self.index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.items.len() - self.offset).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

impl<T> FusedIterator for Batches<'_, T> {}

/// Split `items` into batches of `batch_size`.
///
/// An empty input yields no batches. A zero batch size cannot describe any
/// partition and is rejected.
pub fn split<T>(items: &[T], batch_size: usize) -> Result<Batches<'_, T>, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::invalid("batch size must be positive"));
    }
    Ok(Batches {
        items,
        batch_size,
        offset: 0,
        index: 0,
    })
}

/// Spans for splitting a sequence of `len` items, without borrowing the items.
pub fn spans(len: usize, batch_size: usize) -> Result<Vec<BatchSpan>, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::invalid("batch size must be positive"));
    }
    Ok((0..len)
        .step_by(batch_size)
        .enumerate()
        .map(|(index, offset)| BatchSpan {
            index,
            offset,
            len: batch_size.min(len - offset),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat<T: Clone>(batches: Batches<'_, T>) -> Vec<T> {
        batches.flat_map(|batch| batch.items.to_vec()).collect()
    }

    #[test]
    fn batches_reconstruct_input() {
        for n in 1..=64usize {
            let data: Vec<usize> = (0..n).collect();
            for size in 1..=n + 2 {
                let joined = concat(split(&data, size).unwrap());
                assert_eq!(joined, data, "n={n} size={size}");
            }
        }
    }

    #[test]
    fn last_batch_holds_remainder() {
        let data: Vec<u8> = (0..10).collect();
        let batches: Vec<_> = split(&data, 4).unwrap().collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].span(), BatchSpan { index: 0, offset: 0, len: 4 });
        assert_eq!(batches[1].span(), BatchSpan { index: 1, offset: 4, len: 4 });
        assert_eq!(batches[2].span(), BatchSpan { index: 2, offset: 8, len: 2 });
        assert!(batches.iter().all(|batch| !batch.is_empty()));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let data: Vec<String> = Vec::new();
        assert_eq!(split(&data, 3).unwrap().count(), 0);
        assert!(spans(0, 3).unwrap().is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            split(&[1, 2, 3], 0),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(spans(3, 0).is_err());
    }

    #[test]
    fn splitting_restarts_from_the_beginning() {
        let data = ["a", "b", "c", "d", "e"];
        let first: Vec<_> = split(&data, 2).unwrap().map(|b| b.span()).collect();
        let second: Vec<_> = split(&data, 2).unwrap().map(|b| b.span()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn spans_agree_with_iterator() {
        let data: Vec<u32> = (0..23).collect();
        let from_iter: Vec<_> = split(&data, 5).unwrap().map(|b| b.span()).collect();
        assert_eq!(spans(data.len(), 5).unwrap(), from_iter);
        assert_eq!(split(&data, 5).unwrap().len(), 5);
    }
}
