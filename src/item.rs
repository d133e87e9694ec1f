//! Reader, processor and writer capabilities plugged into a chunk step.

use crate::error::Result;

/// A source of items, read one at a time.
pub trait ItemReader<T> {
    /// Acquire the underlying resource. A failure here aborts the step.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read the next item, or `None` once the source is exhausted.
    ///
    /// An `Err` concerns a single item; the reader must be able to continue
    /// with the next one afterwards.
    fn read(&mut self) -> Result<Option<T>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-item transformation between reading and writing.
pub trait ItemProcessor<I, O> {
    fn process(&self, item: &I) -> Result<O>;
}

/// A sink receiving whole chunks.
pub trait ItemWriter<T> {
    /// Acquire the underlying resource. A failure here aborts the step.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Write a chunk as one unit: either every item is written or none is.
    fn write(&mut self, items: &[T]) -> Result<()>;

    /// Release the underlying resource. Called on every exit path.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Identity processor for steps without a transformation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<T: Clone> ItemProcessor<T, T> for PassThrough {
    fn process(&self, item: &T) -> Result<T> {
        Ok(item.clone())
    }
}

/// Reader over an in-memory sequence of read outcomes.
pub struct IterItemReader<It> {
    items: It,
}

impl<It: Iterator> IterItemReader<It> {
    pub fn new(items: impl IntoIterator<IntoIter = It>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T, It: Iterator<Item = Result<T>>> ItemReader<T> for IterItemReader<It> {
    fn read(&mut self) -> Result<Option<T>> {
        self.items.next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;

    #[test]
    fn test_pass_through_clones() {
        let item = "A".to_string();
        assert_eq!(PassThrough.process(&item).unwrap(), "A");
    }

    #[test]
    fn test_iter_reader_yields_then_exhausts() {
        let mut reader = IterItemReader::new(vec![
            Ok(1),
            Err(BatchError::parse("x", "bad")),
            Ok(2),
        ]);
        assert_eq!(reader.read().unwrap(), Some(1));
        assert!(reader.read().is_err());
        assert_eq!(reader.read().unwrap(), Some(2));
        assert_eq!(reader.read().unwrap(), None);
        assert_eq!(reader.read().unwrap(), None);
    }
}
