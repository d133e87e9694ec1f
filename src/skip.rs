//! Skip policies and skip listeners.
//!
//! A policy decides, per failed item, whether the step drops the item and
//! carries on or aborts. Both steps of the payment job run with
//! [`AlwaysSkip`]: bad data never stops a run.

use crate::error::{BatchError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Skip,
    Abort,
}

pub trait SkipPolicy {
    /// Classify a per-item failure. `skipped` is the number of items the
    /// step has skipped so far.
    fn classify(&self, error: &BatchError, skipped: usize) -> SkipDecision;
}

/// Every failure is skippable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSkip;

impl SkipPolicy for AlwaysSkip {
    fn classify(&self, _error: &BatchError, _skipped: usize) -> SkipDecision {
        SkipDecision::Skip
    }
}

/// No failure is skippable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSkip;

impl SkipPolicy for NeverSkip {
    fn classify(&self, _error: &BatchError, _skipped: usize) -> SkipDecision {
        SkipDecision::Abort
    }
}

/// Skip until `limit` items have been skipped, then abort.
#[derive(Debug, Clone, Copy)]
pub struct SkipLimit(pub usize);

impl SkipPolicy for SkipLimit {
    fn classify(&self, _error: &BatchError, skipped: usize) -> SkipDecision {
        if skipped < self.0 {
            SkipDecision::Skip
        } else {
            SkipDecision::Abort
        }
    }
}

/// Skip only the listed error kinds.
#[derive(Debug, Clone)]
pub struct SkipKinds(pub Vec<ErrorKind>);

impl SkipPolicy for SkipKinds {
    fn classify(&self, error: &BatchError, _skipped: usize) -> SkipDecision {
        if self.0.contains(&error.kind()) {
            SkipDecision::Skip
        } else {
            SkipDecision::Abort
        }
    }
}

/// Receives every skipped item together with its failure.
pub trait SkipListener<I, O> {
    fn on_skip_in_read(&mut self, _error: &BatchError) {}

    fn on_skip_in_process(&mut self, _item: &I, _error: &BatchError) {}

    fn on_skip_in_write(&mut self, _item: &O, _error: &BatchError) {}
}

/// Listener that ignores skips.
pub struct NoSkipListener;

impl<I, O> SkipListener<I, O> for NoSkipListener {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> BatchError {
        BatchError::parse("{", "eof")
    }

    #[test]
    fn test_always_skip() {
        assert_eq!(AlwaysSkip.classify(&parse_error(), 0), SkipDecision::Skip);
        assert_eq!(
            AlwaysSkip.classify(&BatchError::Config("x".into()), 1_000_000),
            SkipDecision::Skip
        );
    }

    #[test]
    fn test_never_skip() {
        assert_eq!(NeverSkip.classify(&parse_error(), 0), SkipDecision::Abort);
    }

    #[test]
    fn test_skip_limit() {
        let policy = SkipLimit(2);
        assert_eq!(policy.classify(&parse_error(), 0), SkipDecision::Skip);
        assert_eq!(policy.classify(&parse_error(), 1), SkipDecision::Skip);
        assert_eq!(policy.classify(&parse_error(), 2), SkipDecision::Abort);
    }

    #[test]
    fn test_skip_kinds() {
        let policy = SkipKinds(vec![ErrorKind::Parse, ErrorKind::Format]);
        assert_eq!(policy.classify(&parse_error(), 0), SkipDecision::Skip);
        let io = BatchError::Io(std::io::Error::other("disk"));
        assert_eq!(policy.classify(&io, 0), SkipDecision::Abort);
    }
}
