//! Stream cursor: which height to work on next, and what to do about it.
//!
//! The cursor is pure; the controller performs the I/O each [`TickPlan`]
//! asks for and reports back through [`StreamCursor::observe_head`],
//! [`StreamCursor::advance`], and [`StreamCursor::retry`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current activity of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// Not started yet.
    Idle,
    /// Working through heights below the last known head.
    CatchingUp,
    /// Processing the last known head.
    Tailing,
    /// Waiting for the head to move past the next height.
    Backoff,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CatchingUp => "catching_up",
            Self::Tailing => "tailing",
            Self::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

/// What the next tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Fetch the block at this height, below the head, and process it.
    FetchHistorical(u64),
    /// Re-query the head; nothing is processed this tick.
    ObserveHead,
    /// Process the last known head block at this height.
    ProcessHead(u64),
}

/// Result of comparing a fresh head query with the last known head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadObservation {
    /// The head moved forward; the next tick re-plans against it.
    Advanced,
    /// No head, or not past the last known one.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCursor {
    next: u64,
    latest: u64,
    phase: StreamPhase,
}

impl StreamCursor {
    /// Start from `start_height`, given the current head. A start height of
    /// zero means "begin at the head"; otherwise processing resumes after it.
    pub fn new(start_height: u64, head: u64) -> Self {
        let next = if start_height == 0 {
            head
        } else {
            start_height.saturating_add(1)
        };
        Self {
            next,
            latest: head,
            phase: StreamPhase::Idle,
        }
    }

    /// Height that will be emitted next.
    pub fn next_height(&self) -> u64 {
        self.next
    }

    /// Last known head height.
    pub fn latest_height(&self) -> u64 {
        self.latest
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn plan(&mut self) -> TickPlan {
        if self.next < self.latest {
            self.phase = StreamPhase::CatchingUp;
            TickPlan::FetchHistorical(self.next)
        } else if self.next > self.latest {
            TickPlan::ObserveHead
        } else {
            self.phase = StreamPhase::Tailing;
            TickPlan::ProcessHead(self.next)
        }
    }

    /// Record a fresh head query. Only a strictly higher head counts.
    pub fn observe_head(&mut self, head: Option<u64>) -> HeadObservation {
        match head {
            Some(height) if height > self.latest => {
                self.latest = height;
                HeadObservation::Advanced
            }
            _ => {
                self.phase = StreamPhase::Backoff;
                HeadObservation::Unchanged
            }
        }
    }

    /// The next height was emitted.
    pub fn advance(&mut self) {
        self.next = self.next.saturating_add(1);
    }

    /// The next height could not be processed and stays pending.
    pub fn retry(&mut self) {
        self.phase = StreamPhase::Backoff;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_start_begins_at_head() {
        let mut cursor = StreamCursor::new(0, 500);
        assert_eq!(cursor.next_height(), 500);
        assert_eq!(cursor.phase(), StreamPhase::Idle);
        assert_eq!(cursor.plan(), TickPlan::ProcessHead(500));
        assert_eq!(cursor.phase(), StreamPhase::Tailing);
    }

    #[test]
    fn max_start_height_saturates() {
        let mut cursor = StreamCursor::new(u64::MAX, 10);
        assert_eq!(cursor.next_height(), u64::MAX);
        assert_eq!(cursor.plan(), TickPlan::ObserveHead);
        cursor.advance();
        assert_eq!(cursor.next_height(), u64::MAX);
    }

    #[test]
    fn explicit_start_resumes_after_it() {
        let mut cursor = StreamCursor::new(497, 500);
        assert_eq!(cursor.plan(), TickPlan::FetchHistorical(498));
        assert_eq!(cursor.phase(), StreamPhase::CatchingUp);
        cursor.advance();
        assert_eq!(cursor.plan(), TickPlan::FetchHistorical(499));
        cursor.advance();
        assert_eq!(cursor.plan(), TickPlan::ProcessHead(500));
    }

    #[test]
    fn observe_then_process() {
        let mut cursor = StreamCursor::new(0, 10);
        cursor.plan();
        cursor.advance();
        assert_eq!(cursor.plan(), TickPlan::ObserveHead);

        assert_eq!(cursor.observe_head(Some(10)), HeadObservation::Unchanged);
        assert_eq!(cursor.phase(), StreamPhase::Backoff);
        assert_eq!(cursor.observe_head(None), HeadObservation::Unchanged);
        assert_eq!(cursor.plan(), TickPlan::ObserveHead);

        assert_eq!(cursor.observe_head(Some(11)), HeadObservation::Advanced);
        assert_eq!(cursor.latest_height(), 11);
        assert_eq!(cursor.plan(), TickPlan::ProcessHead(11));
    }

    #[test]
    fn lower_head_is_ignored() {
        let mut cursor = StreamCursor::new(20, 10);
        assert_eq!(cursor.plan(), TickPlan::ObserveHead);
        assert_eq!(cursor.observe_head(Some(9)), HeadObservation::Unchanged);
        assert_eq!(cursor.latest_height(), 10);
    }

    #[test]
    fn head_jump_switches_to_catching_up() {
        let mut cursor = StreamCursor::new(0, 10);
        cursor.advance();
        cursor.observe_head(Some(14));
        assert_eq!(cursor.plan(), TickPlan::FetchHistorical(11));
    }

    #[test]
    fn retry_keeps_height() {
        let mut cursor = StreamCursor::new(4, 10);
        assert_eq!(cursor.plan(), TickPlan::FetchHistorical(5));
        cursor.retry();
        assert_eq!(cursor.phase(), StreamPhase::Backoff);
        assert_eq!(cursor.plan(), TickPlan::FetchHistorical(5));
    }
}
