//! Interval-level timing for workflow steps.
//!
//! Elapsed time is always recomputed from persisted timestamps; there is no
//! ticking counter anywhere. The same timestamps therefore produce the same
//! elapsed value before and after a process restart, and clock reads only
//! happen at the moment a caller asks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A timing interval for one workflow step.
///
/// A session opens when its step becomes the current step and closes when the
/// step is completed, skipped, or the workflow is cancelled. It may go
/// through any number of pause/resume cycles in between; pauses accumulate
/// into `accumulated_paused_seconds` so elapsed time only counts active work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSession {
    /// Step this session times (0-based)
    pub step_index: usize,
    /// When the session opened
    pub started_at: DateTime<Utc>,
    /// Set while paused, cleared on resume
    pub paused_at: Option<DateTime<Utc>>,
    /// Set once, when the session is finalized
    pub ended_at: Option<DateTime<Utc>>,
    /// Total seconds spent paused across all completed pause cycles
    pub accumulated_paused_seconds: i64,
    /// True only while actively ticking
    pub is_active: bool,
}

impl TimeSession {
    /// Open a new active session for a step
    pub fn open(step_index: usize, now: DateTime<Utc>) -> Self {
        Self {
            step_index,
            started_at: now,
            paused_at: None,
            ended_at: None,
            accumulated_paused_seconds: 0,
            is_active: true,
        }
    }

    /// Whether the session has been finalized
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Human-readable state, used in transition errors
    pub fn state_name(&self) -> &'static str {
        if self.is_finalized() {
            "finalized"
        } else if self.is_active {
            "active"
        } else {
            "paused"
        }
    }

    /// Elapsed active seconds as a pure function of timestamps.
    ///
    /// Active sessions tick with `now`; paused sessions are frozen at the
    /// pause timestamp; finalized sessions are frozen at the end timestamp.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = if let Some(ended) = self.ended_at {
            ended
        } else if let Some(paused) = self.paused_at {
            paused
        } else {
            now
        };

        let elapsed = end.signed_duration_since(self.started_at).num_seconds()
            - self.accumulated_paused_seconds;
        elapsed.max(0)
    }

    /// Pause an active session, freezing its elapsed value at `now`.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if !self.is_active || self.is_finalized() {
            return Err(EngineError::invalid_transition(
                "pause a session",
                self.state_name(),
            ));
        }

        self.paused_at = Some(now);
        self.is_active = false;
        Ok(())
    }

    /// Resume a paused session, folding the pause interval into the
    /// accumulated total.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.is_active || self.is_finalized() {
            return Err(EngineError::invalid_transition(
                "resume a session",
                self.state_name(),
            ));
        }

        if let Some(paused) = self.paused_at.take() {
            self.accumulated_paused_seconds += now.signed_duration_since(paused).num_seconds();
        }
        self.is_active = true;
        Ok(())
    }

    /// Finalize the session and return its elapsed seconds.
    ///
    /// Finalizing a paused session first folds the trailing pause interval
    /// into the accumulated total, so the frozen elapsed value is preserved.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<i64, EngineError> {
        if self.is_finalized() {
            return Err(EngineError::invalid_transition(
                "finalize a session",
                self.state_name(),
            ));
        }

        if let Some(paused) = self.paused_at.take() {
            self.accumulated_paused_seconds += now.signed_duration_since(paused).num_seconds();
        }
        self.ended_at = Some(now);
        self.is_active = false;
        Ok(self.elapsed_seconds(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    #[test]
    fn test_active_session_ticks_with_now() {
        let session = TimeSession::open(0, t0());
        assert_eq!(session.elapsed_seconds(at(0)), 0);
        assert_eq!(session.elapsed_seconds(at(60)), 60);
        assert_eq!(session.elapsed_seconds(at(3600)), 3600);
    }

    #[test]
    fn test_elapsed_is_monotonic_while_active() {
        let session = TimeSession::open(0, t0());
        let mut previous = 0;
        for s in [1, 5, 42, 900, 86400] {
            let elapsed = session.elapsed_seconds(at(s));
            assert!(elapsed >= previous);
            previous = elapsed;
        }
    }

    #[test]
    fn test_paused_session_is_frozen() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(100)).unwrap();

        // Frozen at 100 regardless of how far `now` advances
        assert_eq!(session.elapsed_seconds(at(100)), 100);
        assert_eq!(session.elapsed_seconds(at(500)), 100);
        assert_eq!(session.elapsed_seconds(at(99999)), 100);
    }

    #[test]
    fn test_resume_accumulates_pause_time() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(100)).unwrap();
        session.resume(at(400)).unwrap();

        assert_eq!(session.accumulated_paused_seconds, 300);
        assert_eq!(session.elapsed_seconds(at(400)), 100);
        assert_eq!(session.elapsed_seconds(at(500)), 200);
    }

    #[test]
    fn test_multiple_pause_resume_cycles() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(10)).unwrap();
        session.resume(at(20)).unwrap();
        session.pause(at(30)).unwrap();
        session.resume(at(50)).unwrap();

        assert_eq!(session.accumulated_paused_seconds, 30);
        assert_eq!(session.elapsed_seconds(at(50)), 20);
    }

    #[test]
    fn test_finalize_returns_elapsed() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(100)).unwrap();
        session.resume(at(400)).unwrap();
        let elapsed = session.finalize(at(600)).unwrap();

        assert_eq!(elapsed, 300);
        assert!(session.is_finalized());
        assert!(!session.is_active);
        // Frozen forever after finalize
        assert_eq!(session.elapsed_seconds(at(99999)), 300);
    }

    #[test]
    fn test_finalize_while_paused_keeps_frozen_value() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(200)).unwrap();
        let elapsed = session.finalize(at(900)).unwrap();

        // The 700s spent paused before finalize must not count
        assert_eq!(elapsed, 200);
    }

    #[test]
    fn test_pause_rejected_unless_active() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(10)).unwrap();

        let err = session.pause(at(20)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_resume_rejected_while_active() {
        let mut session = TimeSession::open(0, t0());
        let err = session.resume(at(10)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_finalize_is_not_repeatable() {
        let mut session = TimeSession::open(0, t0());
        session.finalize(at(50)).unwrap();

        let err = session.finalize(at(60)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(session.elapsed_seconds(at(60)), 50);
    }

    #[test]
    fn test_resume_rejected_after_finalize() {
        let mut session = TimeSession::open(0, t0());
        session.pause(at(10)).unwrap();
        session.resume(at(20)).unwrap();
        session.finalize(at(30)).unwrap();

        assert!(session.resume(at(40)).is_err());
        assert!(session.pause(at(40)).is_err());
    }

    #[test]
    fn test_elapsed_never_negative() {
        // Clock skew: a `now` earlier than started_at clamps to zero
        let session = TimeSession::open(0, at(100));
        assert_eq!(session.elapsed_seconds(at(50)), 0);
    }

    #[test]
    fn test_restart_equivalence() {
        // A session rebuilt from the same timestamps reports the same
        // elapsed value for any `now`
        let mut original = TimeSession::open(2, t0());
        original.pause(at(120)).unwrap();
        original.resume(at(300)).unwrap();

        let rebuilt = TimeSession {
            step_index: original.step_index,
            started_at: original.started_at,
            paused_at: original.paused_at,
            ended_at: original.ended_at,
            accumulated_paused_seconds: original.accumulated_paused_seconds,
            is_active: original.is_active,
        };

        for s in [300, 301, 1000, 50_000] {
            assert_eq!(
                original.elapsed_seconds(at(s)),
                rebuilt.elapsed_seconds(at(s))
            );
        }
    }
}
