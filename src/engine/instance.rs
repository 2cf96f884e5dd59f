//! Workflow instance domain types and transition application.
//!
//! The [`Aggregate`] is the unit of consistency: one instance plus its step
//! results and time sessions. All state changes go through
//! [`Aggregate::apply`], which is also what recovery replays. Both paths run
//! the same code over the same recorded timestamps, so the in-memory state
//! after a restart matches what the live process had.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::journal::TransitionEvent;
use crate::templates::schema::{StepLink, WorkflowTemplate};
use crate::timing::TimeSession;
use crate::variance::{self, Gap};

/// Workflow instance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Created but not yet started
    NotStarted,
    /// Actively being worked on
    Active,
    /// User stepped away; the clock is frozen
    Paused,
    /// All steps finished
    Completed,
    /// Abandoned; irreversible
    Cancelled,
}

impl InstanceStatus {
    /// Whether the instance can never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::NotStarted => write!(f, "not_started"),
            InstanceStatus::Active => write!(f, "active"),
            InstanceStatus::Paused => write!(f, "paused"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-step completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not reached yet
    Pending,
    /// The current step
    InProgress,
    /// Finished with recorded time and gap
    Completed,
    /// Skipped; time recorded, no gap classified
    Skipped,
}

impl StepStatus {
    /// Whether the step has a final recorded time
    pub fn is_finalized(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one step within an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// 0-based step index
    pub step_index: usize,
    pub status: StepStatus,
    /// User notes captured at completion
    pub notes: Option<String>,
    /// Links attached at completion
    #[serde(default)]
    pub links: Vec<StepLink>,
    /// Final active seconds, set once the step is finalized
    pub actual_seconds: Option<i64>,
    /// Gap classification, set for completed steps with an estimate
    pub gap: Option<Gap>,
}

impl StepResult {
    fn pending(step_index: usize) -> Self {
        Self {
            step_index,
            status: StepStatus::Pending,
            notes: None,
            links: Vec::new(),
            actual_seconds: None,
            gap: None,
        }
    }
}

/// One run of a template against a ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    /// Referenced template; never owned or copied
    pub template_id: Uuid,
    /// Ticket key in the external tracker (e.g., "PROJ-123")
    pub ticket_id: String,
    /// User driving the workflow
    pub owner_id: String,
    pub status: InstanceStatus,
    /// Authoritative cursor; the in-progress step always sits here
    pub current_step: usize,
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the instance reaches a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

/// A workflow instance together with everything it owns
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub instance: WorkflowInstance,
    pub steps: Vec<StepResult>,
    pub sessions: Vec<TimeSession>,
    /// Bumped on every applied transition; equals the journal's last seq
    pub version: u64,
}

impl Aggregate {
    /// Create a fresh, not-yet-started aggregate for a template
    pub fn new(instance_id: Uuid, template_id: Uuid, step_count: usize) -> Self {
        Self {
            instance: WorkflowInstance {
                id: instance_id,
                template_id,
                ticket_id: String::new(),
                owner_id: String::new(),
                status: InstanceStatus::NotStarted,
                current_step: 0,
                started_at: None,
                completed_at: None,
            },
            steps: (0..step_count).map(StepResult::pending).collect(),
            sessions: Vec::new(),
            version: 0,
        }
    }

    /// The at-most-one active session
    pub fn active_session(&self) -> Option<&TimeSession> {
        self.sessions.iter().find(|s| s.is_active)
    }

    /// Count of active sessions; the invariant keeps this at 0 or 1
    pub fn active_session_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_active).count()
    }

    /// The session that is open (not yet finalized), active or paused
    fn open_session_mut(&mut self) -> Option<&mut TimeSession> {
        self.sessions.iter_mut().find(|s| !s.is_finalized())
    }

    // ── Transition preconditions ────────────────────────────────────────

    pub fn ensure_can_pause(&self) -> Result<(), EngineError> {
        if self.instance.status == InstanceStatus::Active {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(
                "pause",
                self.instance.status,
            ))
        }
    }

    pub fn ensure_can_resume(&self) -> Result<(), EngineError> {
        if self.instance.status == InstanceStatus::Paused {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(
                "resume",
                self.instance.status,
            ))
        }
    }

    pub fn ensure_can_finish_step(&self, action: &'static str) -> Result<(), EngineError> {
        if self.instance.status == InstanceStatus::Active {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(action, self.instance.status))
        }
    }

    pub fn ensure_can_cancel(&self) -> Result<(), EngineError> {
        if self.instance.status.is_terminal() {
            Err(EngineError::invalid_transition(
                "cancel",
                self.instance.status,
            ))
        } else {
            Ok(())
        }
    }

    // ── Transition application ──────────────────────────────────────────

    /// Apply one recorded transition.
    ///
    /// Preconditions are validated by the engine before the record is
    /// appended; a failure here on replay means the journal does not encode
    /// a legal history.
    pub fn apply(&mut self, event: &TransitionEvent, at: DateTime<Utc>) -> Result<(), EngineError> {
        match event {
            TransitionEvent::Started {
                template_id,
                ticket_id,
                owner_id,
            } => {
                self.instance.template_id = *template_id;
                self.instance.ticket_id = ticket_id.clone();
                self.instance.owner_id = owner_id.clone();
                self.instance.status = InstanceStatus::Active;
                self.instance.started_at = Some(at);
                self.instance.current_step = 0;
                if let Some(first) = self.steps.first_mut() {
                    first.status = StepStatus::InProgress;
                }
                self.sessions.push(TimeSession::open(0, at));
            }
            TransitionEvent::Paused => {
                let session = self.open_session_mut().ok_or_else(|| {
                    EngineError::Storage("pause recorded without an open session".to_string())
                })?;
                session.pause(at)?;
                self.instance.status = InstanceStatus::Paused;
            }
            TransitionEvent::Resumed => {
                let session = self.open_session_mut().ok_or_else(|| {
                    EngineError::Storage("resume recorded without an open session".to_string())
                })?;
                session.resume(at)?;
                self.instance.status = InstanceStatus::Active;
            }
            TransitionEvent::StepCompleted {
                step_index,
                notes,
                links,
                actual_seconds,
                gap,
            } => {
                self.finish_current_session(at)?;
                let step = self.steps.get_mut(*step_index).ok_or_else(|| {
                    EngineError::Storage(format!("step index {step_index} out of range"))
                })?;
                step.status = StepStatus::Completed;
                step.notes = notes.clone();
                step.links = links.clone();
                step.actual_seconds = Some(*actual_seconds);
                step.gap = Some(*gap);
                self.advance_or_complete(*step_index, at);
            }
            TransitionEvent::StepSkipped {
                step_index,
                actual_seconds,
            } => {
                self.finish_current_session(at)?;
                let step = self.steps.get_mut(*step_index).ok_or_else(|| {
                    EngineError::Storage(format!("step index {step_index} out of range"))
                })?;
                step.status = StepStatus::Skipped;
                step.actual_seconds = Some(*actual_seconds);
                self.advance_or_complete(*step_index, at);
            }
            TransitionEvent::Cancelled => {
                if let Some(session) = self.open_session_mut() {
                    session.finalize(at)?;
                }
                self.instance.status = InstanceStatus::Cancelled;
                self.instance.completed_at = Some(at);
            }
        }

        self.version += 1;
        Ok(())
    }

    fn finish_current_session(&mut self, at: DateTime<Utc>) -> Result<(), EngineError> {
        let session = self.open_session_mut().ok_or_else(|| {
            EngineError::Storage("step finished without an open session".to_string())
        })?;
        session.finalize(at)?;
        Ok(())
    }

    fn advance_or_complete(&mut self, finished_index: usize, at: DateTime<Utc>) {
        let next = finished_index + 1;
        if next < self.steps.len() {
            self.instance.current_step = next;
            self.steps[next].status = StepStatus::InProgress;
            self.sessions.push(TimeSession::open(next, at));
        } else {
            self.instance.status = InstanceStatus::Completed;
            self.instance.completed_at = Some(at);
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    /// Build a read-only snapshot with live elapsed values at `now`
    pub fn snapshot(&self, template: &WorkflowTemplate, now: DateTime<Utc>) -> WorkflowSnapshot {
        let steps: Vec<StepSnapshot> = self
            .steps
            .iter()
            .map(|result| {
                let spec = template.step(result.step_index);
                let elapsed = match result.status {
                    StepStatus::Pending => None,
                    StepStatus::InProgress => self
                        .sessions
                        .iter()
                        .find(|s| s.step_index == result.step_index)
                        .map(|s| s.elapsed_seconds(now)),
                    StepStatus::Completed | StepStatus::Skipped => result.actual_seconds,
                };
                StepSnapshot {
                    step_index: result.step_index,
                    name: spec.map_or_else(String::new, |s| s.name.clone()),
                    estimated_seconds: spec.map_or(0, |s| s.estimated_seconds),
                    status: result.status,
                    notes: result.notes.clone(),
                    links: result.links.clone(),
                    elapsed_seconds: elapsed,
                    gap: result.gap,
                }
            })
            .collect();

        let total_elapsed_seconds = steps.iter().filter_map(|s| s.elapsed_seconds).sum();
        let total_gap = variance::aggregate(self.steps.iter().filter_map(|result| {
            if result.status.is_finalized() {
                let estimate = template.step(result.step_index).map_or(0, |s| s.estimated_seconds);
                Some((result.actual_seconds.unwrap_or(0), estimate))
            } else {
                None
            }
        }));

        WorkflowSnapshot {
            instance_id: self.instance.id,
            template_id: self.instance.template_id,
            template_name: template.name.clone(),
            ticket_id: self.instance.ticket_id.clone(),
            owner_id: self.instance.owner_id.clone(),
            status: self.instance.status,
            current_step: self.instance.current_step,
            started_at: self.instance.started_at,
            completed_at: self.instance.completed_at,
            version: self.version,
            steps,
            total_elapsed_seconds,
            total_estimated_seconds: template.total_estimated_seconds(),
            total_gap,
        }
    }
}

/// Read-only view of one step with live elapsed time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub step_index: usize,
    pub name: String,
    pub estimated_seconds: i64,
    pub status: StepStatus,
    pub notes: Option<String>,
    pub links: Vec<StepLink>,
    /// Live for the in-progress step, final for finished steps, absent for
    /// pending ones
    pub elapsed_seconds: Option<i64>,
    pub gap: Option<Gap>,
}

/// Read-only view of a whole instance, computed at one wall-clock instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub instance_id: Uuid,
    pub template_id: Uuid,
    pub template_name: String,
    pub ticket_id: String,
    pub owner_id: String,
    pub status: InstanceStatus,
    pub current_step: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token; echo it back on mutating calls
    pub version: u64,
    pub steps: Vec<StepSnapshot>,
    pub total_elapsed_seconds: i64,
    pub total_estimated_seconds: i64,
    /// Aggregate gap over finalized steps only
    pub total_gap: Gap,
}

impl WorkflowSnapshot {
    /// The in-progress step's snapshot, if the workflow is still running
    pub fn current_step_snapshot(&self) -> Option<&StepSnapshot> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
    }
}
