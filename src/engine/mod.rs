//! Workflow instance state machine.
//!
//! Owns the lifecycle of every workflow instance and delegates timing math
//! to [`crate::timing`] and gap classification to [`crate::variance`].
//! Every mutating operation follows the same discipline:
//!
//! 1. take the instance's exclusive lock,
//! 2. check the optimistic version the caller saw (if provided),
//! 3. validate the status transition,
//! 4. append the transition record to the journal (write-ahead),
//! 5. apply it in memory.
//!
//! A storage failure in step 4 aborts the whole operation with nothing
//! applied. Reads never take the instance lock; they snapshot the committed
//! state and compute elapsed time live.

pub mod instance;

pub use instance::{
    Aggregate, InstanceStatus, StepResult, StepSnapshot, StepStatus, WorkflowInstance,
    WorkflowSnapshot,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{self, Journal, TransitionEvent, TransitionRecord};
use crate::templates::schema::StepLink;
use crate::templates::TemplateRegistry;
use crate::variance::{self, Gap};

const MAX_IDENTIFIER_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 10_000;

/// What a caller gets back after finishing a step
#[derive(Debug, Clone)]
pub enum StepAdvance {
    /// More steps remain; the cursor moved to `next_step`
    Next {
        next_step: StepSnapshot,
        snapshot: WorkflowSnapshot,
    },
    /// That was the last step; the instance is complete
    Finished {
        summary: CompletionSummary,
        snapshot: WorkflowSnapshot,
    },
}

impl StepAdvance {
    /// The full snapshot regardless of variant
    pub fn snapshot(&self) -> &WorkflowSnapshot {
        match self {
            StepAdvance::Next { snapshot, .. } | StepAdvance::Finished { snapshot, .. } => snapshot,
        }
    }
}

/// Totals reported when an instance completes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompletionSummary {
    pub instance_id: Uuid,
    pub ticket_id: String,
    pub completed_at: DateTime<Utc>,
    pub total_actual_seconds: i64,
    pub total_estimated_seconds: i64,
    pub total_gap: Gap,
    pub steps_completed: usize,
    pub steps_skipped: usize,
}

/// Filters for listing instances
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub ticket_id: Option<String>,
    pub owner_id: Option<String>,
    pub status: Option<InstanceStatus>,
}

/// The guided workflow execution engine
pub struct WorkflowEngine {
    registry: TemplateRegistry,
    journal: Journal,
    instances: RwLock<HashMap<Uuid, Aggregate>>,
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// Serializes instance creation so the one-active-instance-per-ticket
    /// check cannot race
    start_lock: Mutex<()>,
}

impl WorkflowEngine {
    /// Create an engine with no prior state
    pub fn new(registry: TemplateRegistry, journal: Journal) -> Self {
        Self {
            registry,
            journal,
            instances: RwLock::new(HashMap::new()),
            locks: StdMutex::new(HashMap::new()),
            start_lock: Mutex::new(()),
        }
    }

    /// Create an engine by replaying every journal on disk.
    ///
    /// Instances whose template no longer resolves, or whose journal does
    /// not replay cleanly, are skipped with a warning rather than blocking
    /// startup.
    pub fn recover(registry: TemplateRegistry, journal: Journal) -> Result<Self, EngineError> {
        let mut instances = HashMap::new();

        for (instance_id, records) in journal.load_all()? {
            let Some(first) = records.first() else {
                continue;
            };
            let TransitionEvent::Started { template_id, .. } = &first.event else {
                warn!("Journal for {instance_id} does not begin with a start record, skipping");
                continue;
            };
            let Some(template) = registry.get(*template_id) else {
                warn!("Template {template_id} for instance {instance_id} not found, skipping");
                continue;
            };

            match store::replay(template, &records) {
                Ok(aggregate) => {
                    instances.insert(instance_id, aggregate);
                }
                Err(e) => {
                    warn!("Failed to replay instance {instance_id}: {e}");
                }
            }
        }

        info!("Recovered {} workflow instances", instances.len());

        Ok(Self {
            registry,
            journal,
            instances: RwLock::new(instances),
            locks: StdMutex::new(HashMap::new()),
            start_lock: Mutex::new(()),
        })
    }

    /// The immutable template catalog
    pub fn templates(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Number of instances currently held in memory
    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }

    // ── Mutating operations ─────────────────────────────────────────────

    /// Start a workflow for a ticket against a template
    #[instrument(skip(self))]
    pub async fn start_workflow(
        &self,
        template_id: Uuid,
        ticket_id: &str,
        owner_id: &str,
    ) -> Result<WorkflowSnapshot, EngineError> {
        self.start_workflow_at(template_id, ticket_id, owner_id, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::start_workflow`]
    pub async fn start_workflow_at(
        &self,
        template_id: Uuid,
        ticket_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        validate_identifier("ticket id", ticket_id)?;
        validate_identifier("owner id", owner_id)?;

        let template = self
            .registry
            .get(template_id)
            .ok_or_else(|| EngineError::not_found("template", template_id.to_string()))?;

        let _start_guard = self.start_lock.lock().await;

        {
            let map = self.instances.read().await;
            if let Some(existing) = map
                .values()
                .find(|a| a.instance.ticket_id == ticket_id && !a.instance.status.is_terminal())
            {
                return Err(EngineError::Conflict(format!(
                    "ticket '{}' already has workflow {} in status {}",
                    ticket_id, existing.instance.id, existing.instance.status
                )));
            }
        }

        let instance_id = Uuid::new_v4();
        let mut aggregate = Aggregate::new(instance_id, template_id, template.step_count());
        let record = TransitionRecord {
            seq: 1,
            instance_id,
            at: now,
            event: TransitionEvent::Started {
                template_id,
                ticket_id: ticket_id.to_string(),
                owner_id: owner_id.to_string(),
            },
        };

        self.journal.append(&record)?;
        aggregate.apply(&record.event, record.at)?;
        let snapshot = aggregate.snapshot(template, now);

        self.instances.write().await.insert(instance_id, aggregate);
        info!(
            workflow = %instance_id,
            ticket = ticket_id,
            template = %template.name,
            "Workflow started"
        );

        Ok(snapshot)
    }

    /// Pause the active workflow, freezing its clock
    #[instrument(skip(self))]
    pub async fn pause_workflow(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        self.pause_workflow_at(instance_id, expected_version, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::pause_workflow`]
    pub async fn pause_workflow_at(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let snapshot = self
            .commit(instance_id, expected_version, now, |aggregate| {
                aggregate.ensure_can_pause()?;
                Ok(TransitionEvent::Paused)
            })
            .await?;
        info!(workflow = %instance_id, "Workflow paused");
        Ok(snapshot)
    }

    /// Resume a paused workflow
    #[instrument(skip(self))]
    pub async fn resume_workflow(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        self.resume_workflow_at(instance_id, expected_version, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::resume_workflow`]
    pub async fn resume_workflow_at(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let snapshot = self
            .commit(instance_id, expected_version, now, |aggregate| {
                aggregate.ensure_can_resume()?;
                Ok(TransitionEvent::Resumed)
            })
            .await?;
        info!(workflow = %instance_id, "Workflow resumed");
        Ok(snapshot)
    }

    /// Complete the current step and advance (or finish the instance)
    #[instrument(skip(self, notes, links))]
    pub async fn complete_step(
        &self,
        instance_id: Uuid,
        notes: Option<String>,
        links: Vec<StepLink>,
        expected_version: Option<u64>,
    ) -> Result<StepAdvance, EngineError> {
        self.complete_step_at(instance_id, notes, links, expected_version, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::complete_step`]
    pub async fn complete_step_at(
        &self,
        instance_id: Uuid,
        notes: Option<String>,
        links: Vec<StepLink>,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<StepAdvance, EngineError> {
        validate_notes(notes.as_deref())?;
        validate_links(&links)?;

        let snapshot = self
            .commit(instance_id, expected_version, now, |aggregate| {
                aggregate.ensure_can_finish_step("complete a step")?;

                let step_index = aggregate.instance.current_step;
                let actual_seconds = open_session_elapsed(aggregate, now)?;
                let estimate = self
                    .registry
                    .get(aggregate.instance.template_id)
                    .and_then(|t| t.step(step_index))
                    .map_or(0, |s| s.estimated_seconds);

                Ok(TransitionEvent::StepCompleted {
                    step_index,
                    notes: notes.clone(),
                    links: links.clone(),
                    actual_seconds,
                    gap: variance::classify(actual_seconds, estimate),
                })
            })
            .await?;

        info!(workflow = %instance_id, step = snapshot.current_step, "Step completed");
        Ok(advance_from(snapshot))
    }

    /// Skip the current step; its time is still recorded
    #[instrument(skip(self))]
    pub async fn skip_step(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<StepAdvance, EngineError> {
        self.skip_step_at(instance_id, expected_version, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::skip_step`]
    pub async fn skip_step_at(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<StepAdvance, EngineError> {
        let snapshot = self
            .commit(instance_id, expected_version, now, |aggregate| {
                aggregate.ensure_can_finish_step("skip a step")?;

                Ok(TransitionEvent::StepSkipped {
                    step_index: aggregate.instance.current_step,
                    actual_seconds: open_session_elapsed(aggregate, now)?,
                })
            })
            .await?;

        info!(workflow = %instance_id, "Step skipped");
        Ok(advance_from(snapshot))
    }

    /// Cancel a workflow; finalizes any open session. Irreversible.
    #[instrument(skip(self))]
    pub async fn cancel_workflow(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        self.cancel_workflow_at(instance_id, expected_version, Utc::now())
            .await
    }

    /// Fixed-clock variant of [`Self::cancel_workflow`]
    pub async fn cancel_workflow_at(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let snapshot = self
            .commit(instance_id, expected_version, now, |aggregate| {
                aggregate.ensure_can_cancel()?;
                Ok(TransitionEvent::Cancelled)
            })
            .await?;
        info!(workflow = %instance_id, "Workflow cancelled");
        Ok(snapshot)
    }

    // ── Read operations ─────────────────────────────────────────────────

    /// Live snapshot of one instance; never blocks on mutations
    pub async fn get_state(&self, instance_id: Uuid) -> Result<WorkflowSnapshot, EngineError> {
        self.get_state_at(instance_id, Utc::now()).await
    }

    /// Fixed-clock variant of [`Self::get_state`]
    pub async fn get_state_at(
        &self,
        instance_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let map = self.instances.read().await;
        let aggregate = map
            .get(&instance_id)
            .ok_or_else(|| EngineError::not_found("workflow", instance_id.to_string()))?;
        self.snapshot_of(aggregate, now)
    }

    /// Snapshots of all instances matching a filter, newest first
    pub async fn list(&self, filter: &ListFilter) -> Vec<WorkflowSnapshot> {
        self.list_at(filter, Utc::now()).await
    }

    /// Fixed-clock variant of [`Self::list`]
    pub async fn list_at(&self, filter: &ListFilter, now: DateTime<Utc>) -> Vec<WorkflowSnapshot> {
        let map = self.instances.read().await;
        let mut snapshots: Vec<WorkflowSnapshot> = map
            .values()
            .filter(|a| {
                filter
                    .ticket_id
                    .as_ref()
                    .is_none_or(|t| &a.instance.ticket_id == t)
                    && filter
                        .owner_id
                        .as_ref()
                        .is_none_or(|o| &a.instance.owner_id == o)
                    && filter.status.is_none_or(|s| a.instance.status == s)
            })
            .filter_map(|a| self.snapshot_of(a, now).ok())
            .collect();
        snapshots.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        snapshots
    }

    /// The non-terminal instance for a ticket, if one exists
    pub async fn active_for_ticket(&self, ticket_id: &str) -> Option<WorkflowSnapshot> {
        let now = Utc::now();
        let map = self.instances.read().await;
        map.values()
            .find(|a| a.instance.ticket_id == ticket_id && !a.instance.status.is_terminal())
            .and_then(|a| self.snapshot_of(a, now).ok())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn snapshot_of(
        &self,
        aggregate: &Aggregate,
        now: DateTime<Utc>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let template = self
            .registry
            .get(aggregate.instance.template_id)
            .ok_or_else(|| {
                EngineError::not_found("template", aggregate.instance.template_id.to_string())
            })?;
        Ok(aggregate.snapshot(template, now))
    }

    fn instance_lock(&self, instance_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(instance_id).or_default().clone()
    }

    /// Run one serialized, version-checked, write-ahead transition
    async fn commit(
        &self,
        instance_id: Uuid,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
        build: impl FnOnce(&Aggregate) -> Result<TransitionEvent, EngineError>,
    ) -> Result<WorkflowSnapshot, EngineError> {
        let lock = self.instance_lock(instance_id);
        let _guard = lock.lock().await;

        let current = {
            let map = self.instances.read().await;
            map.get(&instance_id)
                .ok_or_else(|| EngineError::not_found("workflow", instance_id.to_string()))?
                .clone()
        };

        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(EngineError::Conflict(format!(
                    "workflow {} is at version {}, caller expected {}",
                    instance_id, current.version, expected
                )));
            }
        }

        let event = build(&current)?;
        let record = TransitionRecord {
            seq: current.version + 1,
            instance_id,
            at: now,
            event,
        };

        // Write-ahead: durable before anything is applied or acknowledged
        self.journal.append(&record)?;

        let mut map = self.instances.write().await;
        let aggregate = map
            .get_mut(&instance_id)
            .ok_or_else(|| EngineError::not_found("workflow", instance_id.to_string()))?;
        aggregate.apply(&record.event, record.at)?;
        self.snapshot_of(aggregate, now)
    }
}

/// Elapsed seconds the open session would finalize at, without mutating it
fn open_session_elapsed(aggregate: &Aggregate, now: DateTime<Utc>) -> Result<i64, EngineError> {
    aggregate
        .sessions
        .iter()
        .find(|s| !s.is_finalized())
        .map(|s| s.elapsed_seconds(now))
        .ok_or_else(|| EngineError::Storage("active workflow has no open session".to_string()))
}

/// Shape a post-transition snapshot into the caller-facing advance result
fn advance_from(snapshot: WorkflowSnapshot) -> StepAdvance {
    if snapshot.status == InstanceStatus::Completed {
        let summary = CompletionSummary {
            instance_id: snapshot.instance_id,
            ticket_id: snapshot.ticket_id.clone(),
            completed_at: snapshot.completed_at.unwrap_or_default(),
            total_actual_seconds: snapshot.total_elapsed_seconds,
            total_estimated_seconds: snapshot.total_estimated_seconds,
            total_gap: snapshot.total_gap,
            steps_completed: snapshot
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Completed)
                .count(),
            steps_skipped: snapshot
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Skipped)
                .count(),
        };
        StepAdvance::Finished { summary, snapshot }
    } else {
        let next_step = snapshot
            .current_step_snapshot()
            .cloned()
            .unwrap_or_else(|| StepSnapshot {
                step_index: snapshot.current_step,
                name: String::new(),
                estimated_seconds: 0,
                status: StepStatus::Pending,
                notes: None,
                links: Vec::new(),
                elapsed_seconds: None,
                gap: None,
            });
        StepAdvance::Next {
            next_step,
            snapshot,
        }
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(EngineError::Validation(format!(
            "{field} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_notes(notes: Option<&str>) -> Result<(), EngineError> {
    if let Some(notes) = notes {
        if notes.len() > MAX_NOTES_LEN {
            return Err(EngineError::Validation(format!(
                "notes exceed {MAX_NOTES_LEN} characters"
            )));
        }
    }
    Ok(())
}

fn validate_links(links: &[StepLink]) -> Result<(), EngineError> {
    for link in links {
        if link.title.trim().is_empty() {
            return Err(EngineError::Validation(
                "link title must not be empty".to_string(),
            ));
        }
        if link.url.trim().is_empty() {
            return Err(EngineError::Validation(
                "link url must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
