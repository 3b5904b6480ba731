//! Callback API
//!
//! Applies Agent (and operator) notifications to stored runs. Every event
//! goes through the state machine, so replays against a run that already
//! moved on are accepted and change nothing.

use std::sync::Arc;

use log::{debug, info};

use flow_core::{
    Applied, RunEvent, RunFilter, RunOutcome, RunRecord, RunStore, TaskRun, WorkflowRun,
};
use flow_events::{StatusBus, StatusChangeEvent};

use crate::error::{AppError, Result};

pub struct CallbackService {
    store: Arc<dyn RunStore>,
    bus: StatusBus,
}

impl CallbackService {
    pub fn new(store: Arc<dyn RunStore>, bus: StatusBus) -> Self {
        Self { store, bus }
    }

    pub async fn submit_workflow_run(&self, run: WorkflowRun) -> Result<WorkflowRun> {
        let run = self.store.insert_workflow_run(run).await?;
        info!("[{}] WorkflowRun submitted for workflow {}", run.id, run.workflow_ref);
        Ok(run)
    }

    pub async fn submit_task_run(&self, run: TaskRun) -> Result<TaskRun> {
        let run = self.store.insert_task_run(run).await?;
        info!(
            "[{}] TaskRun '{}' ({}) submitted for WorkflowRun {}",
            run.id, run.name, run.task_type, run.workflow_run_ref
        );
        Ok(run)
    }

    pub async fn get_workflow_run(&self, id: &str) -> Result<WorkflowRun> {
        self.store
            .get_workflow_run(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("WorkflowRun not found: {id}")))
    }

    pub async fn get_task_run(&self, id: &str) -> Result<TaskRun> {
        self.store
            .get_task_run(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("TaskRun not found: {id}")))
    }

    pub async fn list_workflow_runs(&self, filter: &RunFilter) -> Result<Vec<WorkflowRun>> {
        Ok(self.store.list_workflow_runs(filter).await?)
    }

    pub async fn list_task_runs(&self, filter: &RunFilter) -> Result<Vec<TaskRun>> {
        Ok(self.store.list_task_runs(filter).await?)
    }

    pub async fn apply_workflow_event(&self, id: &str, event: RunEvent) -> Result<WorkflowRun> {
        let applied = self.store.apply_workflow_run_event(id, &event).await?;
        Ok(self.record(&event, applied))
    }

    pub async fn apply_task_event(&self, id: &str, event: RunEvent) -> Result<TaskRun> {
        let applied = self.store.apply_task_run_event(id, &event).await?;
        Ok(self.record(&event, applied))
    }

    pub async fn start_workflow(&self, id: &str) -> Result<WorkflowRun> {
        self.apply_workflow_event(id, RunEvent::Start).await
    }

    /// The Agent has torn down run-scoped workspaces; nothing else is owned here.
    pub async fn finalize_workflow(&self, id: &str) -> Result<WorkflowRun> {
        self.apply_workflow_event(id, RunEvent::Finalize).await
    }

    pub async fn end_workflow(&self, id: &str, outcome: RunOutcome) -> Result<WorkflowRun> {
        self.apply_workflow_event(id, RunEvent::End(outcome)).await
    }

    pub async fn start_task(&self, id: &str) -> Result<TaskRun> {
        self.apply_task_event(id, RunEvent::Start).await
    }

    /// Accepted on terminal runs too; the persisted status is whatever
    /// reached the store first.
    pub async fn end_task(&self, id: &str, outcome: RunOutcome) -> Result<TaskRun> {
        self.apply_task_event(id, RunEvent::End(outcome)).await
    }

    fn record<R: RunRecord>(&self, event: &RunEvent, applied: Applied<R>) -> R {
        let transition = &applied.transition;
        if transition.changed {
            info!(
                "[{}] {} {}: {}/{} -> {}/{}",
                applied.run.id(),
                R::KIND,
                event,
                transition.from_phase,
                transition.from_status,
                transition.to_phase,
                transition.to_status
            );
        } else {
            debug!(
                "[{}] {} {} ignored, already {}/{}",
                applied.run.id(),
                R::KIND,
                event,
                transition.to_phase,
                transition.to_status
            );
        }
        self.bus.emit_opt(StatusChangeEvent::from_transition(
            R::KIND,
            applied.run.id(),
            transition,
        ));
        applied.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{ClaimQuery, MemoryRunStore, RunKind, RunPhase, RunStatus, TaskType};
    use tokio::sync::mpsc;

    async fn claimed_task(store: &MemoryRunStore) -> TaskRun {
        let run = store
            .insert_task_run(TaskRun::new("wfr", "t", TaskType::Custom))
            .await
            .unwrap();
        store
            .claim_task_runs(&ClaimQuery::new("agent-1"))
            .await
            .unwrap();
        run
    }

    fn drain(rx: &mut mpsc::Receiver<StatusChangeEvent>) -> Vec<StatusChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn start_is_idempotent_and_emits_once() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, mut rx) = StatusBus::new(16);
        let service = CallbackService::new(store.clone(), bus);
        let run = claimed_task(&store).await;

        let first = service.start_task(&run.id).await.unwrap();
        let second = service.start_task(&run.id).await.unwrap();
        assert_eq!(first.phase, RunPhase::Running);
        assert_eq!(second.phase, RunPhase::Running);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].run_kind, RunKind::TaskRun);
        assert_eq!(events[0].old_phase, RunPhase::Queued);
        assert_eq!(events[0].new_status, RunStatus::Running);
    }

    #[tokio::test]
    async fn end_task_twice_is_accepted_without_duplicate_event() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, mut rx) = StatusBus::new(16);
        let service = CallbackService::new(store.clone(), bus);
        let run = claimed_task(&store).await;
        service.start_task(&run.id).await.unwrap();
        drain(&mut rx);

        let outcome = RunOutcome::failed("exit 1");
        service.end_task(&run.id, outcome.clone()).await.unwrap();
        let again = service.end_task(&run.id, outcome).await.unwrap();
        assert_eq!(again.phase, RunPhase::Completed);
        assert_eq!(again.status, RunStatus::Failed);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn start_after_cancel_reports_the_cancelled_run() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, _rx) = StatusBus::new(16);
        let service = CallbackService::new(store.clone(), bus);
        let run = claimed_task(&store).await;
        service.apply_task_event(&run.id, RunEvent::Cancel).await.unwrap();

        let started = service.start_task(&run.id).await.unwrap();
        assert_eq!(started.phase, RunPhase::Completed);
        assert_eq!(started.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn end_before_start_conflicts() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, _rx) = StatusBus::new(16);
        let service = CallbackService::new(store.clone(), bus);
        let run = claimed_task(&store).await;

        let err = service
            .end_task(&run.id, RunOutcome::succeeded(None, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, _rx) = StatusBus::new(16);
        let service = CallbackService::new(store, bus);
        assert!(matches!(
            service.start_workflow("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_task_run("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn full_bus_does_not_fail_the_callback() {
        let store = Arc::new(MemoryRunStore::new());
        let (bus, _rx) = StatusBus::new(1);
        let service = CallbackService::new(store.clone(), bus.clone());
        let run = claimed_task(&store).await;

        service.start_task(&run.id).await.unwrap();
        service.apply_task_event(&run.id, RunEvent::Cancel).await.unwrap();
        assert_eq!(bus.dropped_count(), 1);
        assert_eq!(
            service.get_task_run(&run.id).await.unwrap().status,
            RunStatus::Cancelled
        );
    }
}
