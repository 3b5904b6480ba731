use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Applied, RunFilter, RunStore, StoreError, StoreResult};
use crate::dispatch::{task_run_handoff, workflow_run_handoff, ClaimQuery, Handoff};
use crate::machine::{apply_event, RunEvent, RunRecord, Transition};
use crate::model::{Agent, RunPhase, TaskRun, WorkflowRun};

/// Process-local Run Store.
///
/// Each map sits behind its own lock; claims and events take the write lock
/// for the whole match-and-set so concurrent pollers never share a run.
#[derive(Default)]
pub struct MemoryRunStore {
    agents: RwLock<HashMap<String, Agent>>,
    workflow_runs: RwLock<HashMap<String, WorkflowRun>>,
    task_runs: RwLock<HashMap<String, TaskRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_in<R: RunRecord + Clone>(
    runs: &mut HashMap<String, R>,
    kind: &'static str,
    id: &str,
    event: &RunEvent,
) -> StoreResult<Applied<R>> {
    let run = runs
        .get_mut(id)
        .ok_or_else(|| StoreError::not_found(kind, id))?;
    let transition = apply_event(run, event, Utc::now())?;
    Ok(Applied {
        run: run.clone(),
        transition,
    })
}

/// Oldest first, id as tie-breaker, so every poll sees a stable order.
fn oldest_first<'a, R, F>(runs: &'a HashMap<String, R>, created: F) -> Vec<String>
where
    F: Fn(&R) -> DateTime<Utc>,
{
    let mut ids: Vec<(&'a String, DateTime<Utc>)> =
        runs.iter().map(|(id, run)| (id, created(run))).collect();
    ids.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    ids.into_iter().map(|(id, _)| id.clone()).collect()
}

fn claim_or_signal<R: RunRecord + Clone>(
    run: &mut R,
    handoff: Handoff,
    agent_id: &str,
) -> StoreResult<Applied<R>> {
    let transition = match handoff {
        Handoff::Claim => {
            let transition = apply_event(
                run,
                &RunEvent::Claim {
                    agent_ref: agent_id.to_string(),
                },
                Utc::now(),
            )?;
            run.set_claimed_in(RunPhase::Pending);
            log::debug!("[{}] claimed by agent {}", run.id(), agent_id);
            transition
        }
        Handoff::Signal => {
            let mut state = run.state();
            let unchanged = Transition::between(&state, &state);
            if state.agent_ref.is_none() {
                state.agent_ref = Some(agent_id.to_string());
                run.set_state(state);
            }
            run.set_claimed_in(RunPhase::Completed);
            log::debug!("[{}] handed back to agent {}", run.id(), agent_id);
            unchanged
        }
    };
    Ok(Applied {
        run: run.clone(),
        transition,
    })
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn register_agent(&self, agent: Agent) -> StoreResult<Agent> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: &str) -> StoreResult<Option<Agent>> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn touch_agent(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Option<Agent>> {
        let mut agents = self.agents.write().await;
        Ok(agents.get_mut(id).map(|agent| {
            agent.last_connected_date = at;
            agent.clone()
        }))
    }

    async fn list_agents(&self) -> StoreResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
        Ok(agents)
    }

    async fn insert_workflow_run(&self, run: WorkflowRun) -> StoreResult<WorkflowRun> {
        let mut runs = self.workflow_runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate {
                kind: "WorkflowRun",
                id: run.id,
            });
        }
        runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn get_workflow_run(&self, id: &str) -> StoreResult<Option<WorkflowRun>> {
        Ok(self.workflow_runs.read().await.get(id).cloned())
    }

    async fn list_workflow_runs(&self, filter: &RunFilter) -> StoreResult<Vec<WorkflowRun>> {
        let runs = self.workflow_runs.read().await;
        Ok(oldest_first(&*runs, |run| run.timing.creation_date)
            .into_iter()
            .filter_map(|id| runs.get(&id))
            .filter(|run| filter.matches(run.phase, run.status))
            .cloned()
            .collect())
    }

    async fn insert_task_run(&self, run: TaskRun) -> StoreResult<TaskRun> {
        let mut runs = self.task_runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate {
                kind: "TaskRun",
                id: run.id,
            });
        }
        runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn get_task_run(&self, id: &str) -> StoreResult<Option<TaskRun>> {
        Ok(self.task_runs.read().await.get(id).cloned())
    }

    async fn list_task_runs(&self, filter: &RunFilter) -> StoreResult<Vec<TaskRun>> {
        let runs = self.task_runs.read().await;
        Ok(oldest_first(&*runs, |run| run.timing.creation_date)
            .into_iter()
            .filter_map(|id| runs.get(&id))
            .filter(|run| filter.matches(run.phase, run.status))
            .filter(|run| {
                filter
                    .workflow_run_ref
                    .as_deref()
                    .map_or(true, |wanted| run.workflow_run_ref == wanted)
            })
            .cloned()
            .collect())
    }

    async fn apply_workflow_run_event(
        &self,
        id: &str,
        event: &RunEvent,
    ) -> StoreResult<Applied<WorkflowRun>> {
        let mut runs = self.workflow_runs.write().await;
        apply_in(&mut *runs, "WorkflowRun", id, event)
    }

    async fn apply_task_run_event(
        &self,
        id: &str,
        event: &RunEvent,
    ) -> StoreResult<Applied<TaskRun>> {
        let mut runs = self.task_runs.write().await;
        apply_in(&mut *runs, "TaskRun", id, event)
    }

    async fn claim_workflow_runs(
        &self,
        query: &ClaimQuery,
    ) -> StoreResult<Vec<Applied<WorkflowRun>>> {
        let mut runs = self.workflow_runs.write().await;
        let mut claimed = Vec::new();
        for id in oldest_first(&*runs, |run| run.timing.creation_date) {
            let Some(run) = runs.get_mut(&id) else {
                continue;
            };
            if let Some(handoff) = workflow_run_handoff(run, query) {
                claimed.push(claim_or_signal(run, handoff, &query.agent_id)?);
            }
        }
        Ok(claimed)
    }

    async fn claim_task_runs(&self, query: &ClaimQuery) -> StoreResult<Vec<Applied<TaskRun>>> {
        let mut runs = self.task_runs.write().await;
        let mut claimed = Vec::new();
        for id in oldest_first(&*runs, |run| run.timing.creation_date) {
            let Some(run) = runs.get_mut(&id) else {
                continue;
            };
            if let Some(handoff) = task_run_handoff(run, query) {
                claimed.push(claim_or_signal(run, handoff, &query.agent_id)?);
            }
        }
        Ok(claimed)
    }
}
