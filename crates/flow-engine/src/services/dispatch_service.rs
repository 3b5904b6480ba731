//! Dispatch Service
//!
//! Agent registration and the capability-filtered long-poll claim. A claim
//! is one atomic store operation; this service only decides how long to
//! keep asking.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::time::{sleep, Instant};

use flow_core::{
    Agent, AgentRegistration, Applied, ClaimQuery, RunRecord, RunStore, StoreResult, TaskRun,
    WorkflowRun,
};
use flow_events::{StatusBus, StatusChangeEvent};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub window: Duration,
    pub retry_interval: Duration,
}

pub struct DispatchService {
    store: Arc<dyn RunStore>,
    bus: StatusBus,
    poll: PollSettings,
}

impl DispatchService {
    pub fn new(store: Arc<dyn RunStore>, bus: StatusBus, poll: PollSettings) -> Self {
        Self { store, bus, poll }
    }

    /// Every call stores a fresh Agent record and returns its id.
    pub async fn register_agent(&self, registration: AgentRegistration) -> Result<Agent> {
        if registration.host.trim().is_empty() {
            return Err(AppError::Validation("Agent host must not be empty".to_string()));
        }
        let agent = self
            .store
            .register_agent(Agent::from_registration(registration))
            .await?;
        info!(
            "[{}] Registered agent '{}' on {} (task types: {:?})",
            agent.id, agent.name, agent.host, agent.task_types
        );
        Ok(agent)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        Ok(self.store.list_agents().await?)
    }

    /// Validate the agent and bump its heartbeat.
    async fn heartbeat(&self, agent_id: &str) -> Result<Agent> {
        self.store
            .touch_agent(agent_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent not found: {agent_id}")))
    }

    pub async fn claim_workflow_runs(&self, agent_id: &str) -> Result<Vec<WorkflowRun>> {
        let agent = self.heartbeat(agent_id).await?;
        let query = ClaimQuery::new(agent.id);
        Ok(self
            .long_poll(&query, || self.store.claim_workflow_runs(&query))
            .await)
    }

    pub async fn claim_task_runs(&self, agent_id: &str) -> Result<Vec<TaskRun>> {
        let agent = self.heartbeat(agent_id).await?;
        if agent.task_types.is_empty() {
            debug!("[{}] Agent accepts no task types, nothing to claim", agent.id);
            return Ok(Vec::new());
        }
        let query = ClaimQuery::new(agent.id).with_task_types(agent.task_types);
        Ok(self
            .long_poll(&query, || self.store.claim_task_runs(&query))
            .await)
    }

    /// Re-query until something is claimed or the window elapses.
    ///
    /// Returns no earlier than one retry interval when empty, and no later
    /// than the window plus one retry interval.
    async fn long_poll<R, F, Fut>(&self, query: &ClaimQuery, mut claim: F) -> Vec<R>
    where
        R: RunRecord,
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<Vec<Applied<R>>>>,
    {
        let deadline = Instant::now() + self.poll.window;
        loop {
            match claim().await {
                Ok(claimed) if !claimed.is_empty() => return self.hand_over(query, claimed),
                Ok(_) => {}
                Err(e) => warn!(
                    "[{}] Claim query for {} failed, retrying: {}",
                    query.agent_id,
                    R::KIND,
                    e
                ),
            }
            if Instant::now() >= deadline {
                return Vec::new();
            }
            sleep(self.poll.retry_interval).await;
        }
    }

    fn hand_over<R: RunRecord>(&self, query: &ClaimQuery, claimed: Vec<Applied<R>>) -> Vec<R> {
        info!(
            "[{}] Handing {} {}(s) to agent",
            query.agent_id,
            claimed.len(),
            R::KIND
        );
        claimed
            .into_iter()
            .map(|applied| {
                self.bus.emit_opt(StatusChangeEvent::from_transition(
                    R::KIND,
                    applied.run.id(),
                    &applied.transition,
                ));
                applied.run
            })
            .collect()
    }
}
