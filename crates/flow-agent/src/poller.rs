//! Agent Poller: two long-poll loops feeding the run processor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use flow_client::{ClientResult, EngineApi};
use flow_core::{RunRecord, TaskRun, WorkflowRun};

use crate::processor::RunProcessor;

/// A run kind with its own claim endpoint and processor entry point.
#[async_trait]
trait Claimable: RunRecord + Sized + Send + 'static {
    async fn claim(engine: &dyn EngineApi, agent_id: &str) -> ClientResult<Vec<Self>>;
    async fn handle(processor: Arc<RunProcessor>, run: Self);
}

#[async_trait]
impl Claimable for WorkflowRun {
    async fn claim(engine: &dyn EngineApi, agent_id: &str) -> ClientResult<Vec<Self>> {
        engine.claim_workflow_runs(agent_id).await
    }

    async fn handle(processor: Arc<RunProcessor>, run: Self) {
        processor.handle_workflow_run(run).await
    }
}

#[async_trait]
impl Claimable for TaskRun {
    async fn claim(engine: &dyn EngineApi, agent_id: &str) -> ClientResult<Vec<Self>> {
        engine.claim_task_runs(agent_id).await
    }

    async fn handle(processor: Arc<RunProcessor>, run: Self) {
        processor.handle_task_run(run).await
    }
}

/// Polls the Engine for work on behalf of one registered Agent.
///
/// Each claimed run is processed on its own task so a slow run never
/// delays the next poll. Transport failures are logged and retried after
/// `retry_delay`.
pub struct Poller {
    engine: Arc<dyn EngineApi>,
    processor: Arc<RunProcessor>,
    agent_id: String,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(
        engine: Arc<dyn EngineApi>,
        processor: Arc<RunProcessor>,
        agent_id: impl Into<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            engine,
            processor,
            agent_id: agent_id.into(),
            retry_delay,
        }
    }

    /// Start both loops; they run until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let poller = Arc::new(self);
        vec![
            tokio::spawn(poller.clone().poll::<WorkflowRun>(shutdown.clone())),
            tokio::spawn(poller.poll::<TaskRun>(shutdown)),
        ]
    }

    async fn poll<R: Claimable>(self: Arc<Self>, shutdown: CancellationToken) {
        log::info!("Polling {} for agent {}", R::KIND, self.agent_id);
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = R::claim(self.engine.as_ref(), &self.agent_id) => polled,
            };
            match polled {
                Ok(runs) => {
                    for run in runs {
                        let state = run.state();
                        log::info!(
                            "[{}] claimed {} ({}/{})",
                            run.id(),
                            R::KIND,
                            state.phase,
                            state.status
                        );
                        tokio::spawn(R::handle(self.processor.clone(), run));
                    }
                }
                Err(e) => {
                    if e.is_not_found() {
                        log::error!(
                            "Engine does not know agent {}; it must register again",
                            self.agent_id
                        );
                    } else {
                        log::warn!("{} poll failed: {}", R::KIND, e);
                    }
                    if self.pause(&shutdown).await {
                        break;
                    }
                }
            }
        }
        log::info!("{} poller stopped", R::KIND);
    }

    /// Sleep the retry delay; true when shutdown interrupted it.
    async fn pause(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use flow_client::ClientError;
    use flow_core::{RunPhase, TaskRun, TaskType, WorkflowRun};

    use super::*;
    use crate::testing::{processor, Call, FakeEngine, FakeExecutor};

    async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn claimed_runs_reach_the_processor_after_a_transport_error() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = Arc::new(processor(&engine, &executor));

        let mut task = TaskRun::new("wfr-1", "build", TaskType::Script).with_image("alpine");
        task.id = "t-1".to_string();
        task.phase = RunPhase::Queued;
        let mut workflow = WorkflowRun::new("build");
        workflow.id = "wfr-1".to_string();
        workflow.phase = RunPhase::Queued;

        engine.push_task_poll(Err(ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }));
        engine.push_task_poll(Ok(vec![task]));
        engine.push_workflow_poll(Ok(vec![workflow]));

        let shutdown = CancellationToken::new();
        let handles = Poller::new(
            engine.clone(),
            processor,
            "agent-1",
            Duration::from_millis(20),
        )
        .spawn(shutdown.clone());

        let delivered = wait_for(|| {
            let calls = engine.calls();
            calls.contains(&Call::StartWorkflow("wfr-1".to_string()))
                && calls.iter().any(|c| matches!(c, Call::EndTask(id, _) if id == "t-1"))
        })
        .await;
        assert!(delivered, "calls: {:?}", engine.calls());
        assert!(executor.calls().contains(&Call::Execute("t-1".to_string())));

        shutdown.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn unknown_agent_keeps_polling_after_the_delay() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = Arc::new(processor(&engine, &executor));

        let mut workflow = WorkflowRun::new("build");
        workflow.id = "wfr-1".to_string();
        workflow.phase = RunPhase::Queued;
        engine.push_workflow_poll(Err(ClientError::Status {
            status: 404,
            body: "agent not found".to_string(),
        }));
        engine.push_workflow_poll(Ok(vec![workflow]));

        let shutdown = CancellationToken::new();
        let handles = Poller::new(engine.clone(), processor, "agent-1", Duration::from_millis(20))
            .spawn(shutdown.clone());

        let delivered =
            wait_for(|| engine.calls().contains(&Call::StartWorkflow("wfr-1".to_string()))).await;
        assert!(delivered, "calls: {:?}", engine.calls());

        shutdown.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_retry_delay() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = Arc::new(processor(&engine, &executor));
        engine.push_task_poll(Err(ClientError::InvalidResponse("garbage".to_string())));

        let shutdown = CancellationToken::new();
        let handles = Poller::new(engine, processor, "agent-1", Duration::from_secs(3600))
            .spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
