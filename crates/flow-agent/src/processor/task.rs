use tokio::task::JoinHandle;

use flow_core::{RunOutcome, RunPhase, RunStatus, TaskRun};

use super::RunProcessor;
use crate::error::ProcessorError;
use crate::executor::{ExecutionRequest, ExecutionResponse};

/// Outcome reported for an executed TaskRun.
#[derive(Debug)]
pub struct TaskReport {
    pub outcome: RunOutcome,
    /// Deferred deletion of the execution resource, when the policy asked for one.
    pub deletion: Option<JoinHandle<()>>,
}

/// What the processor did with a TaskRun.
#[derive(Debug)]
pub enum TaskDisposition {
    Ended(TaskReport),
    /// The run was already terminal when StartTask reached the Engine.
    Superseded(RunStatus),
    /// Cancellation signal forwarded to the executor.
    Cancelled,
    Skipped,
}

impl RunProcessor {
    pub async fn process_task_run(&self, run: &TaskRun) -> Result<TaskDisposition, ProcessorError> {
        if !run.task_type.is_agent_executable() {
            log::warn!("[{}] skipping task run of type {}", run.id, run.task_type);
            return Ok(TaskDisposition::Skipped);
        }

        match (run.phase, run.status) {
            (RunPhase::Pending | RunPhase::Queued, RunStatus::Ready) => self.execute_task(run).await,
            (RunPhase::Completed, RunStatus::Cancelled | RunStatus::TimedOut) => {
                // Status is already terminal; EndTask is not sent again.
                self.executor.cancel(&run.id).await?;
                log::info!("[{}] task run aborted ({})", run.id, run.status);
                Ok(TaskDisposition::Cancelled)
            }
            (phase, status) => {
                log::warn!(
                    "[{}] skipping task run delivered as {}/{}",
                    run.id,
                    phase,
                    status
                );
                Ok(TaskDisposition::Skipped)
            }
        }
    }

    async fn execute_task(&self, run: &TaskRun) -> Result<TaskDisposition, ProcessorError> {
        let mut executed = false;
        let result = match self.engine.start_task(&run.id).await {
            Ok(current) if current.status.is_terminal() => {
                log::info!(
                    "[{}] task run already {} before start, not executing",
                    run.id,
                    current.status
                );
                return Ok(TaskDisposition::Superseded(current.status));
            }
            Ok(_) => self.run_task(run, &mut executed).await,
            Err(e) => Err(e.into()),
        };

        if executed {
            if let Err(e) = self.executor.cleanup_parameters(&run.id).await {
                log::warn!("[{}] parameter cleanup failed: {}", run.id, e);
            }
        }

        let succeeded = result.is_ok();
        let outcome = match result {
            Ok(response) => RunOutcome::succeeded(response.message, response.results),
            Err(e) => {
                log::warn!("[{}] task run failed: {}", run.id, e);
                RunOutcome::failed(e.status_message())
            }
        };

        let policy = run.spec.deletion.unwrap_or(self.settings.deletion_policy);
        let deletion = (executed && policy.deletes_after(succeeded))
            .then(|| self.schedule_deletion(&run.id));

        self.engine.end_task(&run.id, &outcome).await?;
        Ok(TaskDisposition::Ended(TaskReport { outcome, deletion }))
    }

    /// Image check, then execution. `executed` is set once the executor has
    /// been asked to run anything.
    async fn run_task(
        &self,
        run: &TaskRun,
        executed: &mut bool,
    ) -> Result<ExecutionResponse, ProcessorError> {
        let image = run
            .spec
            .image()
            .ok_or_else(|| ProcessorError::MissingImage(run.id.clone()))?;

        let request = ExecutionRequest::for_task_run(
            run,
            image,
            self.settings.admission_timeout,
            self.settings.default_timeout,
        );
        *executed = true;
        log::info!("[{}] executing task run {}", run.id, run.name);
        Ok(self.executor.execute(request).await?)
    }

    /// Delete the execution resource after `cleanup_delay` so trailing logs survive.
    fn schedule_deletion(&self, task_run_id: &str) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let delay = self.settings.cleanup_delay;
        let id = task_run_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match executor.delete_execution(&id).await {
                Ok(()) => log::debug!("[{}] execution resource deleted", id),
                Err(e) => log::warn!("[{}] execution resource deletion failed: {}", id, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use flow_core::{DeletionPolicy, RunResult, TaskType};

    use super::*;
    use crate::executor::{ExecutionResponse, ExecutorError};
    use crate::testing::{processor, Call, FakeEngine, FakeExecutor};

    fn claimed(task_type: TaskType) -> TaskRun {
        let mut run = TaskRun::new("wfr-1", "build", task_type).with_image("alpine");
        run.id = "t-1".to_string();
        run.phase = RunPhase::Queued;
        run.agent_ref = Some("agent-1".to_string());
        run
    }

    fn ended(report: TaskDisposition) -> TaskReport {
        match report {
            TaskDisposition::Ended(report) => report,
            other => panic!("expected Ended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_image_ends_failed_without_touching_the_executor() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let mut run = claimed(TaskType::Template).with_deletion(DeletionPolicy::Always);
        run.spec.image = Some(String::new());

        let report = ended(processor.process_task_run(&run).await.unwrap());

        assert!(report.deletion.is_none());
        assert_eq!(
            engine.calls(),
            vec![
                Call::StartTask("t-1".to_string()),
                Call::EndTask(
                    "t-1".to_string(),
                    RunOutcome::failed("NO_TASK_IMAGE")
                ),
            ]
        );
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_execution_reports_results() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        executor.respond_with(Ok(ExecutionResponse {
            message: Some("built".to_string()),
            results: vec![RunResult::new("digest", "sha256:1")],
        }));
        let processor = processor(&engine, &executor);

        let report = ended(processor.process_task_run(&claimed(TaskType::Custom)).await.unwrap());

        assert_eq!(report.outcome.status, RunStatus::Succeeded);
        assert_eq!(report.outcome.results, vec![RunResult::new("digest", "sha256:1")]);
        assert!(report.deletion.is_none());
        assert_eq!(
            executor.calls(),
            vec![
                Call::Execute("t-1".to_string()),
                Call::CleanupParameters("t-1".to_string()),
            ]
        );
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn on_success_policy_deletes_only_after_success() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let run = claimed(TaskType::Template).with_deletion(DeletionPolicy::OnSuccess);

        let report = ended(processor.process_task_run(&run).await.unwrap());
        report.deletion.expect("deletion scheduled").await.unwrap();
        assert!(executor.calls().contains(&Call::DeleteExecution("t-1".to_string())));

        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        executor.respond_with(Err(ExecutorError::Execution("exit 1".to_string())));
        let processor = crate::testing::processor(&engine, &executor);

        let report = ended(processor.process_task_run(&run).await.unwrap());
        assert_eq!(report.outcome.status, RunStatus::Failed);
        assert!(report.deletion.is_none());
        assert!(!executor.calls().contains(&Call::DeleteExecution("t-1".to_string())));
    }

    #[tokio::test]
    async fn always_policy_deletes_after_failure() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        executor.respond_with(Err(ExecutorError::Execution("exit 1".to_string())));
        let processor = processor(&engine, &executor);
        let run = claimed(TaskType::Script).with_deletion(DeletionPolicy::Always);

        let report = ended(processor.process_task_run(&run).await.unwrap());
        report.deletion.expect("deletion scheduled").await.unwrap();
        assert_eq!(
            executor.calls().last(),
            Some(&Call::DeleteExecution("t-1".to_string()))
        );
    }

    #[tokio::test]
    async fn admission_denial_is_reported_as_failure() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        executor.respond_with(Err(ExecutorError::AdmissionDenied("quota exceeded".to_string())));
        let processor = processor(&engine, &executor);

        let report = ended(processor.process_task_run(&claimed(TaskType::Custom)).await.unwrap());

        assert_eq!(report.outcome.status, RunStatus::Failed);
        assert_eq!(
            report.outcome.status_message.as_deref(),
            Some("admission denied: quota exceeded")
        );
        assert!(executor.calls().contains(&Call::CleanupParameters("t-1".to_string())));
    }

    #[tokio::test]
    async fn cancelled_template_only_reaches_the_cancel_path() {
        for status in [RunStatus::Cancelled, RunStatus::TimedOut] {
            let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
            let processor = processor(&engine, &executor);
            let mut run = claimed(TaskType::Template);
            run.phase = RunPhase::Completed;
            run.status = status;

            let disposition = processor.process_task_run(&run).await.unwrap();

            assert!(matches!(disposition, TaskDisposition::Cancelled));
            assert_eq!(executor.calls(), vec![Call::Cancel("t-1".to_string())]);
            assert!(engine.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn unexpected_deliveries_are_skipped() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);

        let mut succeeded = claimed(TaskType::Template);
        succeeded.phase = RunPhase::Completed;
        succeeded.status = RunStatus::Succeeded;
        let decision = claimed(TaskType::Decision);

        for run in [succeeded, decision] {
            let disposition = processor.process_task_run(&run).await.unwrap();
            assert!(matches!(disposition, TaskDisposition::Skipped));
        }
        assert!(engine.calls().is_empty());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn run_cancelled_before_start_is_not_executed() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        engine.start_as(RunStatus::Cancelled);
        let processor = processor(&engine, &executor);
        let run = claimed(TaskType::Template).with_deletion(DeletionPolicy::Always);

        let disposition = processor.process_task_run(&run).await.unwrap();

        assert!(matches!(
            disposition,
            TaskDisposition::Superseded(RunStatus::Cancelled)
        ));
        assert_eq!(engine.calls(), vec![Call::StartTask("t-1".to_string())]);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_start_still_ends_the_task() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        engine.fail_start();
        let processor = processor(&engine, &executor);

        let report = ended(processor.process_task_run(&claimed(TaskType::Custom)).await.unwrap());

        assert_eq!(report.outcome.status, RunStatus::Failed);
        assert!(executor.calls().is_empty());
        assert!(matches!(engine.calls().last(), Some(Call::EndTask(id, _)) if id == "t-1"));
    }
}
