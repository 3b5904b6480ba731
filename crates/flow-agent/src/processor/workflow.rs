use flow_core::{RunPhase, RunStatus, WorkflowRun, WorkspaceScope};

use super::RunProcessor;
use crate::error::ProcessorError;
use crate::executor::workspace_reference;

/// What the processor did with a WorkflowRun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowDisposition {
    /// Workspaces provisioned (if any) and `StartWorkflow` sent.
    Started,
    /// Run-scoped workspaces removed and `FinalizeWorkflow` sent.
    Finalized,
    Skipped,
}

impl RunProcessor {
    pub async fn process_workflow_run(
        &self,
        run: &WorkflowRun,
    ) -> Result<WorkflowDisposition, ProcessorError> {
        match (run.phase, run.status) {
            (RunPhase::Pending | RunPhase::Queued, RunStatus::Ready) => {
                self.execute_workflow(run).await?;
                Ok(WorkflowDisposition::Started)
            }
            (RunPhase::Completed, _) => {
                self.teardown_workflow(run).await?;
                Ok(WorkflowDisposition::Finalized)
            }
            (phase, status) => {
                log::warn!(
                    "[{}] skipping workflow run delivered as {}/{}",
                    run.id,
                    phase,
                    status
                );
                Ok(WorkflowDisposition::Skipped)
            }
        }
    }

    async fn execute_workflow(&self, run: &WorkflowRun) -> Result<(), ProcessorError> {
        if run.has_workspaces() {
            for workspace in &run.workspaces {
                let reference = workspace_reference(workspace, &run.workflow_ref, &run.id);
                log::debug!("[{}] ensuring workspace {}", run.id, reference);
                self.executor.ensure_workspace(&reference).await?;
            }
        }
        self.engine.start_workflow(&run.id).await?;
        log::info!("[{}] workflow run started", run.id);
        Ok(())
    }

    async fn teardown_workflow(&self, run: &WorkflowRun) -> Result<(), ProcessorError> {
        let scoped = run
            .workspaces
            .iter()
            .filter(|workspace| workspace.scope == WorkspaceScope::WorkflowRun);
        for workspace in scoped {
            let reference = workspace_reference(workspace, &run.workflow_ref, &run.id);
            log::debug!("[{}] deleting workspace {}", run.id, reference);
            self.executor.delete_workspace(&reference).await?;
        }
        self.engine.finalize_workflow(&run.id).await?;
        log::info!("[{}] workflow run finalized", run.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use flow_core::Workspace;

    use super::*;
    use crate::testing::{processor, Call, FakeEngine, FakeExecutor};

    fn workspace(name: &str, scope: WorkspaceScope) -> Workspace {
        Workspace {
            name: name.to_string(),
            scope,
            optional: false,
            mount_path: None,
            size: None,
        }
    }

    fn claimed(run: WorkflowRun) -> WorkflowRun {
        let mut run = run;
        run.phase = RunPhase::Queued;
        run.agent_ref = Some("agent-1".to_string());
        run
    }

    #[tokio::test]
    async fn workflow_without_workspaces_starts_without_provisioning() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let mut run = claimed(WorkflowRun::new("build"));
        run.id = "wfr-1".to_string();

        let disposition = processor.process_workflow_run(&run).await.unwrap();

        assert_eq!(disposition, WorkflowDisposition::Started);
        assert_eq!(engine.calls(), vec![Call::StartWorkflow("wfr-1".to_string())]);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn workspaces_are_provisioned_before_start() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let mut run = claimed(
            WorkflowRun::new("build")
                .with_workspace(workspace("cache", WorkspaceScope::Workflow))
                .with_workspace(workspace("scratch", WorkspaceScope::WorkflowRun)),
        );
        run.id = "wfr-1".to_string();

        processor.process_workflow_run(&run).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![
                Call::EnsureWorkspace("wf-build-cache".to_string()),
                Call::EnsureWorkspace("wfrun-wfr-1-scratch".to_string()),
            ]
        );
        assert_eq!(engine.calls(), vec![Call::StartWorkflow("wfr-1".to_string())]);
    }

    #[tokio::test]
    async fn provisioning_failure_does_not_start_the_run() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        executor.fail_workspaces();
        let processor = processor(&engine, &executor);
        let run = claimed(
            WorkflowRun::new("build").with_workspace(workspace("cache", WorkspaceScope::Workflow)),
        );

        let err = processor.process_workflow_run(&run).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Execution(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn completed_workflow_tears_down_run_scoped_workspaces_only() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let mut run = WorkflowRun::new("build")
            .with_workspace(workspace("cache", WorkspaceScope::Workflow))
            .with_workspace(workspace("scratch", WorkspaceScope::WorkflowRun));
        run.id = "wfr-1".to_string();
        run.phase = RunPhase::Completed;
        run.status = RunStatus::Succeeded;

        let disposition = processor.process_workflow_run(&run).await.unwrap();

        assert_eq!(disposition, WorkflowDisposition::Finalized);
        assert_eq!(
            executor.calls(),
            vec![Call::DeleteWorkspace("wfrun-wfr-1-scratch".to_string())]
        );
        assert_eq!(engine.calls(), vec![Call::FinalizeWorkflow("wfr-1".to_string())]);
    }

    #[tokio::test]
    async fn running_workflow_is_skipped() {
        let (engine, executor) = (FakeEngine::new(), FakeExecutor::new());
        let processor = processor(&engine, &executor);
        let mut run = WorkflowRun::new("build");
        run.phase = RunPhase::Running;
        run.status = RunStatus::Running;

        let disposition = processor.process_workflow_run(&run).await.unwrap();
        assert_eq!(disposition, WorkflowDisposition::Skipped);
        assert!(engine.calls().is_empty());
    }
}
