//! Recording fakes of the Engine and the executor for processor and poller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use flow_client::{ClientError, ClientResult, EngineApi};
use flow_core::{
    AgentRegistration, DeletionPolicy, RunOutcome, RunPhase, RunStatus, TaskRun, TaskType,
    WorkflowRun,
};

use crate::executor::{
    ExecutionRequest, ExecutionResponse, ExecutorError, ExecutorResult, TaskExecutor,
};
use crate::processor::{ProcessorSettings, RunProcessor};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartWorkflow(String),
    FinalizeWorkflow(String),
    StartTask(String),
    EndTask(String, RunOutcome),
    EnsureWorkspace(String),
    DeleteWorkspace(String),
    Execute(String),
    Cancel(String),
    CleanupParameters(String),
    DeleteExecution(String),
}

fn server_error() -> ClientError {
    ClientError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

/// Engine fake. Claims pop scripted responses, then behave like an empty poll.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    workflow_polls: Mutex<VecDeque<ClientResult<Vec<WorkflowRun>>>>,
    task_polls: Mutex<VecDeque<ClientResult<Vec<TaskRun>>>>,
    fail_start: Mutex<bool>,
    started_as: Mutex<Option<RunStatus>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_start(&self) {
        *self.fail_start.lock().unwrap() = true;
    }

    /// Status the run reports back from StartTask; `running` by default.
    pub fn start_as(&self, status: RunStatus) {
        *self.started_as.lock().unwrap() = Some(status);
    }

    pub fn push_workflow_poll(&self, response: ClientResult<Vec<WorkflowRun>>) {
        self.workflow_polls.lock().unwrap().push_back(response);
    }

    pub fn push_task_poll(&self, response: ClientResult<Vec<TaskRun>>) {
        self.task_polls.lock().unwrap().push_back(response);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EngineApi for FakeEngine {
    async fn register_agent(&self, _registration: &AgentRegistration) -> ClientResult<String> {
        Ok("agent-1".to_string())
    }

    async fn claim_workflow_runs(&self, _agent_id: &str) -> ClientResult<Vec<WorkflowRun>> {
        let next = self.workflow_polls.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn claim_task_runs(&self, _agent_id: &str) -> ClientResult<Vec<TaskRun>> {
        let next = self.task_polls.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn start_workflow(&self, id: &str) -> ClientResult<()> {
        self.record(Call::StartWorkflow(id.to_string()));
        Ok(())
    }

    async fn finalize_workflow(&self, id: &str) -> ClientResult<()> {
        self.record(Call::FinalizeWorkflow(id.to_string()));
        Ok(())
    }

    async fn start_task(&self, id: &str) -> ClientResult<TaskRun> {
        if *self.fail_start.lock().unwrap() {
            return Err(server_error());
        }
        self.record(Call::StartTask(id.to_string()));

        let status = self.started_as.lock().unwrap().unwrap_or(RunStatus::Running);
        let mut run = TaskRun::new("wfr-1", "task", TaskType::Custom);
        run.id = id.to_string();
        run.status = status;
        run.phase = if status.is_terminal() {
            RunPhase::Completed
        } else {
            RunPhase::Running
        };
        Ok(run)
    }

    async fn end_task(&self, id: &str, outcome: &RunOutcome) -> ClientResult<()> {
        self.record(Call::EndTask(id.to_string(), outcome.clone()));
        Ok(())
    }
}

/// Executor fake; `execute` succeeds with an empty response unless told otherwise.
#[derive(Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<Call>>,
    response: Mutex<Option<ExecutorResult<ExecutionResponse>>>,
    fail_workspaces: Mutex<bool>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn respond_with(&self, response: ExecutorResult<ExecutionResponse>) {
        *self.response.lock().unwrap() = Some(response);
    }

    pub fn fail_workspaces(&self) {
        *self.fail_workspaces.lock().unwrap() = true;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn ensure_workspace(&self, reference: &str) -> ExecutorResult<()> {
        self.record(Call::EnsureWorkspace(reference.to_string()));
        if *self.fail_workspaces.lock().unwrap() {
            return Err(ExecutorError::Execution("volume quota".to_string()));
        }
        Ok(())
    }

    async fn delete_workspace(&self, reference: &str) -> ExecutorResult<()> {
        self.record(Call::DeleteWorkspace(reference.to_string()));
        Ok(())
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionResponse> {
        self.record(Call::Execute(request.task_run_id.clone()));
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(ExecutionResponse::default()))
    }

    async fn cancel(&self, task_run_id: &str) -> ExecutorResult<()> {
        self.record(Call::Cancel(task_run_id.to_string()));
        Ok(())
    }

    async fn cleanup_parameters(&self, task_run_id: &str) -> ExecutorResult<()> {
        self.record(Call::CleanupParameters(task_run_id.to_string()));
        Ok(())
    }

    async fn delete_execution(&self, task_run_id: &str) -> ExecutorResult<()> {
        self.record(Call::DeleteExecution(task_run_id.to_string()));
        Ok(())
    }
}

pub fn settings() -> ProcessorSettings {
    ProcessorSettings {
        default_timeout: Duration::from_secs(60),
        admission_timeout: Duration::from_secs(5),
        deletion_policy: DeletionPolicy::Never,
        cleanup_delay: Duration::ZERO,
    }
}

pub fn processor(engine: &Arc<FakeEngine>, executor: &Arc<FakeExecutor>) -> RunProcessor {
    RunProcessor::new(engine.clone(), executor.clone(), settings())
}
