use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use flow_core::RunResult;

use super::{ExecutionRequest, ExecutionResponse, ExecutorError, ExecutorResult, TaskExecutor};

const PARAMS_FILE: &str = "params.json";
const RESULTS_DIR: &str = "results";
const STDERR_TAIL: usize = 512;

/// Runs TaskRuns as local subprocesses under a work directory.
///
/// Layout: `<work_dir>/runs/<taskRunId>` holds `params.json` and the
/// `results/` directory, `<work_dir>/workspaces/<reference>` holds volumes.
/// Ids, references and result names must each be a single path segment.
pub struct LocalProcessExecutor {
    work_dir: PathBuf,
    running: DashMap<String, CancellationToken>,
}

enum Finished {
    Exited(io::Result<Output>),
    Cancelled,
    TimedOut,
}

impl LocalProcessExecutor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            running: DashMap::new(),
        }
    }

    pub fn run_dir(&self, task_run_id: &str) -> ExecutorResult<PathBuf> {
        Ok(self.work_dir.join("runs").join(path_segment(task_run_id, "TaskRun id")?))
    }

    pub fn workspace_dir(&self, reference: &str) -> ExecutorResult<PathBuf> {
        Ok(self.work_dir.join("workspaces").join(path_segment(reference, "workspace")?))
    }

    fn command(&self, request: &ExecutionRequest, run_dir: &Path) -> ExecutorResult<Command> {
        let script = request.script.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let program = request.command.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut command = match (script, program) {
            (Some(script), _) => {
                let mut command = Command::new("sh");
                // Arguments land in $1.. after the $0 placeholder.
                command.arg("-c").arg(script).arg("sh").args(&request.arguments);
                command
            }
            (None, Some(program)) => {
                let mut command = Command::new(program);
                command.args(&request.arguments);
                command
            }
            (None, None) => {
                return Err(ExecutorError::AdmissionDenied(format!(
                    "TaskRun {} declares neither a command nor a script",
                    request.task_run_id
                )))
            }
        };

        let working_dir = request
            .working_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| run_dir.to_path_buf());

        command
            .current_dir(working_dir)
            .env("FLOW_TASK_RUN_ID", &request.task_run_id)
            .env("FLOW_WORKFLOW_RUN_ID", &request.workflow_run_id)
            .env("FLOW_IMAGE", &request.image)
            .env("PARAMS_FILE", run_dir.join(PARAMS_FILE))
            .env("RESULTS_DIR", run_dir.join(RESULTS_DIR));
        for param in &request.params {
            command.env(param_env_name(&param.name), param_env_value(&param.value));
        }
        for workspace in &request.workspaces {
            command.env(
                format!("WORKSPACE_{}", env_key(&workspace.name)),
                self.workspace_dir(&workspace.reference)?,
            );
        }
        for var in &request.env {
            command.env(&var.name, &var.value);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    async fn prepare(&self, request: &ExecutionRequest, run_dir: &Path) -> ExecutorResult<()> {
        tokio::fs::create_dir_all(run_dir.join(RESULTS_DIR)).await?;

        let params: serde_json::Map<String, serde_json::Value> = request
            .params
            .iter()
            .map(|param| (param.name.clone(), param.value.clone()))
            .collect();
        let body = serde_json::to_vec_pretty(&params)
            .map_err(|e| ExecutorError::Execution(format!("failed to encode params: {e}")))?;
        tokio::fs::write(run_dir.join(PARAMS_FILE), body).await?;

        for workspace in &request.workspaces {
            tokio::fs::create_dir_all(self.workspace_dir(&workspace.reference)?).await?;
        }
        Ok(())
    }

    async fn collect_results(
        &self,
        request: &ExecutionRequest,
        run_dir: &Path,
    ) -> ExecutorResult<Vec<RunResult>> {
        let mut results = Vec::with_capacity(request.result_names.len());
        for name in &request.result_names {
            let path = run_dir.join(RESULTS_DIR).join(name);
            let value = match tokio::fs::read_to_string(&path).await {
                Ok(value) => value,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(ExecutorError::Execution(format!(
                        "result {name} was not produced"
                    )))
                }
                Err(e) => return Err(e.into()),
            };
            results.push(RunResult::new(name.as_str(), value.trim_end_matches('\n')));
        }
        Ok(results)
    }
}

#[async_trait]
impl TaskExecutor for LocalProcessExecutor {
    async fn ensure_workspace(&self, reference: &str) -> ExecutorResult<()> {
        tokio::fs::create_dir_all(self.workspace_dir(reference)?).await?;
        Ok(())
    }

    async fn delete_workspace(&self, reference: &str) -> ExecutorResult<()> {
        ignore_missing(tokio::fs::remove_dir_all(self.workspace_dir(reference)?).await)
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionResponse> {
        let id = request.task_run_id.clone();
        let run_dir = self.run_dir(&id)?;
        for name in &request.result_names {
            path_segment(name, "result name")?;
        }

        // A cancel may land before the process exists; it leaves a cancelled
        // token behind for this lookup to find.
        let token = self.running.entry(id.clone()).or_default().clone();
        let result = self.run(&request, &run_dir, &token).await;
        self.running.remove(&id);
        result
    }

    async fn cancel(&self, task_run_id: &str) -> ExecutorResult<()> {
        self.running.entry(task_run_id.to_string()).or_default().cancel();
        log::info!("[{}] process cancelled", task_run_id);
        Ok(())
    }

    async fn cleanup_parameters(&self, task_run_id: &str) -> ExecutorResult<()> {
        ignore_missing(tokio::fs::remove_file(self.run_dir(task_run_id)?.join(PARAMS_FILE)).await)
    }

    async fn delete_execution(&self, task_run_id: &str) -> ExecutorResult<()> {
        let run_dir = self.run_dir(task_run_id)?;
        self.running.remove(task_run_id);
        ignore_missing(tokio::fs::remove_dir_all(run_dir).await)
    }
}

impl LocalProcessExecutor {
    async fn run(
        &self,
        request: &ExecutionRequest,
        run_dir: &Path,
        token: &CancellationToken,
    ) -> ExecutorResult<ExecutionResponse> {
        let id = &request.task_run_id;
        if token.is_cancelled() {
            return Err(cancelled());
        }
        let mut command = self.command(request, run_dir)?;

        tokio::time::timeout(request.admission_timeout, self.prepare(request, run_dir))
            .await
            .map_err(|_| {
                ExecutorError::AdmissionDenied(format!(
                    "resources for {} not ready within {:?}",
                    id, request.admission_timeout
                ))
            })??;
        if token.is_cancelled() {
            return Err(cancelled());
        }

        let child = command.spawn().map_err(|e| {
            ExecutorError::AdmissionDenied(format!("failed to start process: {e}"))
        })?;
        log::info!("[{}] process started (image {})", id, request.image);

        let finished = tokio::select! {
            output = child.wait_with_output() => Finished::Exited(output),
            _ = token.cancelled() => Finished::Cancelled,
            _ = tokio::time::sleep(request.timeout) => Finished::TimedOut,
        };

        let output = match finished {
            Finished::Exited(output) => output?,
            Finished::Cancelled => return Err(cancelled()),
            Finished::TimedOut => {
                return Err(ExecutorError::Execution(format!(
                    "timed out after {:?}",
                    request.timeout
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if request.debug {
            log::debug!("[{}] stdout:\n{}", id, stdout);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutorError::Execution(format!(
                "{}: {}",
                output.status,
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }

        let results = self.collect_results(request, run_dir).await?;
        Ok(ExecutionResponse {
            message: stdout
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string),
            results,
        })
    }
}

fn path_segment<'a>(value: &'a str, what: &str) -> ExecutorResult<&'a str> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => Err(ExecutorError::AdmissionDenied(format!(
            "{what} {value:?} is not a plain file name"
        ))),
    }
}

fn cancelled() -> ExecutorError {
    ExecutorError::Execution("cancelled".to_string())
}

fn ignore_missing(result: io::Result<()>) -> ExecutorResult<()> {
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn param_env_name(name: &str) -> String {
    format!("PARAM_{}", env_key(name))
}

fn param_env_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
