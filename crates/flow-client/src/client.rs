use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

use flow_core::{AgentRegistration, RunOutcome, TaskRun, WorkflowRun};

use crate::client_trait::EngineApi;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone)]
pub struct EngineClientConfig {
    pub base_url: String,
    /// Upper bound for any single call; must exceed the Engine's poll window.
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl EngineClientConfig {
    /// Extra time on top of the poll window before a long-poll is abandoned.
    pub const POLL_SLACK: Duration = Duration::from_secs(15);

    pub fn new(base_url: impl Into<String>, poll_window: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: poll_window + Self::POLL_SLACK,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// HTTP client for the Engine's dispatch and callback endpoints.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl EngineClient {
    pub fn new(config: EngineClientConfig) -> ClientResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(config.base_url));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client: Self::build_retry_client(client, config.max_retries),
            base_url,
        })
    }

    fn build_retry_client(client: Client, max_retries: u32) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// `204 No Content` means the poll window elapsed empty.
    async fn poll<T: DeserializeOwned>(&self, path: &str) -> ClientResult<Vec<T>> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = Self::check(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn put(&self, path: &str) -> ClientResult<()> {
        let response = self.client.put(self.url(path)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl EngineApi for EngineClient {
    async fn register_agent(&self, registration: &AgentRegistration) -> ClientResult<String> {
        let response = self
            .client
            .post(self.url("/agent/register"))
            .json(registration)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;

        // Accept both a bare id and a JSON string.
        let id = serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_string());
        if id.is_empty() {
            return Err(ClientError::InvalidResponse(
                "empty agent id in registration response".to_string(),
            ));
        }
        Ok(id)
    }

    async fn claim_workflow_runs(&self, agent_id: &str) -> ClientResult<Vec<WorkflowRun>> {
        let runs: Vec<WorkflowRun> = self.poll(&format!("/agent/{agent_id}/workflows")).await?;
        debug!("Claimed {} workflow run(s)", runs.len());
        Ok(runs)
    }

    async fn claim_task_runs(&self, agent_id: &str) -> ClientResult<Vec<TaskRun>> {
        let runs: Vec<TaskRun> = self.poll(&format!("/agent/{agent_id}/tasks")).await?;
        debug!("Claimed {} task run(s)", runs.len());
        Ok(runs)
    }

    async fn start_workflow(&self, id: &str) -> ClientResult<()> {
        self.put(&format!("/workflowrun/{id}/start")).await
    }

    async fn finalize_workflow(&self, id: &str) -> ClientResult<()> {
        self.put(&format!("/workflowrun/{id}/finalize")).await
    }

    async fn start_task(&self, id: &str) -> ClientResult<TaskRun> {
        let response = self
            .client
            .put(self.url(&format!("/taskrun/{id}/start")))
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn end_task(&self, id: &str, outcome: &RunOutcome) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/taskrun/{id}/end")))
            .json(outcome)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
