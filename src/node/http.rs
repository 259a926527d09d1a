//! Blocking HTTP transport to a DKG node.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

use super::{GetRequest, NodeApi, OperationResult, OperationType, PublishRequest, QueryRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationIdResponse {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct FinalityResponse {
    #[serde(default)]
    finality: u32,
}

/// A node reached over HTTP at `{endpoint}:{port}/{api_version}`.
pub struct HttpNode {
    base_url: String,
    auth_token: Option<String>,
    http: ureq::Agent,
}

impl HttpNode {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            http: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.base_url(),
            config.auth_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.auth_token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> NodeResult<T> {
        let mut request = self.authorize(self.http.get(&self.url(path)));
        for (key, value) in query {
            request = request.query(key, value);
        }
        tracing::trace!(path, "GET");
        read_json(request.call())
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> NodeResult<T> {
        let request = self.authorize(self.http.post(&self.url(path)));
        tracing::trace!(path, "POST");
        read_json(request.send_json(body))
    }

    fn submit<B: Serialize>(&self, path: &str, body: &B) -> NodeResult<String> {
        let response: OperationIdResponse = self.post_json(path, body)?;
        tracing::debug!(path, operation_id = %response.operation_id, "operation submitted");
        Ok(response.operation_id)
    }
}

fn read_json<T: DeserializeOwned>(result: Result<ureq::Response, ureq::Error>) -> NodeResult<T> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            let message = response
                .into_string()
                .unwrap_or_else(|e| format!("unreadable body: {e}"));
            return Err(NodeError::Status { status, message });
        }
        Err(e) => {
            return Err(NodeError::Request {
                message: e.to_string(),
            });
        }
    };
    response.into_json().map_err(|e| NodeError::Response {
        message: format!("failed to parse JSON: {e}"),
    })
}

impl NodeApi for HttpNode {
    fn info(&self) -> NodeResult<Value> {
        self.get_json("info", &[])
    }

    fn publish(&self, request: &PublishRequest) -> NodeResult<String> {
        self.submit("publish", request)
    }

    fn get(&self, request: &GetRequest) -> NodeResult<String> {
        self.submit("get", request)
    }

    fn query(&self, request: &QueryRequest) -> NodeResult<String> {
        self.submit("query", request)
    }

    fn get_operation_result(
        &self,
        operation: OperationType,
        operation_id: &str,
    ) -> NodeResult<OperationResult> {
        self.get_json(&format!("{}/{operation_id}", operation.as_str()), &[])
    }

    fn finality_status(&self, ual: &str) -> NodeResult<u32> {
        let response: FinalityResponse = self.get_json("finality", &[("ual", ual)])?;
        Ok(response.finality)
    }
}
