//! Storage node interface.
//!
//! [`NodeApi`] is the seam between the client and a DKG node. [`HttpNode`]
//! talks to a real node over HTTP; tests substitute in-memory nodes.

pub mod http;
pub mod poll;

pub use http::HttpNode;
pub use poll::{PollOutcome, RetryPolicy, Sleeper, ThreadSleeper, await_finality, poll_operation};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ContentType;
use crate::dataset::Dataset;
use crate::error::NodeResult;

pub use crate::rdf::QueryType;

/// Asynchronous operations a node runs on the client's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Publish,
    Get,
    Query,
    LocalStore,
}

impl OperationType {
    /// Path segment used by the node API.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Publish => "publish",
            OperationType::Get => "get",
            OperationType::Query => "query",
            OperationType::LocalStore => "local-store",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an operation as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
    /// Any intermediate status, such as `PUBLISH_REPLICATE_START`.
    Other(String),
}

impl OperationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Other(status) => status,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

impl From<String> for OperationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => OperationStatus::Pending,
            "COMPLETED" => OperationStatus::Completed,
            "FAILED" => OperationStatus::Failed,
            _ => OperationStatus::Other(value),
        }
    }
}

impl From<OperationStatus> for String {
    fn from(status: OperationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /{operation}/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationResult {
    pub fn new(status: OperationStatus, data: Option<Value>) -> Self {
        Self { status, data }
    }

    fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    /// Whether enough nodes acknowledged a publish, even if it is not
    /// `COMPLETED` yet.
    pub fn min_acks_reached(&self) -> bool {
        self.data_field("minAcksReached")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn error_type(&self) -> Option<&str> {
        self.data_field("errorType").and_then(Value::as_str)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.data_field("errorMessage").and_then(Value::as_str)
    }
}

/// Operation id and status summary returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OperationSummary {
    pub fn from_result(operation_id: &str, result: &OperationResult) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            status: result.status.clone(),
            error_type: result.error_type().map(str::to_string),
            error_message: result.error_message().map(str::to_string),
        }
    }
}

/// `POST /publish`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub dataset_root: String,
    pub dataset: Dataset,
    pub blockchain: String,
    pub hash_function_id: u8,
    pub minimum_number_of_node_replications: u32,
}

/// `POST /get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    pub id: String,
    pub content_type: ContentType,
    pub include_metadata: bool,
    pub hash_function_id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paranet_ual: Option<String>,
    pub subject_ual: bool,
}

/// `POST /query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paranet_ual: Option<String>,
}

/// A DKG storage node.
pub trait NodeApi {
    /// Node version and identity.
    fn info(&self) -> NodeResult<Value>;

    /// Submit a dataset for replication. Returns the operation id.
    fn publish(&self, request: &PublishRequest) -> NodeResult<String>;

    /// Request a knowledge collection. Returns the operation id.
    fn get(&self, request: &GetRequest) -> NodeResult<String>;

    /// Submit a SPARQL query. Returns the operation id.
    fn query(&self, request: &QueryRequest) -> NodeResult<String>;

    fn get_operation_result(
        &self,
        operation: OperationType,
        operation_id: &str,
    ) -> NodeResult<OperationResult>;

    /// Number of nodes that have finalized the collection behind `ual`.
    fn finality_status(&self, ual: &str) -> NodeResult<u32>;
}

impl<T: NodeApi + ?Sized> NodeApi for &T {
    fn info(&self) -> NodeResult<Value> {
        (**self).info()
    }

    fn publish(&self, request: &PublishRequest) -> NodeResult<String> {
        (**self).publish(request)
    }

    fn get(&self, request: &GetRequest) -> NodeResult<String> {
        (**self).get(request)
    }

    fn query(&self, request: &QueryRequest) -> NodeResult<String> {
        (**self).query(request)
    }

    fn get_operation_result(
        &self,
        operation: OperationType,
        operation_id: &str,
    ) -> NodeResult<OperationResult> {
        (**self).get_operation_result(operation, operation_id)
    }

    fn finality_status(&self, ual: &str) -> NodeResult<u32> {
        (**self).finality_status(ual)
    }
}
