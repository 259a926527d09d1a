//! High-level client: publish, retrieve and query knowledge collections.
//!
//! `DkgClient` ties the offline pipeline (normalize, link, root) to a storage
//! node and a blockchain. Both are injected through [`NodeApi`] and
//! [`ChainApi`], and polling sleeps through an injected [`Sleeper`], so the
//! whole flow runs in tests without network access or real delays.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::{ChainApi, CollectionReceipt, CreateCollectionRequest, NodeSignature, collect_signatures};
use crate::config::{
    ContentType, DkgConfig, GetOptions, NetworkTable, OutputFormat, PollOptions, PublishOptions, QueryOptions,
};
use crate::constants::PRIVATE_ASSERTION_PREDICATE;
use crate::dataset::{AssemblyOptions, Content, KnowledgeCollection, assemble, process_content};
use crate::error::{DatasetError, DkgResult, NodeError, NodeResult};
use crate::merkle::calculate_merkle_root;
use crate::node::{
    GetRequest, NodeApi, OperationResult, OperationStatus, OperationSummary, OperationType, PollOutcome,
    PublishRequest, QueryRequest, RetryPolicy, Sleeper, ThreadSleeper, await_finality, poll_operation,
};
use crate::rdf::{Term, parse_quad, query_type, to_json_ld};
use crate::ual::{format_ual, parse_ual};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A collection registered on chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCollection {
    pub ual: String,
    pub dataset_root: String,
    pub receipt: CollectionReceipt,
    /// Node signatures submitted with the collection.
    pub signatures: usize,
    /// Node signatures dropped during verification.
    pub skipped_signatures: usize,
    pub publish: OperationSummary,
    /// Finalization confirmations seen, when they were awaited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finality: Option<u32>,
}

/// Result of [`DkgClient::create`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CreateOutcome {
    Created(CreatedCollection),
    /// The node did not replicate the dataset well enough to go on chain.
    /// Nothing was submitted to the blockchain.
    #[serde(rename_all = "camelCase")]
    PublishIncomplete {
        dataset_root: String,
        operation: OperationSummary,
    },
}

impl CreateOutcome {
    pub fn ual(&self) -> Option<&str> {
        match self {
            CreateOutcome::Created(created) => Some(&created.ual),
            CreateOutcome::PublishIncomplete { .. } => None,
        }
    }

    pub fn dataset_root(&self) -> &str {
        match self {
            CreateOutcome::Created(created) => &created.dataset_root,
            CreateOutcome::PublishIncomplete { dataset_root, .. } => dataset_root,
        }
    }
}

/// An assertion in the requested output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Assertion {
    NQuads(Vec<String>),
    JsonLd(Value),
}

/// Result of [`DkgClient::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResult {
    pub ual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<Assertion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<Assertion>,
    /// Private root committed in the public assertion, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub operation: OperationSummary,
}

/// Result of [`DkgClient::query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub data: Value,
    pub operation: OperationSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishData {
    #[serde(default)]
    signatures: Vec<NodeSignature>,
    publisher_node_signature: Option<NodeSignature>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DkgClient<N, C, S = ThreadSleeper> {
    config: DkgConfig,
    networks: Arc<NetworkTable>,
    node: N,
    chain: C,
    sleeper: S,
}

impl<N: NodeApi, C: ChainApi> DkgClient<N, C> {
    pub fn new(config: DkgConfig, networks: Arc<NetworkTable>, node: N, chain: C) -> Self {
        Self {
            config,
            networks,
            node,
            chain,
            sleeper: ThreadSleeper,
        }
    }
}

impl<N: NodeApi, C: ChainApi, S: Sleeper> DkgClient<N, C, S> {
    /// Replace the sleeper used between polling attempts.
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> DkgClient<N, C, T> {
        DkgClient {
            config: self.config,
            networks: self.networks,
            node: self.node,
            chain: self.chain,
            sleeper,
        }
    }

    pub fn config(&self) -> &DkgConfig {
        &self.config
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    fn poll_policy(&self) -> RetryPolicy {
        PollOptions::default().resolve(&self.config.polling)
    }

    fn poll(&self, operation: OperationType, operation_id: &str) -> PollOutcome {
        poll_operation(&self.node, &self.sleeper, operation, operation_id, self.poll_policy())
    }

    /// Assemble `content` without talking to the network.
    pub fn assemble(&self, content: &Content, options: &PublishOptions) -> DkgResult<KnowledgeCollection> {
        let settings = options.resolve(&self.config.publish);
        let assembly = AssemblyOptions {
            input_format: self.config.dataset.input_format,
            chunk_byte_size: self.config.dataset.chunk_byte_size,
            max_file_size: self.config.dataset.max_file_size,
            canonicalization_work_limit: self.config.dataset.canonicalization_work_limit,
            epochs: settings.epochs,
            replication_factor: settings.replication_factor,
        };
        Ok(assemble(content, &assembly)?)
    }

    /// Publish `content` as a new knowledge collection.
    ///
    /// Returns [`CreateOutcome::PublishIncomplete`] when the publish operation
    /// ends neither `COMPLETED` nor with enough acknowledgements. Polling that
    /// runs out of attempts is an error.
    pub fn create(&self, content: &Content, options: &PublishOptions) -> DkgResult<CreateOutcome> {
        let settings = options.resolve(&self.config.publish);
        let blockchain = self.chain.blockchain_id().to_string();
        self.networks.require(self.config.environment, &blockchain)?;

        let collection = self.assemble(content, options)?;
        let storage_address = self.chain.knowledge_collection_storage_address()?;
        tracing::info!(
            dataset_root = %collection.dataset_root,
            byte_size = collection.byte_size,
            subjects = collection.distinct_subjects,
            %blockchain,
            "publishing knowledge collection"
        );

        let operation_id = self.node.publish(&PublishRequest {
            dataset_root: collection.dataset_root.clone(),
            dataset: collection.dataset.clone(),
            blockchain: blockchain.clone(),
            hash_function_id: settings.hash_function_id,
            minimum_number_of_node_replications: settings.replication_factor,
        })?;

        let result = self
            .poll(OperationType::Publish, &operation_id)
            .into_terminal(OperationType::Publish, &operation_id)?;
        let publish = OperationSummary::from_result(&operation_id, &result);

        if result.status != OperationStatus::Completed && !result.min_acks_reached() {
            tracing::warn!(
                %operation_id,
                status = %result.status,
                "publish did not reach the required replication"
            );
            return Ok(CreateOutcome::PublishIncomplete {
                dataset_root: collection.dataset_root,
                operation: publish,
            });
        }

        let data = publish_data(&result)?;
        let publisher = data.publisher_node_signature.ok_or_else(|| NodeError::Response {
            message: "publish result has no publisherNodeSignature".into(),
        })?;
        let collected = collect_signatures(&self.chain, &collection.dataset_root, &data.signatures);

        let receipt = self.chain.create_knowledge_collection(&CreateCollectionRequest {
            publish_operation_id: operation_id.clone(),
            dataset_root: collection.dataset_root.clone(),
            knowledge_assets_amount: collection.distinct_subjects,
            byte_size: collection.byte_size,
            epochs: settings.epochs,
            token_amount: settings.token_amount,
            is_immutable: settings.immutable,
            paymaster: settings.paymaster.clone(),
            publisher_node_identity_id: publisher.identity_id,
            publisher_node_r: publisher.r,
            publisher_node_vs: publisher.vs,
            identity_ids: collected.identity_ids.clone(),
            r: collected.r.clone(),
            vs: collected.vs.clone(),
        })?;

        let ual = format_ual(&blockchain, &storage_address, receipt.knowledge_collection_id, None);
        tracing::info!(%ual, tx = %receipt.transaction_hash, "knowledge collection created");

        let finality = (settings.finalization_confirmations > 0).then(|| {
            await_finality(
                &self.node,
                &self.sleeper,
                &ual,
                settings.finalization_confirmations,
                self.poll_policy(),
            )
        });

        Ok(CreateOutcome::Created(CreatedCollection {
            ual,
            dataset_root: collection.dataset_root,
            receipt,
            signatures: collected.len(),
            skipped_signatures: collected.skipped,
            publish,
            finality,
        }))
    }

    /// Retrieve the collection or asset behind `ual`.
    pub fn get(&self, ual: &str, options: &GetOptions) -> DkgResult<GetResult> {
        let settings = options.resolve(&self.config.get);
        let parsed = parse_ual(ual)?;

        let operation_id = self.node.get(&GetRequest {
            id: parsed.to_string(),
            content_type: settings.content_type,
            include_metadata: settings.include_metadata,
            hash_function_id: settings.hash_function_id,
            paranet_ual: settings.paranet_ual.clone(),
            subject_ual: settings.subject_ual,
        })?;
        let result = self
            .poll(OperationType::Get, &operation_id)
            .into_result(OperationType::Get, &operation_id)?;
        let operation = OperationSummary::from_result(&operation_id, &result);

        let data = result.data.as_ref().ok_or_else(|| NodeError::Response {
            message: "unable to find state on the network".into(),
        })?;
        let (public, private) = split_assertion(data)?;

        let private_root = match &public {
            Some(public) => committed_private_root(public),
            None => None,
        };
        if settings.validate {
            if let (Some(private), Some(expected)) = (&private, &private_root) {
                let actual = calculate_merkle_root(private, self.config.dataset.chunk_byte_size)?;
                if &actual != expected {
                    return Err(DatasetError::RootMismatch {
                        expected: expected.clone(),
                        actual,
                    }
                    .into());
                }
                tracing::debug!(root = %actual, "private assertion verified");
            }
        }

        let (public, private) = match settings.content_type {
            ContentType::Public => (public, None),
            ContentType::Private => (None, private),
            ContentType::All => (public, private),
        };
        let metadata = if settings.include_metadata {
            data.get("metadata").cloned()
        } else {
            None
        };

        Ok(GetResult {
            ual: parsed.to_string(),
            public: public.map(|quads| format_assertion(quads, settings.output_format)).transpose()?,
            private: private.map(|quads| format_assertion(quads, settings.output_format)).transpose()?,
            private_root,
            metadata,
            operation,
        })
    }

    /// Run a SPARQL query on the node.
    pub fn query(&self, query: &str, options: &QueryOptions) -> DkgResult<QueryResult> {
        let options = options.resolve(&self.config.query);
        let query_type = query_type(query)?;
        tracing::debug!(%query_type, repository = ?options.repository, "submitting query");

        let operation_id = self.node.query(&QueryRequest {
            query: query.to_string(),
            query_type,
            repository: options.repository,
            paranet_ual: options.paranet_ual,
        })?;
        let result = self
            .poll(OperationType::Query, &operation_id)
            .into_result(OperationType::Query, &operation_id)?;

        Ok(QueryResult {
            operation: OperationSummary::from_result(&operation_id, &result),
            data: result.data.unwrap_or(Value::Null),
        })
    }
}

fn publish_data(result: &OperationResult) -> NodeResult<PublishData> {
    match &result.data {
        Some(data) => serde_json::from_value(data.clone()).map_err(|e| NodeError::Response {
            message: format!("malformed publish result: {e}"),
        }),
        None => Ok(PublishData::default()),
    }
}

fn assertion_lines(value: &Value) -> NodeResult<Vec<String>> {
    match value {
        Value::String(text) => Ok(process_content(text)),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| NodeError::Response {
                    message: format!("assertion entry is not a string: {item}"),
                })
            })
            .collect(),
        other => Err(NodeError::Response {
            message: format!("unexpected assertion shape: {other}"),
        }),
    }
}

/// `data.assertion` is either a quad list (public only) or `{public, private}`.
fn split_assertion(data: &Value) -> NodeResult<(Option<Vec<String>>, Option<Vec<String>>)> {
    let assertion = data.get("assertion").ok_or_else(|| NodeError::Response {
        message: "unable to find state on the network".into(),
    })?;
    match assertion {
        Value::Object(parts) => {
            let part = |key: &str| -> NodeResult<Option<Vec<String>>> {
                match parts.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(value) => Ok(Some(assertion_lines(value)?).filter(|q| !q.is_empty())),
                }
            };
            Ok((part("public")?, part("private")?))
        }
        other => Ok((Some(assertion_lines(other)?), None)),
    }
}

/// The `privateMerkleRoot` literal of a public assertion.
fn committed_private_root(public: &[String]) -> Option<String> {
    public
        .iter()
        .filter(|line| line.contains(PRIVATE_ASSERTION_PREDICATE))
        .filter_map(|line| parse_quad(line).ok())
        .find_map(|quad| match (&quad.predicate, quad.object) {
            (Term::Iri(predicate), Term::Literal(literal)) if predicate == PRIVATE_ASSERTION_PREDICATE => {
                Some(literal.value)
            }
            _ => None,
        })
}

fn format_assertion(quads: Vec<String>, format: OutputFormat) -> DkgResult<Assertion> {
    Ok(match format {
        OutputFormat::NQuads => Assertion::NQuads(quads),
        OutputFormat::JsonLd => Assertion::JsonLd(to_json_ld(&quads)?),
    })
}
