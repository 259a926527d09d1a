//! Client orchestration tests against in-memory node and chain fakes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use dkg_client::chain::{
    ChainApi, CollectionReceipt, CreateCollectionRequest, NodeSignature, address_key_hash,
};
use dkg_client::client::{Assertion, CreateOutcome, DkgClient};
use dkg_client::config::{
    ContentType, DkgConfig, Environment, GetOptions, NetworkTable, OutputFormat, PollOptions,
    PublishOptions, QueryOptions,
};
use dkg_client::constants::PRIVATE_ASSERTION_PREDICATE;
use dkg_client::dataset::Content;
use dkg_client::error::{ChainResult, ConfigError, DatasetError, DkgError, NodeError, NodeResult, RdfError, UalError};
use dkg_client::hash::Hash;
use dkg_client::merkle::dataset_root;
use dkg_client::node::{
    GetRequest, NodeApi, OperationResult, OperationStatus, OperationType, PublishRequest, QueryRequest,
    QueryType, Sleeper,
};
use dkg_client::rdf::InputFormat;

const STORAGE: &str = "0x8f8827f2a5a41a0bdb1fbf6c0a3ab2d7e6e1f6c1";
const SIGNER_A: &str = "0x1111111111111111111111111111111111111111";
const SIGNER_B: &str = "0x2222222222222222222222222222222222222222";
const ALICE_UAL: &str = "did:dkg:hardhat1:31337/0x8f8827f2a5a41a0bdb1fbf6c0a3ab2d7e6e1f6c1/7";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeNode {
    results: RefCell<HashMap<OperationType, Vec<OperationResult>>>,
    polls: RefCell<u32>,
    finality: u32,
    published: RefCell<Vec<PublishRequest>>,
    gets: RefCell<Vec<GetRequest>>,
    queries: RefCell<Vec<QueryRequest>>,
}

impl FakeNode {
    /// Results are returned in order; once exhausted the operation stays pending.
    fn script(self, operation: OperationType, mut results: Vec<OperationResult>) -> Self {
        results.reverse();
        self.results.borrow_mut().insert(operation, results);
        self
    }
}

impl NodeApi for FakeNode {
    fn info(&self) -> NodeResult<Value> {
        Ok(json!({"version": "8.0.0"}))
    }

    fn publish(&self, request: &PublishRequest) -> NodeResult<String> {
        self.published.borrow_mut().push(request.clone());
        Ok("op-publish".into())
    }

    fn get(&self, request: &GetRequest) -> NodeResult<String> {
        self.gets.borrow_mut().push(request.clone());
        Ok("op-get".into())
    }

    fn query(&self, request: &QueryRequest) -> NodeResult<String> {
        self.queries.borrow_mut().push(request.clone());
        Ok("op-query".into())
    }

    fn get_operation_result(&self, operation: OperationType, _: &str) -> NodeResult<OperationResult> {
        *self.polls.borrow_mut() += 1;
        Ok(self
            .results
            .borrow_mut()
            .get_mut(&operation)
            .and_then(Vec::pop)
            .unwrap_or_else(|| OperationResult::new(OperationStatus::Pending, None)))
    }

    fn finality_status(&self, _: &str) -> NodeResult<u32> {
        Ok(self.finality)
    }
}

/// Signers are carried in `r`; an `r` of `"bad"` cannot be recovered.
struct FakeChain {
    blockchain: String,
    operational: HashSet<(u64, Hash)>,
    created: RefCell<Vec<CreateCollectionRequest>>,
}

impl FakeChain {
    fn new() -> Self {
        Self {
            blockchain: "hardhat1:31337".into(),
            operational: HashSet::from([(1, address_key_hash(SIGNER_A).unwrap())]),
            created: RefCell::new(Vec::new()),
        }
    }
}

impl ChainApi for FakeChain {
    fn blockchain_id(&self) -> &str {
        &self.blockchain
    }

    fn knowledge_collection_storage_address(&self) -> ChainResult<String> {
        Ok(STORAGE.into())
    }

    fn recover_signer(&self, _: &str, signature: &NodeSignature) -> ChainResult<String> {
        if signature.r == "bad" {
            return Err(dkg_client::error::ChainError::Signature {
                message: "cannot recover".into(),
            });
        }
        Ok(signature.r.clone())
    }

    fn key_has_purpose(&self, identity_id: u64, key_hash: &Hash, _: u8) -> ChainResult<bool> {
        Ok(self.operational.contains(&(identity_id, *key_hash)))
    }

    fn create_knowledge_collection(&self, request: &CreateCollectionRequest) -> ChainResult<CollectionReceipt> {
        self.created.borrow_mut().push(request.clone());
        Ok(CollectionReceipt {
            knowledge_collection_id: 7,
            transaction_hash: "0xfeed".into(),
        })
    }
}

#[derive(Default)]
struct RecordingSleeper(RefCell<Vec<Duration>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> DkgConfig {
    let mut config = DkgConfig {
        environment: Environment::Development,
        blockchain: "hardhat1:31337".into(),
        ..DkgConfig::default()
    };
    config.dataset.input_format = InputFormat::NQuads;
    config.polling = PollOptions {
        max_number_of_retries: Some(3),
        frequency_secs: Some(1),
    };
    config.publish.finalization_confirmations = Some(0);
    config.query.repository = Some("dkg".into());
    config
}

fn client<'a>(
    node: &'a FakeNode,
    chain: &'a FakeChain,
    sleeper: &'a RecordingSleeper,
) -> DkgClient<&'a FakeNode, &'a FakeChain, &'a RecordingSleeper> {
    DkgClient::new(test_config(), Arc::new(NetworkTable::builtin()), node, chain).with_sleeper(sleeper)
}

fn alice() -> Content {
    Content::Text("<http://example.org/alice> <http://schema.org/name> \"Alice\" .".into())
}

fn completed(data: Value) -> OperationResult {
    OperationResult::new(OperationStatus::Completed, Some(data))
}

fn signed_publish_data() -> Value {
    json!({
        "signatures": [
            {"identityId": 1, "r": SIGNER_A, "vs": "0xa1"},
            {"identityId": 2, "r": SIGNER_B, "vs": "0xb2"},
            {"identityId": 3, "r": "bad", "vs": "0xc3"}
        ],
        "publisherNodeSignature": {"identityId": 9, "r": "0x99", "vs": "0x98"}
    })
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[test]
fn create_publishes_and_registers_collection() {
    let node = FakeNode::default().script(OperationType::Publish, vec![
        OperationResult::new(OperationStatus::Other("PUBLISH_REPLICATE_START".into()), None),
        completed(signed_publish_data()),
    ]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let outcome = client(&node, &chain, &sleeper)
        .create(&alice(), &PublishOptions::default())
        .unwrap();

    let created = match outcome {
        CreateOutcome::Created(created) => created,
        other => panic!("expected a created collection, got {other:?}"),
    };
    assert_eq!(created.ual, ALICE_UAL);
    assert_eq!(created.signatures, 1);
    assert_eq!(created.skipped_signatures, 2);
    assert_eq!(created.finality, None);
    assert_eq!(created.receipt.transaction_hash, "0xfeed");
    assert_eq!(created.publish.status, OperationStatus::Completed);

    let published = node.published.borrow();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].dataset_root, created.dataset_root);
    assert_eq!(published[0].blockchain, "hardhat1:31337");
    assert_eq!(published[0].minimum_number_of_node_replications, 3);
    assert_eq!(created.dataset_root, dataset_root(&published[0].dataset.public).unwrap());

    let requests = chain.created.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].identity_ids, vec![1]);
    assert_eq!(requests[0].vs, vec!["0xa1".to_string()]);
    assert_eq!(requests[0].publisher_node_identity_id, 9);
    assert_eq!(requests[0].knowledge_assets_amount, 1);
    assert_eq!(requests[0].epochs, 2);
    assert_eq!(requests[0].byte_size % 32, 0);

    assert_eq!(*sleeper.0.borrow(), vec![Duration::from_secs(1)]);
}

#[test]
fn create_waits_for_finality_when_asked() {
    let node = FakeNode {
        finality: 2,
        ..FakeNode::default()
    }
    .script(OperationType::Publish, vec![completed(signed_publish_data())]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let options = PublishOptions {
        finalization_confirmations: Some(2),
        ..PublishOptions::default()
    };
    let outcome = client(&node, &chain, &sleeper).create(&alice(), &options).unwrap();
    match outcome {
        CreateOutcome::Created(created) => assert_eq!(created.finality, Some(2)),
        other => panic!("expected a created collection, got {other:?}"),
    }
}

#[test]
fn create_stops_before_chain_when_publish_incomplete() {
    let node = FakeNode::default().script(OperationType::Publish, vec![OperationResult::new(
        OperationStatus::Failed,
        Some(json!({"errorType": "PublishError", "errorMessage": "not enough replicas", "minAcksReached": false})),
    )]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let outcome = client(&node, &chain, &sleeper)
        .create(&alice(), &PublishOptions::default())
        .unwrap();
    match &outcome {
        CreateOutcome::PublishIncomplete { dataset_root, operation } => {
            assert_eq!(dataset_root, &node.published.borrow()[0].dataset_root);
            assert_eq!(operation.operation_id, "op-publish");
            assert_eq!(operation.status, OperationStatus::Failed);
            assert_eq!(operation.error_type.as_deref(), Some("PublishError"));
        }
        other => panic!("expected PublishIncomplete, got {other:?}"),
    }
    assert_eq!(outcome.ual(), None);
    assert!(chain.created.borrow().is_empty());

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["operation"]["status"], "FAILED");
    assert!(value["datasetRoot"].as_str().unwrap().starts_with("0x"));
}

#[test]
fn create_proceeds_when_min_acks_reached() {
    let mut data = signed_publish_data();
    data["minAcksReached"] = json!(true);
    let node = FakeNode::default().script(
        OperationType::Publish,
        vec![OperationResult::new(OperationStatus::Failed, Some(data))],
    );
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let outcome = client(&node, &chain, &sleeper)
        .create(&alice(), &PublishOptions::default())
        .unwrap();
    assert_eq!(outcome.ual(), Some(ALICE_UAL));
    assert_eq!(chain.created.borrow().len(), 1);
}

#[test]
fn create_surfaces_exhausted_polling() {
    let node = FakeNode::default();
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .create(&alice(), &PublishOptions::default())
        .unwrap_err();
    match err {
        DkgError::Node(NodeError::RetriesExhausted {
            attempts,
            last_status,
            operation,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_status, "PENDING");
            assert_eq!(operation, "publish");
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(*node.polls.borrow(), 3);
    assert_eq!(*sleeper.0.borrow(), vec![Duration::from_secs(1); 2]);
    assert!(chain.created.borrow().is_empty());
}

#[test]
fn create_rejects_unknown_network() {
    let node = FakeNode::default();
    let chain = FakeChain {
        blockchain: "base:84532".into(),
        ..FakeChain::new()
    };
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .create(&alice(), &PublishOptions::default())
        .unwrap_err();
    assert!(matches!(err, DkgError::Config(ConfigError::UnknownNetwork { .. })));
    assert!(node.published.borrow().is_empty());
}

#[test]
fn create_rejects_empty_content_before_publishing() {
    let node = FakeNode::default();
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .create(&Content::Text("  \n".into()), &PublishOptions::default())
        .unwrap_err();
    assert!(matches!(err, DkgError::Dataset(DatasetError::Empty)));
    assert!(node.published.borrow().is_empty());
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

fn private_quads() -> Vec<String> {
    vec!["<http://example.org/alice> <http://schema.org/email> \"alice@example.org\" .".to_string()]
}

fn public_quads(committed_root: &str) -> Vec<String> {
    vec![
        "<http://example.org/alice> <http://schema.org/name> \"Alice\" .".to_string(),
        format!("<uuid:1> <{PRIVATE_ASSERTION_PREDICATE}> \"{committed_root}\" ."),
    ]
}

#[test]
fn get_verifies_private_root_and_returns_nquads() {
    let root = dataset_root(&private_quads()).unwrap();
    let node = FakeNode::default().script(OperationType::Get, vec![completed(json!({
        "assertion": {"public": public_quads(&root), "private": private_quads()},
        "metadata": [{"@id": "uuid:meta"}]
    }))]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let options = GetOptions {
        output_format: Some(OutputFormat::NQuads),
        include_metadata: Some(true),
        ..GetOptions::default()
    };
    let result = client(&node, &chain, &sleeper).get(ALICE_UAL, &options).unwrap();

    assert_eq!(result.ual, ALICE_UAL);
    assert_eq!(result.public, Some(Assertion::NQuads(public_quads(&root))));
    assert_eq!(result.private, Some(Assertion::NQuads(private_quads())));
    assert_eq!(result.private_root.as_deref(), Some(root.as_str()));
    assert!(result.metadata.is_some());

    let gets = node.gets.borrow();
    assert_eq!(gets[0].id, ALICE_UAL);
    assert_eq!(gets[0].content_type, ContentType::All);
    assert!(gets[0].include_metadata);
}

#[test]
fn get_detects_tampered_private_assertion() {
    let wrong = "0x0000000000000000000000000000000000000000000000000000000000000001";
    let node = FakeNode::default().script(OperationType::Get, vec![completed(json!({
        "assertion": {"public": public_quads(wrong), "private": private_quads()}
    }))]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .get(ALICE_UAL, &GetOptions::default())
        .unwrap_err();
    match err {
        DkgError::Dataset(DatasetError::RootMismatch { expected, actual }) => {
            assert_eq!(expected, wrong);
            assert_eq!(actual, dataset_root(&private_quads()).unwrap());
        }
        other => panic!("expected RootMismatch, got {other:?}"),
    }

    // The same payload passes when validation is switched off.
    let node = FakeNode::default().script(OperationType::Get, vec![completed(json!({
        "assertion": {"public": public_quads(wrong), "private": private_quads()}
    }))]);
    let options = GetOptions {
        validate: Some(false),
        content_type: Some(ContentType::Private),
        output_format: Some(OutputFormat::NQuads),
        ..GetOptions::default()
    };
    let result = client(&node, &chain, &sleeper).get(ALICE_UAL, &options).unwrap();
    assert_eq!(result.public, None);
    assert_eq!(result.private, Some(Assertion::NQuads(private_quads())));
}

#[test]
fn get_returns_json_ld_by_default() {
    let node = FakeNode::default().script(OperationType::Get, vec![completed(json!({
        "assertion": ["<http://example.org/alice> <http://schema.org/name> \"Alice\" ."]
    }))]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let result = client(&node, &chain, &sleeper)
        .get(ALICE_UAL, &GetOptions::default())
        .unwrap();
    match result.public {
        Some(Assertion::JsonLd(document)) => {
            let text = document.to_string();
            assert!(text.contains("http://example.org/alice"));
            assert!(text.contains("Alice"));
        }
        other => panic!("expected JSON-LD, got {other:?}"),
    }
    assert_eq!(result.private, None);
}

#[test]
fn get_rejects_malformed_ual_without_network_calls() {
    let node = FakeNode::default();
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .get("did:dkg:hardhat1:31337/0x8f88/7", &GetOptions::default())
        .unwrap_err();
    assert!(matches!(err, DkgError::Ual(UalError::Address { .. })));
    assert!(node.gets.borrow().is_empty());
}

#[test]
fn get_failure_is_reported() {
    let node = FakeNode::default().script(OperationType::Get, vec![OperationResult::new(
        OperationStatus::Failed,
        Some(json!({"errorMessage": "asset not found"})),
    )]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .get(ALICE_UAL, &GetOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        DkgError::Node(NodeError::OperationFailed { ref message, .. }) if message == "asset not found"
    ));
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

#[test]
fn query_sends_detected_type_and_configured_repository() {
    let node = FakeNode::default().script(
        OperationType::Query,
        vec![completed(json!([{"name": "\"Alice\""}]))],
    );
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let result = client(&node, &chain, &sleeper)
        .query(
            "PREFIX schema: <http://schema.org/>\nSELECT ?name WHERE { ?s schema:name ?name }",
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(result.data, json!([{"name": "\"Alice\""}]));
    assert_eq!(result.operation.operation_id, "op-query");

    let queries = node.queries.borrow();
    assert_eq!(queries[0].query_type, QueryType::Select);
    assert_eq!(queries[0].repository.as_deref(), Some("dkg"));
}

#[test]
fn query_call_site_repository_wins() {
    let node = FakeNode::default().script(OperationType::Query, vec![completed(json!(true))]);
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let options = QueryOptions {
        repository: Some("privateCurrent".into()),
        ..QueryOptions::default()
    };
    client(&node, &chain, &sleeper)
        .query("ASK { ?s ?p ?o }", &options)
        .unwrap();
    let queries = node.queries.borrow();
    assert_eq!(queries[0].query_type, QueryType::Ask);
    assert_eq!(queries[0].repository.as_deref(), Some("privateCurrent"));
}

#[test]
fn invalid_query_never_reaches_the_node() {
    let node = FakeNode::default();
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();

    let err = client(&node, &chain, &sleeper)
        .query("SELECT ?s WHERE {", &QueryOptions::default())
        .unwrap_err();
    assert!(matches!(err, DkgError::Rdf(RdfError::Query { .. })));
    assert!(node.queries.borrow().is_empty());
}

// ---------------------------------------------------------------------------
// configuration
// ---------------------------------------------------------------------------

#[test]
fn client_uses_config_loaded_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("dkg.toml");
    std::fs::write(
        &path,
        "environment = \"development\"\n\
         [dataset]\ninput_format = \"N-Quads\"\n\
         [polling]\nmax_number_of_retries = 2\nfrequency_secs = 4\n\
         [publish]\nepochs = 6\nfinalization_confirmations = 0\n",
    )
    .unwrap();
    let config = DkgConfig::load(&path).unwrap();

    let node = FakeNode::default();
    let chain = FakeChain::new();
    let sleeper = RecordingSleeper::default();
    let client = DkgClient::new(config, Arc::new(NetworkTable::builtin()), &node, &chain).with_sleeper(&sleeper);

    let kc = client.assemble(&alice(), &PublishOptions::default()).unwrap();
    assert_eq!(kc.epochs, 6);

    let err = client.create(&alice(), &PublishOptions::default()).unwrap_err();
    assert!(matches!(err, DkgError::Node(NodeError::RetriesExhausted { attempts: 2, .. })));
    assert_eq!(*sleeper.0.borrow(), vec![Duration::from_secs(4)]);
}
