use std::sync::Arc;

use serde_json::Map;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use sift_domain::access::User;
use sift_service::{
	IngestRequest, IngestStatus, SearchRequest, ServiceError, SiftService,
};
use sift_storage::{catalog::CollectionCatalog, index::VectorIndex, models::CollectionRecord};
use sift_testkit::{
	FlakyIndex, MemoryCatalog, MemoryIndex, TestEmbedder, TestEmbedderLoader, word_tokenizer,
};

const VOCAB: &[&str] = &[
	"alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
	"handbook", "policy", "leave", "remote", "office",
];

struct Harness {
	service: SiftService,
	embedder: Arc<TestEmbedder>,
	index: Arc<MemoryIndex>,
	catalog: Arc<MemoryCatalog>,
}

fn harness() -> Harness {
	sift_testkit::init_tracing();

	let embedder = TestEmbedder::new(1);
	let index = MemoryIndex::new();
	let catalog = MemoryCatalog::new();
	let service = SiftService::with_embedding_loader(
		sift_testkit::test_config(1),
		catalog.clone(),
		index.clone(),
		Arc::new(word_tokenizer(VOCAB)),
		Arc::new(TestEmbedderLoader { embedder: embedder.clone() }),
	);

	Harness { service, embedder, index, catalog }
}

fn flaky_harness() -> (Harness, Arc<FlakyIndex>) {
	sift_testkit::init_tracing();

	let embedder = TestEmbedder::new(1);
	let inner = MemoryIndex::new();
	let flaky = FlakyIndex::new(inner.clone());
	let catalog = MemoryCatalog::new();
	let service = SiftService::with_embedding_loader(
		sift_testkit::test_config(1),
		catalog.clone(),
		flaky.clone(),
		Arc::new(word_tokenizer(VOCAB)),
		Arc::new(TestEmbedderLoader { embedder: embedder.clone() }),
	);

	(Harness { service, embedder, index: inner, catalog }, flaky)
}

fn ingest_req(tenant_id: &str, collection_name: &str, doc_id: &str, text: &str) -> IngestRequest {
	IngestRequest {
		tenant_id: tenant_id.to_string(),
		collection_name: collection_name.to_string(),
		doc_id: doc_id.to_string(),
		text: text.to_string(),
		metadata: Map::new(),
		embedding_model: None,
		max_tokens: None,
		overlap_tokens: None,
	}
}

fn search_req(tenant_id: &str, collection_name: Option<&str>, query: &str) -> SearchRequest {
	SearchRequest {
		tenant_id: tenant_id.to_string(),
		collection_name: collection_name.map(str::to_string),
		query: query.to_string(),
		top_k: None,
		embedding_model: None,
	}
}

fn record(
	tenant_id: &str,
	name: &str,
	visibility: &str,
	organization_id: Option<&str>,
	allowed_roles: Option<&str>,
	allowed_user_ids: Option<&str>,
) -> CollectionRecord {
	CollectionRecord {
		tenant_id: tenant_id.to_string(),
		name: name.to_string(),
		visibility: visibility.to_string(),
		organization_id: organization_id.map(str::to_string),
		allowed_roles: allowed_roles.map(str::to_string),
		allowed_user_ids: allowed_user_ids.map(str::to_string),
		created_at: OffsetDateTime::now_utc(),
	}
}

fn user(tenant_id: &str, id: &str, role: &str) -> User {
	User {
		id: id.to_string(),
		tenant_id: tenant_id.to_string(),
		role: role.to_string(),
		organization_id: None,
	}
}

#[tokio::test]
async fn ingest_then_search_one_collection() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha beta", vec![0.3]);
	h.embedder.set("handbook", vec![0.0]);

	let response = h
		.service
		.ingest(ingest_req("acme", "policies", "doc-1", "alpha beta"), &cancel)
		.await
		.unwrap();

	assert_eq!(response.status, IngestStatus::Indexed);
	assert_eq!(response.chunks_indexed, 1);
	assert_eq!(response.namespace_document_count, 1);

	let found =
		h.service.search(search_req("acme", Some("policies"), "handbook"), &cancel).await.unwrap();

	assert_eq!(found.results.len(), 1);

	let hit = &found.results[0];

	assert_eq!(hit.id, "doc-1__chunk_0");
	assert_eq!(hit.document, "alpha beta");
	assert_eq!(hit.collection, "policies");
	assert!((hit.distance - 0.3).abs() < 1e-6);
	assert_eq!(hit.metadata.get("doc_id"), Some(&serde_json::json!("doc-1")));
	assert_eq!(hit.metadata.get("chunk_index"), Some(&serde_json::json!(0)));
	assert_eq!(hit.metadata.get("chunk_count"), Some(&serde_json::json!(1)));
	assert_eq!(hit.metadata.get("tenant_id"), Some(&serde_json::json!("acme")));
	assert!(!found.partial);
}

#[tokio::test]
async fn empty_document_is_a_non_fatal_outcome() {
	let h = harness();
	let cancel = CancellationToken::new();
	let response =
		h.service.ingest(ingest_req("acme", "policies", "doc-1", "   \n\t "), &cancel).await.unwrap();

	assert_eq!(response.status, IngestStatus::EmptyContent);
	assert_eq!(response.chunks_indexed, 0);
	assert_eq!(h.index.record_count("acme__policies"), 0);
}

#[tokio::test]
async fn global_top_k_merges_across_namespaces() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("gamma", vec![0.9]);
	h.embedder.set("beta", vec![0.2]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "a", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "a", "doc-2", "gamma"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "b", "doc-3", "beta"), &cancel).await.unwrap();

	let mut req = search_req("acme", None, "handbook");

	req.top_k = Some(2);

	let found = h.service.search(req, &cancel).await.unwrap();
	let distances = found.results.iter().map(|hit| hit.distance).collect::<Vec<_>>();

	// Not [0.1, 0.9] from namespace a alone: the runner-up comes from b.
	assert_eq!(found.results.len(), 2);
	assert!((distances[0] - 0.1).abs() < 1e-6);
	assert!((distances[1] - 0.2).abs() < 1e-6);
	assert_eq!(found.results[0].collection, "a");
	assert_eq!(found.results[1].collection, "b");
}

#[tokio::test]
async fn search_never_crosses_tenant_namespaces() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "docs", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("globex", "docs", "doc-1", "alpha"), &cancel).await.unwrap();

	let found = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert_eq!(found.results.len(), 1);
	assert_eq!(found.results[0].metadata.get("tenant_id"), Some(&serde_json::json!("acme")));
}

#[tokio::test]
async fn absent_collection_answers_empty_not_error() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("handbook", vec![0.0]);

	let found =
		h.service.search(search_req("acme", Some("ghost"), "handbook"), &cancel).await.unwrap();

	assert_eq!(found.query, "handbook");
	assert!(found.results.is_empty());
	assert!(!found.partial);

	// Get-or-create on read left the namespace behind.
	assert_eq!(h.service.list_collections("acme").await.unwrap(), vec!["ghost".to_string()]);
}

#[tokio::test]
async fn empty_tenant_answers_empty_not_error() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("handbook", vec![0.0]);

	let found = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert!(found.results.is_empty());
	assert!(!found.partial);
}

#[tokio::test]
async fn duplicate_ids_across_namespaces_are_both_returned() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "a", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "b", "doc-1", "alpha"), &cancel).await.unwrap();

	let found = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert_eq!(found.results.len(), 2);
	assert_eq!(found.results[0].id, found.results[1].id);
	assert_ne!(found.results[0].collection, found.results[1].collection);
}

#[tokio::test]
async fn search_is_idempotent_over_static_data() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.4]);
	h.embedder.set("beta", vec![0.7]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "a", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "b", "doc-2", "beta"), &cancel).await.unwrap();

	let first = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();
	let second = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();
	let shape = |response: &sift_service::SearchResponse| {
		response
			.results
			.iter()
			.map(|hit| (hit.collection.clone(), hit.id.clone(), hit.distance))
			.collect::<Vec<_>>()
	};

	assert_eq!(shape(&first), shape(&second));
}

#[tokio::test]
async fn reingesting_a_doc_id_appends_a_new_chunk_set() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha beta", vec![0.3]);

	h.service.ingest(ingest_req("acme", "docs", "doc-1", "alpha beta"), &cancel).await.unwrap();

	let second =
		h.service.ingest(ingest_req("acme", "docs", "doc-1", "alpha beta"), &cancel).await.unwrap();

	assert_eq!(second.namespace_document_count, 2);
	assert_eq!(h.index.record_count("acme__docs"), 2);
}

#[tokio::test]
async fn one_failing_namespace_degrades_to_a_partial_answer() {
	let (h, flaky) = flaky_harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("beta", vec![0.2]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "a", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "b", "doc-2", "beta"), &cancel).await.unwrap();
	flaky.fail_namespace("acme__a");

	let found = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert!(found.partial);
	assert_eq!(found.results.len(), 1);
	assert_eq!(found.results[0].collection, "b");
}

#[tokio::test]
async fn all_namespaces_failing_surfaces_a_backend_error() {
	let (h, flaky) = flaky_harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("handbook", vec![0.0]);

	h.service.ingest(ingest_req("acme", "a", "doc-1", "alpha"), &cancel).await.unwrap();
	flaky.fail_namespace("acme__a");

	let err = h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap_err();

	assert!(matches!(err, ServiceError::Backend { .. }));
}

#[tokio::test]
async fn cancellation_is_distinct_from_zero_hits() {
	let h = harness();
	let cancel = CancellationToken::new();

	cancel.cancel();

	let search_err =
		h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap_err();
	let ingest_err = h
		.service
		.ingest(ingest_req("acme", "docs", "doc-1", "alpha beta"), &cancel)
		.await
		.unwrap_err();

	assert!(matches!(search_err, ServiceError::Cancelled));
	assert!(matches!(ingest_err, ServiceError::Cancelled));
}

#[tokio::test]
async fn concurrent_ingests_into_one_namespace_lose_nothing() {
	let h = harness();
	let service = Arc::new(h.service);
	let mut handles = Vec::new();

	for i in 0..8 {
		let service = service.clone();

		handles.push(tokio::spawn(async move {
			let cancel = CancellationToken::new();

			service
				.ingest(ingest_req("acme", "docs", &format!("doc-{i}"), "alpha beta"), &cancel)
				.await
				.unwrap();
		}));
	}

	for handle in handles {
		handle.await.unwrap();
	}

	assert_eq!(h.index.record_count("acme__docs"), 8);
}

#[tokio::test]
async fn chunking_is_tunable_per_ingest_call() {
	let h = harness();
	let cancel = CancellationToken::new();
	let mut req = ingest_req(
		"acme",
		"docs",
		"doc-1",
		"alpha beta gamma delta epsilon zeta eta theta iota kappa",
	);

	req.max_tokens = Some(5);
	req.overlap_tokens = Some(2);

	let response = h.service.ingest(req, &cancel).await.unwrap();

	assert_eq!(response.chunks_indexed, 3);
	assert_eq!(h.index.record_count("acme__docs"), 3);
}

#[tokio::test]
async fn misconfigured_overlap_is_a_validation_error() {
	let h = harness();
	let cancel = CancellationToken::new();
	let mut req = ingest_req("acme", "docs", "doc-1", "alpha beta");

	req.max_tokens = Some(5);
	req.overlap_tokens = Some(5);

	let err = h.service.ingest(req, &cancel).await.unwrap_err();

	assert!(matches!(err, ServiceError::InvalidRequest { .. }));
}

#[tokio::test]
async fn malformed_identifiers_are_rejected_before_any_side_effect() {
	let h = harness();
	let cancel = CancellationToken::new();
	let err = h
		.service
		.ingest(ingest_req("bad tenant", "docs", "doc-1", "alpha"), &cancel)
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::InvalidRequest { .. }));

	let err = h
		.service
		.search(search_req("acme", Some("bad name"), "handbook"), &cancel)
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::InvalidRequest { .. }));
	assert!(h.service.list_collections("acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn embedding_model_loads_once_and_single_slot_evicts() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("handbook", vec![0.0]);

	for _ in 0..3 {
		h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();
	}

	// No namespaces exist yet, so no backend work happened, but the query
	// embedding always runs: the default model loaded exactly once.
	assert_eq!(h.embedder.loads(), 1);

	let mut req = search_req("acme", None, "handbook");

	req.embedding_model = Some("other-model".to_string());
	h.service.search(req, &cancel).await.unwrap();

	assert_eq!(h.embedder.loads(), 2);

	// The default model was evicted by the single slot and loads again.
	h.service.search(search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert_eq!(h.embedder.loads(), 3);
}

#[tokio::test]
async fn list_collections_and_tenants_derive_from_namespaces() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.service.ingest(ingest_req("acme", "beta", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "alpha", "doc-2", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("globex", "gamma", "doc-3", "alpha"), &cancel).await.unwrap();

	// A key foreign to the namespacing scheme is skipped, never an error.
	h.index.ensure_namespace("no-separator").await.unwrap();

	assert_eq!(
		h.service.list_collections("acme").await.unwrap(),
		vec!["alpha".to_string(), "beta".to_string()],
	);

	let tenants = h
		.service
		.list_tenants()
		.await
		.unwrap()
		.into_iter()
		.map(|entry| entry.tenant_id)
		.collect::<Vec<_>>();

	assert_eq!(tenants, vec!["acme".to_string(), "globex".to_string()]);
}

#[tokio::test]
async fn create_collection_registers_catalog_and_namespace() {
	let h = harness();
	let cancel = CancellationToken::new();
	let response = h
		.service
		.create_collection(
			sift_service::CreateCollectionRequest {
				tenant_id: "acme".to_string(),
				collection_name: "policies".to_string(),
				visibility: Some(sift_domain::access::Visibility::Role),
				organization_id: None,
				allowed_roles: vec!["group_hr".to_string()],
				allowed_user_ids: Vec::new(),
			},
			&cancel,
		)
		.await
		.unwrap();

	assert_eq!(response.internal_name, "acme__policies");
	assert_eq!(response.document_count, 0);

	let records = h.catalog.fetch("acme", None).await.unwrap();

	assert_eq!(records.len(), 1);
	assert_eq!(records[0].visibility, "role");
	assert_eq!(records[0].allowed_roles.as_deref(), Some("[\"group_hr\"]"));

	// Collection names may repeat across tenants; namespaces never collide.
	let other = h
		.service
		.configure(
			sift_service::ConfigureRequest {
				tenant_id: "globex".to_string(),
				collection_name: "policies".to_string(),
			},
			&cancel,
		)
		.await
		.unwrap();

	assert_eq!(other.collection.internal_name, "globex__policies");
}

#[tokio::test]
async fn allowed_collections_applies_the_acl_per_candidate() {
	let h = harness();

	h.catalog.upsert(record("acme", "open", "tenant", None, None, None)).await.unwrap();
	h.catalog
		.upsert(record("acme", "hr", "role", None, Some("[\"group_hr\"]"), None))
		.await
		.unwrap();
	h.catalog.upsert(record("acme", "broken", "everyone", None, None, None)).await.unwrap();
	h.catalog
		.upsert(record("acme", "mine", "user", None, None, Some("[\"u-9\"]")))
		.await
		.unwrap();
	h.catalog.upsert(record("globex", "open", "tenant", None, None, None)).await.unwrap();

	let names = |collections: Vec<sift_domain::access::Collection>| {
		collections.into_iter().map(|collection| collection.name).collect::<Vec<_>>()
	};
	let hr = user("acme", "u-1", "group_hr");

	assert_eq!(
		names(h.service.allowed_collections(&hr, None).await.unwrap()),
		vec!["open".to_string(), "hr".to_string()],
	);

	let employee = user("acme", "u-2", "employee");

	assert_eq!(
		names(h.service.allowed_collections(&employee, None).await.unwrap()),
		vec!["open".to_string()],
	);

	let unknown = user("acme", "u-3", "superuser");

	assert!(h.service.allowed_collections(&unknown, None).await.unwrap().is_empty());

	// The optional name filter narrows at the catalog, not in memory.
	let filter = vec!["hr".to_string()];

	assert_eq!(
		names(h.service.allowed_collections(&hr, Some(&filter)).await.unwrap()),
		vec!["hr".to_string()],
	);
	assert!(h.service.allowed_collections(&employee, Some(&filter)).await.unwrap().is_empty());
}

#[tokio::test]
async fn acl_gated_search_denies_without_disclosing_existence() {
	let h = harness();
	let cancel = CancellationToken::new();

	h.embedder.set("alpha", vec![0.1]);
	h.embedder.set("beta", vec![0.2]);
	h.embedder.set("handbook", vec![0.0]);

	h.catalog.upsert(record("acme", "open", "tenant", None, None, None)).await.unwrap();
	h.catalog
		.upsert(record("acme", "hr", "role", None, Some("[\"group_hr\"]"), None))
		.await
		.unwrap();
	h.service.ingest(ingest_req("acme", "open", "doc-1", "alpha"), &cancel).await.unwrap();
	h.service.ingest(ingest_req("acme", "hr", "doc-2", "beta"), &cancel).await.unwrap();

	let employee = user("acme", "u-2", "employee");

	// Named collection the user may not read: denied, with the same
	// answer an absent collection would get.
	for name in ["hr", "ghost"] {
		let err = h
			.service
			.search_as(&employee, search_req("acme", Some(name), "handbook"), &cancel)
			.await
			.unwrap_err();

		assert!(matches!(err, ServiceError::AccessDenied { .. }));
	}

	// Unscoped search fans out over the allowed set only.
	let found =
		h.service.search_as(&employee, search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert_eq!(found.results.len(), 1);
	assert_eq!(found.results[0].collection, "open");

	let hr = user("acme", "u-1", "group_hr");
	let found =
		h.service.search_as(&hr, search_req("acme", None, "handbook"), &cancel).await.unwrap();

	assert_eq!(found.results.len(), 2);

	// Tenant mismatch is refused outright.
	let outsider = user("globex", "u-9", "group_hr");
	let err = h
		.service
		.search_as(&outsider, search_req("acme", None, "handbook"), &cancel)
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::AccessDenied { .. }));
}
