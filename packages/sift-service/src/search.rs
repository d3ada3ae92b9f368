use std::{cmp::Ordering, time::Duration};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use sift_domain::{access::User, ident, namespace};

use crate::{ServiceError, ServiceResult, SiftService, with_cancel};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub tenant_id: String,
	/// Search one collection, or every collection of the tenant when
	/// absent.
	pub collection_name: Option<String>,
	pub query: String,
	pub top_k: Option<u32>,
	pub embedding_model: Option<String>,
}

/// One ranked retrieval result. Ephemeral; `collection` plus `id` is the
/// true key, since ids may repeat across collections.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Hit {
	pub id: String,
	pub document: String,
	pub metadata: Map<String, Value>,
	pub distance: f32,
	pub collection: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub query: String,
	pub results: Vec<Hit>,
	/// Set when at least one namespace failed and its hits are missing
	/// from the answer.
	pub partial: bool,
}

impl SiftService {
	/// Vector search within a tenant: embed once, query every candidate
	/// namespace, then merge into a single global top-k ordered by
	/// ascending distance.
	pub async fn search(
		&self,
		req: SearchRequest,
		cancel: &CancellationToken,
	) -> ServiceResult<SearchResponse> {
		let top_k = self.validate_search(&req)?;
		let deadline = Duration::from_millis(self.cfg.search.timeout_ms);

		match tokio::time::timeout(deadline, self.search_inner(req, top_k, cancel)).await {
			Ok(result) => result,
			Err(_) => Err(ServiceError::Cancelled),
		}
	}

	/// ACL-gated search: the allowed-collection set is computed first and
	/// the fan-out covers that set only. Denial is reported without
	/// disclosing whether the collection exists at all.
	pub async fn search_as(
		&self,
		user: &User,
		req: SearchRequest,
		cancel: &CancellationToken,
	) -> ServiceResult<SearchResponse> {
		if user.tenant_id != req.tenant_id {
			return Err(ServiceError::AccessDenied { message: "Tenant mismatch.".to_string() });
		}

		let top_k = self.validate_search(&req)?;
		let name_filter = req.collection_name.clone().map(|name| vec![name]);
		let allowed = self.allowed_collections(user, name_filter.as_deref()).await?;

		if req.collection_name.is_some() && allowed.is_empty() {
			return Err(ServiceError::AccessDenied {
				message: "Collection is not accessible.".to_string(),
			});
		}

		let keys = allowed
			.iter()
			.map(|collection| namespace::key(&req.tenant_id, &collection.name))
			.collect::<Vec<_>>();

		for key in &keys {
			with_cancel(cancel, self.index.ensure_namespace(key)).await??;
		}

		let deadline = Duration::from_millis(self.cfg.search.timeout_ms);

		match tokio::time::timeout(deadline, self.query_namespaces(req, keys, top_k, cancel)).await
		{
			Ok(result) => result,
			Err(_) => Err(ServiceError::Cancelled),
		}
	}

	fn validate_search(&self, req: &SearchRequest) -> ServiceResult<u32> {
		ident::validate("tenant_id", &req.tenant_id)?;

		if let Some(collection_name) = req.collection_name.as_deref() {
			ident::validate("collection_name", collection_name)?;
		}
		if req.query.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must be non-empty.".to_string(),
			});
		}

		let top_k = req.top_k.unwrap_or(self.cfg.search.top_k);

		if top_k == 0 {
			return Err(ServiceError::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		Ok(top_k)
	}

	async fn search_inner(
		&self,
		req: SearchRequest,
		top_k: u32,
		cancel: &CancellationToken,
	) -> ServiceResult<SearchResponse> {
		let keys = match req.collection_name.as_deref() {
			Some(collection_name) => {
				let key = namespace::key(&req.tenant_id, collection_name);

				// Get-or-create on read: an absent collection becomes an
				// empty namespace and answers with zero hits.
				with_cancel(cancel, self.index.ensure_namespace(&key)).await??;

				vec![key]
			},
			None => {
				let all = with_cancel(cancel, self.index.list_namespaces()).await??;

				all.into_iter()
					.filter(|key| {
						namespace::collection_for_tenant(key, &req.tenant_id).is_some()
					})
					.collect()
			},
		};

		self.query_namespaces(req, keys, top_k, cancel).await
	}

	async fn query_namespaces(
		&self,
		req: SearchRequest,
		keys: Vec<String>,
		top_k: u32,
		cancel: &CancellationToken,
	) -> ServiceResult<SearchResponse> {
		// The query embeds exactly once, namespaces or not, so provider
		// failures surface instead of hiding behind an empty corpus.
		let model_name = self.embedding_model_name(req.embedding_model.as_deref()).to_string();
		let query_texts = vec![req.query.clone()];
		let mut embeddings =
			with_cancel(cancel, self.embeddings.embed(&model_name, &query_texts)).await??;
		let Some(query_vector) = embeddings.pop() else {
			return Err(ServiceError::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if query_vector.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(ServiceError::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}
		if keys.is_empty() {
			return Ok(SearchResponse { query: req.query, results: Vec::new(), partial: false });
		}

		// Per-namespace queries are independent; one failing namespace
		// costs its hits and flags the response partial instead of
		// aborting the whole query.
		let queries = keys.iter().map(|key| {
			let vector = &query_vector;

			async move { (key.as_str(), self.index.query(key, vector, top_k).await) }
		});
		let outcomes = with_cancel(cancel, futures::future::join_all(queries)).await?;
		let mut hits = Vec::new();
		let mut failed = 0_usize;

		for (key, outcome) in outcomes {
			let collection = namespace::collection_for_tenant(key, &req.tenant_id)
				.unwrap_or(key)
				.to_string();

			match outcome {
				Ok(scored) =>
					for hit in scored {
						hits.push(Hit {
							id: hit.id,
							document: hit.text,
							metadata: hit.metadata,
							distance: hit.distance,
							collection: collection.clone(),
						});
					},
				Err(err) => {
					failed += 1;

					tracing::warn!(
						namespace = key,
						error = %err,
						"Namespace query failed; continuing without it."
					);
				},
			}
		}

		if failed == keys.len() {
			return Err(ServiceError::Backend {
				message: "Every candidate namespace failed to answer.".to_string(),
			});
		}

		// Global top-k across namespaces: stable ascending sort keeps
		// backend-reported order on ties, then truncate.
		hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
		hits.truncate(top_k as usize);

		Ok(SearchResponse { query: req.query, results: hits, partial: failed > 0 })
	}
}
