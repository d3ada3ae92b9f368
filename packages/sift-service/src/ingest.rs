use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use sift_chunking::ChunkingConfig;
use sift_domain::{ident, namespace};
use sift_storage::index::ChunkRecord;

use crate::{ServiceError, ServiceResult, SiftService, with_cancel};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestRequest {
	pub tenant_id: String,
	pub collection_name: String,
	pub doc_id: String,
	pub text: String,
	/// Free-form document metadata; expected to carry "title" or
	/// "filename" for display, copied onto every chunk.
	#[serde(default)]
	pub metadata: Map<String, Value>,
	pub embedding_model: Option<String>,
	pub max_tokens: Option<u32>,
	pub overlap_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
	Indexed,
	/// The document had no text content after trimming; nothing was
	/// stored. Not a failure.
	EmptyContent,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestResponse {
	pub status: IngestStatus,
	pub tenant_id: String,
	pub collection_name: String,
	pub doc_id: String,
	pub chunks_indexed: u32,
	pub namespace_document_count: u64,
}

impl SiftService {
	/// Chunk, embed, and append one logical document. Re-ingesting a
	/// `doc_id` appends a fresh chunk set; nothing is updated in place.
	pub async fn ingest(
		&self,
		req: IngestRequest,
		cancel: &CancellationToken,
	) -> ServiceResult<IngestResponse> {
		ident::validate("tenant_id", &req.tenant_id)?;
		ident::validate("collection_name", &req.collection_name)?;

		if req.doc_id.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "doc_id must be non-empty.".to_string(),
			});
		}

		let chunking = ChunkingConfig {
			max_tokens: req.max_tokens.unwrap_or(self.cfg.chunking.max_tokens),
			overlap_tokens: req.overlap_tokens.unwrap_or(self.cfg.chunking.overlap_tokens),
		};
		let chunks = sift_chunking::split_text(&req.text, &chunking, &self.tokenizer)?;

		if chunks.is_empty() {
			return Ok(IngestResponse {
				status: IngestStatus::EmptyContent,
				tenant_id: req.tenant_id,
				collection_name: req.collection_name,
				doc_id: req.doc_id,
				chunks_indexed: 0,
				namespace_document_count: 0,
			});
		}

		let model_name = self.embedding_model_name(req.embedding_model.as_deref()).to_string();
		let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
		let embeddings = with_cancel(cancel, self.embeddings.embed(&model_name, &texts)).await??;

		if embeddings.len() != chunks.len() {
			return Err(ServiceError::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} chunks.",
					embeddings.len(),
					chunks.len(),
				),
			});
		}

		let expected_dim = self.cfg.providers.embedding.dimensions as usize;
		let chunk_count = chunks.len();
		let mut records = Vec::with_capacity(chunk_count);

		for (chunk, vector) in chunks.into_iter().zip(embeddings) {
			if vector.len() != expected_dim {
				return Err(ServiceError::Provider {
					message: "Embedding vector dimension mismatch.".to_string(),
				});
			}

			let mut metadata = req.metadata.clone();

			metadata.insert("tenant_id".to_string(), Value::from(req.tenant_id.clone()));
			metadata.insert("collection".to_string(), Value::from(req.collection_name.clone()));
			metadata.insert("doc_id".to_string(), Value::from(req.doc_id.clone()));
			metadata.insert("chunk_index".to_string(), Value::from(chunk.chunk_index));
			metadata.insert("chunk_count".to_string(), Value::from(chunk_count as u64));

			records.push(ChunkRecord {
				id: format!("{}__chunk_{}", req.doc_id, chunk.chunk_index),
				vector,
				text: chunk.text,
				metadata,
			});
		}

		let key = namespace::key(&req.tenant_id, &req.collection_name);
		let lock = self.ingest_lock(&key);
		let _guard = lock.lock().await;

		with_cancel(cancel, self.index.ensure_namespace(&key)).await??;
		with_cancel(cancel, self.index.upsert(&key, records)).await??;

		let namespace_document_count = with_cancel(cancel, self.index.count(&key)).await??;

		tracing::info!(
			tenant_id = req.tenant_id.as_str(),
			collection_name = req.collection_name.as_str(),
			doc_id = req.doc_id.as_str(),
			chunks_indexed = chunk_count,
			"Indexed document."
		);

		Ok(IngestResponse {
			status: IngestStatus::Indexed,
			tenant_id: req.tenant_id,
			collection_name: req.collection_name,
			doc_id: req.doc_id,
			chunks_indexed: chunk_count as u32,
			namespace_document_count,
		})
	}
}
