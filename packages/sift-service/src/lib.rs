pub mod access;
pub mod collections;
pub mod ingest;
pub mod search;

use std::{collections::HashMap, future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;

pub use collections::{
	ConfigureRequest, ConfigureResponse, CreateCollectionRequest, CreateCollectionResponse,
	ProvisionTenantRequest, ProvisionTenantResponse, TenantEntry,
};
pub use ingest::{IngestRequest, IngestResponse, IngestStatus};
pub use search::{Hit, SearchRequest, SearchResponse};

use sift_chunking::Tokenizer;
use sift_config::Config;
use sift_domain::access::AccessPolicy;
use sift_providers::{EmbeddingLoader, cache::ModelCache, registry};
use sift_storage::{
	catalog::{CollectionCatalog, PgCatalog},
	db::Db,
	index::VectorIndex,
	qdrant::QdrantIndex,
};

/// Tokenizer vocabulary compatible with the default embedding model.
pub const DEFAULT_TOKENIZER_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	AccessDenied { message: String },
	Provider { message: String },
	Backend { message: String },
	Cancelled,
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::AccessDenied { message } => write!(f, "Access denied: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Backend { message } => write!(f, "Backend error: {message}"),
			Self::Cancelled => write!(f, "Operation was cancelled before it completed."),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sift_storage::Error> for ServiceError {
	fn from(err: sift_storage::Error) -> Self {
		Self::Backend { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<sift_domain::ident::InvalidIdent> for ServiceError {
	fn from(err: sift_domain::ident::InvalidIdent) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<sift_chunking::Error> for ServiceError {
	fn from(err: sift_chunking::Error) -> Self {
		match err {
			sift_chunking::Error::Tokenizer { message } => Self::Provider { message },
			other => Self::InvalidRequest { message: other.to_string() },
		}
	}
}

/// The retrieval engine. Every collaborator is an explicit, owned
/// dependency handed over at construction; the only mutable state shared
/// across calls is the embedding-model cache slot and the per-namespace
/// ingest locks, both behind their own synchronization.
pub struct SiftService {
	pub cfg: Config,
	pub catalog: Arc<dyn CollectionCatalog>,
	pub index: Arc<dyn VectorIndex>,
	pub embeddings: ModelCache,
	pub tokenizer: Arc<Tokenizer>,
	ingest_locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}
impl SiftService {
	/// Production wiring: Postgres catalog, Qdrant index, hub tokenizer.
	/// Tests inject fakes through [`SiftService::with_embedding_loader`]
	/// instead.
	pub async fn connect(cfg: Config) -> ServiceResult<Self> {
		let db = Db::connect(&cfg.storage.postgres).await?;

		db.ensure_schema().await?;

		let catalog = Arc::new(PgCatalog::new(db.pool.clone()));
		let index = Arc::new(QdrantIndex::new(&cfg.storage.qdrant)?);
		let repo =
			cfg.chunking.tokenizer_repo.clone().unwrap_or(DEFAULT_TOKENIZER_REPO.to_string());
		let tokenizer = sift_chunking::load_tokenizer(&repo)?;

		Self::new(cfg, catalog, index, Arc::new(tokenizer))
	}

	/// Resolves the embedding provider from the registry once, here, and
	/// never by string again.
	pub fn new(
		cfg: Config,
		catalog: Arc<dyn CollectionCatalog>,
		index: Arc<dyn VectorIndex>,
		tokenizer: Arc<Tokenizer>,
	) -> ServiceResult<Self> {
		let loader = registry::embedding_loader(&cfg.providers.embedding)
			.map_err(|err| ServiceError::Provider { message: err.to_string() })?;

		Ok(Self::with_embedding_loader(cfg, catalog, index, tokenizer, loader))
	}

	pub fn with_embedding_loader(
		cfg: Config,
		catalog: Arc<dyn CollectionCatalog>,
		index: Arc<dyn VectorIndex>,
		tokenizer: Arc<Tokenizer>,
		loader: Arc<dyn EmbeddingLoader>,
	) -> Self {
		Self {
			cfg,
			catalog,
			index,
			embeddings: ModelCache::new(loader),
			tokenizer,
			ingest_locks: std::sync::Mutex::new(HashMap::new()),
		}
	}

	pub(crate) fn access_policy(&self) -> AccessPolicy {
		AccessPolicy { explicit_user_list_wins: self.cfg.access.explicit_user_list_wins }
	}

	pub(crate) fn embedding_model_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
		requested
			.filter(|name| !name.trim().is_empty())
			.unwrap_or(&self.cfg.providers.embedding.model)
	}

	/// Two ingests into the same namespace serialize here so a chunk batch
	/// is an atomic append; distinct namespaces proceed concurrently.
	pub(crate) fn ingest_lock(&self, namespace_key: &str) -> Arc<tokio::sync::Mutex<()>> {
		let mut locks = self.ingest_locks.lock().unwrap_or_else(|err| err.into_inner());

		locks
			.entry(namespace_key.to_string())
			.or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
			.clone()
	}
}

/// Races a future against the caller's cancellation signal. A cancelled
/// call surfaces [`ServiceError::Cancelled`]; it never passes off partial
/// work as a complete answer.
pub(crate) async fn with_cancel<T>(
	cancel: &CancellationToken,
	fut: impl Future<Output = T>,
) -> ServiceResult<T> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(ServiceError::Cancelled),
		value = fut => Ok(value),
	}
}
