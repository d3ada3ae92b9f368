use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub chunking: Chunking,
	pub search: Search,
	#[serde(default)]
	pub access: Access,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	/// Default model; individual ingest/search calls may name another.
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunking {
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_overlap_tokens")]
	pub overlap_tokens: u32,
	pub tokenizer_repo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_search_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Access {
	/// When true, a non-empty allowed-user list on a collection requires
	/// membership before any role/visibility branch is consulted.
	#[serde(default)]
	pub explicit_user_list_wins: bool,
}

fn default_max_tokens() -> u32 {
	512
}

fn default_overlap_tokens() -> u32 {
	64
}

fn default_top_k() -> u32 {
	5
}

fn default_search_timeout_ms() -> u64 {
	30_000
}
