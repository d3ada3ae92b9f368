//! The vector-search capability consumed by the retrieval engine. The
//! backend owns index structure, persistence, and distance math; this
//! contract only fixes the shape and the ordering semantics.

use serde_json::{Map, Value};

use crate::{BoxFuture, Result};

/// One embedded chunk as handed to the backend. `id` is opaque to the
/// backend and comes back verbatim on query hits.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
	pub id: String,
	pub vector: Vec<f32>,
	pub text: String,
	pub metadata: Map<String, Value>,
}

/// One nearest-neighbor answer. `distance` ascends with irrelevance: lower
/// is a better match, whatever metric the backend runs internally.
#[derive(Debug, Clone)]
pub struct ScoredHit {
	pub id: String,
	pub text: String,
	pub metadata: Map<String, Value>,
	pub distance: f32,
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Idempotent get-or-create of a storage partition.
	fn ensure_namespace<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Appends a chunk batch. The batch is atomic from the caller's point
	/// of view; callers serialize writes per namespace above this.
	fn upsert<'a>(&'a self, key: &'a str, records: Vec<ChunkRecord>) -> BoxFuture<'a, Result<()>>;

	/// Up to `k` nearest neighbors, ascending by distance. An empty
	/// namespace answers with an empty list, not an error.
	fn query<'a>(
		&'a self,
		key: &'a str,
		vector: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredHit>>>;

	fn count<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64>>;

	fn list_namespaces<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>>>;
}
