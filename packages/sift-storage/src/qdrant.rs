use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		CountPointsBuilder, CreateCollectionBuilder, Distance, ListValue, PointStruct, Query,
		QueryPointsBuilder, ScoredPoint, Struct, UpsertPointsBuilder, Value,
		VectorParamsBuilder, value::Kind,
	},
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{
	BoxFuture, Result,
	index::{ChunkRecord, ScoredHit, VectorIndex},
};

/// Payload keys owned by the adapter. Qdrant point ids must be uuid/u64, so
/// the caller's opaque chunk id is hashed to a v5 uuid for the point id and
/// kept verbatim under `RECORD_ID_KEY`.
pub const RECORD_ID_KEY: &str = "record_id";
pub const TEXT_KEY: &str = "text";

pub struct QdrantIndex {
	pub client: Qdrant,
	pub vector_dim: u32,
}
impl QdrantIndex {
	pub fn new(cfg: &sift_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, vector_dim: cfg.vector_dim })
	}
}
impl VectorIndex for QdrantIndex {
	fn ensure_namespace<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.client.collection_exists(key).await? {
				return Ok(());
			}

			let create = CreateCollectionBuilder::new(key).vectors_config(
				VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
			);

			if let Err(err) = self.client.create_collection(create).await {
				// Lost a create race; the namespace existing is all that
				// was asked for.
				if self.client.collection_exists(key).await? {
					return Ok(());
				}

				return Err(err.into());
			}

			Ok(())
		})
	}

	fn upsert<'a>(&'a self, key: &'a str, records: Vec<ChunkRecord>) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let points = records.into_iter().map(point_from_record).collect::<Vec<_>>();

			self.client
				.upsert_points(UpsertPointsBuilder::new(key, points).wait(true))
				.await?;

			Ok(())
		})
	}

	fn query<'a>(
		&'a self,
		key: &'a str,
		vector: &'a [f32],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredHit>>> {
		Box::pin(async move {
			let search = QueryPointsBuilder::new(key)
				.query(Query::new_nearest(vector.to_vec()))
				.limit(k as u64)
				.with_payload(true);
			let response = self.client.query(search).await?;

			Ok(response.result.into_iter().map(hit_from_point).collect())
		})
	}

	fn count<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let response = self.client.count(CountPointsBuilder::new(key).exact(true)).await?;

			Ok(response.result.map(|result| result.count).unwrap_or(0))
		})
	}

	fn list_namespaces<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let response = self.client.list_collections().await?;

			Ok(response.collections.into_iter().map(|collection| collection.name).collect())
		})
	}
}

fn point_from_record(record: ChunkRecord) -> PointStruct {
	let point_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, record.id.as_bytes()).to_string();
	let mut payload = Payload::new();

	for (key, value) in record.metadata {
		payload.insert(key, json_to_value(value));
	}

	payload.insert(RECORD_ID_KEY, record.id);
	payload.insert(TEXT_KEY, record.text);

	PointStruct::new(point_id, record.vector, payload)
}

fn hit_from_point(point: ScoredPoint) -> ScoredHit {
	let mut metadata = Map::new();
	let mut id = String::new();
	let mut text = String::new();

	for (key, value) in point.payload {
		match key.as_str() {
			RECORD_ID_KEY =>
				if let Some(Kind::StringValue(raw)) = value.kind {
					id = raw;
				},
			TEXT_KEY =>
				if let Some(Kind::StringValue(raw)) = value.kind {
					text = raw;
				},
			_ => {
				metadata.insert(key, value_to_json(value));
			},
		}
	}

	// Cosine similarity scores descend with relevance; the engine-wide
	// contract is a distance that ascends with irrelevance.
	ScoredHit { id, text, metadata, distance: 1.0 - point.score }
}

fn json_to_value(json: JsonValue) -> Value {
	let kind = match json {
		JsonValue::Null => Kind::NullValue(0),
		JsonValue::Bool(value) => Kind::BoolValue(value),
		JsonValue::Number(number) =>
			if let Some(value) = number.as_i64() {
				Kind::IntegerValue(value)
			} else {
				Kind::DoubleValue(number.as_f64().unwrap_or(0.0))
			},
		JsonValue::String(value) => Kind::StringValue(value),
		JsonValue::Array(items) => Kind::ListValue(ListValue {
			values: items.into_iter().map(json_to_value).collect(),
		}),
		JsonValue::Object(map) => Kind::StructValue(Struct {
			fields: map.into_iter().map(|(key, value)| (key, json_to_value(value))).collect(),
		}),
	};

	Value { kind: Some(kind) }
}

fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(value)) => JsonValue::Bool(value),
		Some(Kind::IntegerValue(value)) => JsonValue::from(value),
		Some(Kind::DoubleValue(value)) => JsonValue::from(value),
		Some(Kind::StringValue(value)) => JsonValue::String(value),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(fields)) => JsonValue::Object(
			fields.fields.into_iter().map(|(key, value)| (key, value_to_json(value))).collect(),
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_round_trips_through_qdrant_values() {
		let json = serde_json::json!({
			"title": "Handbook",
			"chunk_index": 3,
			"chunk_count": 7,
			"score": 0.25,
			"tags": ["hr", "policy"],
			"nested": { "ok": true, "gone": null }
		});
		let rebuilt = value_to_json(json_to_value(json.clone()));

		assert_eq!(rebuilt, json);
	}

	#[test]
	fn point_ids_are_stable_uuids() {
		let a = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"doc-1__chunk_0");
		let b = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"doc-1__chunk_0");
		let c = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"doc-1__chunk_1");

		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}
