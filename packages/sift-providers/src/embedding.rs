use std::{sync::Arc, time::Duration};

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use crate::{BoxFuture, EmbeddingLoader, EmbeddingModel};

pub const PROVIDER_ID: &str = "openai_compatible";

/// Loader for OpenAI-compatible embeddings endpoints. "Loading" a model here
/// means building the per-model HTTP client; remote weights stay remote.
pub struct HttpEmbeddingLoader {
	cfg: sift_config::EmbeddingProviderConfig,
}
impl HttpEmbeddingLoader {
	pub fn new(cfg: sift_config::EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}
impl EmbeddingLoader for HttpEmbeddingLoader {
	fn load<'a>(
		&'a self,
		model_name: &'a str,
	) -> BoxFuture<'a, Result<Arc<dyn EmbeddingModel>>> {
		Box::pin(async move {
			let client =
				Client::builder().timeout(Duration::from_millis(self.cfg.timeout_ms)).build()?;
			let model: Arc<dyn EmbeddingModel> = Arc::new(HttpEmbeddingModel {
				cfg: self.cfg.clone(),
				model_name: model_name.to_string(),
				client,
			});

			Ok(model)
		})
	}
}

pub struct HttpEmbeddingModel {
	cfg: sift_config::EmbeddingProviderConfig,
	model_name: String,
	client: Client,
}
impl EmbeddingModel for HttpEmbeddingModel {
	fn name(&self) -> &str {
		&self.model_name
	}

	fn dimensions(&self) -> u32 {
		self.cfg.dimensions
	}

	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
			let body = serde_json::json!({
				"model": self.model_name,
				"input": texts,
				"dimensions": self.cfg.dimensions,
			});
			let res = self
				.client
				.post(url)
				.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
				.json(&body)
				.send()
				.await?;
			let json: Value = res.error_for_status()?.json().await?;

			parse_embedding_response(json)
		})
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number =
				value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
