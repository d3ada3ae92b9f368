pub mod cache;
pub mod embedding;
pub mod registry;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use color_eyre::eyre;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A loaded embedding model. One instance maps text to fixed-length vectors
/// for exactly one model name; loading is the expensive step, embedding is
/// the per-call step.
pub trait EmbeddingModel
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn dimensions(&self) -> u32;

	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Builds [`EmbeddingModel`] instances by model name. Implementations live
/// behind the registry; the cache decides when loading actually happens.
pub trait EmbeddingLoader
where
	Self: Send + Sync,
{
	fn load<'a>(
		&'a self,
		model_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Arc<dyn EmbeddingModel>>>;
}

pub fn auth_headers(
	api_key: &str,
	default_headers: &Map<String, Value>,
) -> color_eyre::Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
