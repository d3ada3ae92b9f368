use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{EmbeddingLoader, EmbeddingModel};

/// Single most-recently-used model slot. Loading a model with a new name
/// evicts the resident one; asking for the resident name never reloads.
/// Concurrent callers serialize behind the slot mutex, so a load happens at
/// most once per name while it stays resident, and a failed load leaves the
/// previous occupant in place.
pub struct ModelCache {
	loader: Arc<dyn EmbeddingLoader>,
	slot: Mutex<Option<(String, Arc<dyn EmbeddingModel>)>>,
}
impl ModelCache {
	pub fn new(loader: Arc<dyn EmbeddingLoader>) -> Self {
		Self { loader, slot: Mutex::new(None) }
	}

	pub async fn get(&self, model_name: &str) -> color_eyre::Result<Arc<dyn EmbeddingModel>> {
		let mut slot = self.slot.lock().await;

		if let Some((resident, model)) = slot.as_ref()
			&& resident == model_name
		{
			return Ok(model.clone());
		}

		let model = self.loader.load(model_name).await?;

		*slot = Some((model_name.to_string(), model.clone()));

		Ok(model)
	}

	pub async fn embed(
		&self,
		model_name: &str,
		texts: &[String],
	) -> color_eyre::Result<Vec<Vec<f32>>> {
		let model = self.get(model_name).await?;

		model.embed(texts).await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	use super::*;
	use crate::BoxFuture;

	struct StubModel {
		model_name: String,
	}
	impl EmbeddingModel for StubModel {
		fn name(&self) -> &str {
			&self.model_name
		}

		fn dimensions(&self) -> u32 {
			3
		}

		fn embed<'a>(
			&'a self,
			texts: &'a [String],
		) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
			Box::pin(async move { Ok(vec![vec![0.0; 3]; texts.len()]) })
		}
	}

	struct CountingLoader {
		loads: AtomicUsize,
		fail_next: AtomicBool,
	}
	impl CountingLoader {
		fn new() -> Self {
			Self { loads: AtomicUsize::new(0), fail_next: AtomicBool::new(false) }
		}
	}
	impl EmbeddingLoader for CountingLoader {
		fn load<'a>(
			&'a self,
			model_name: &'a str,
		) -> BoxFuture<'a, color_eyre::Result<Arc<dyn EmbeddingModel>>> {
			Box::pin(async move {
				if self.fail_next.swap(false, Ordering::SeqCst) {
					return Err(color_eyre::eyre::eyre!("load failed"));
				}

				self.loads.fetch_add(1, Ordering::SeqCst);

				let model: Arc<dyn EmbeddingModel> =
					Arc::new(StubModel { model_name: model_name.to_string() });

				Ok(model)
			})
		}
	}

	#[tokio::test]
	async fn resident_model_loads_once() {
		let loader = Arc::new(CountingLoader::new());
		let cache = ModelCache::new(loader.clone());

		for _ in 0..3 {
			cache.get("all-MiniLM-L6-v2").await.unwrap();
		}

		assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn second_model_name_evicts_the_first() {
		let loader = Arc::new(CountingLoader::new());
		let cache = ModelCache::new(loader.clone());

		cache.get("model-a").await.unwrap();
		cache.get("model-b").await.unwrap();

		assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

		// The first model was evicted by the single slot, so it loads again.
		cache.get("model-a").await.unwrap();

		assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn failed_load_keeps_the_resident_model() {
		let loader = Arc::new(CountingLoader::new());
		let cache = ModelCache::new(loader.clone());

		cache.get("model-a").await.unwrap();
		loader.fail_next.store(true, Ordering::SeqCst);

		assert!(cache.get("model-b").await.is_err());

		// model-a is still resident and serves from the slot.
		cache.get("model-a").await.unwrap();

		assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
	}
}
