use std::sync::Arc;

use crate::{EmbeddingLoader, Error, Result, embedding};

/// Resolves a provider discriminator to a loader exactly once, at service
/// construction. Callers hold the returned trait object for the process
/// lifetime; nothing is looked up by string again after this point.
pub fn embedding_loader(
	cfg: &sift_config::EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingLoader>> {
	match cfg.provider_id.as_str() {
		embedding::PROVIDER_ID => Ok(Arc::new(embedding::HttpEmbeddingLoader::new(cfg.clone()))),
		other => Err(Error::UnknownProvider { provider_id: other.to_string() }),
	}
}
