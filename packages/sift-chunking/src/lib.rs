pub use tokenizers::Tokenizer;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("chunking max_tokens must be greater than zero.")]
	ZeroMaxTokens,
	#[error("chunking overlap_tokens ({overlap_tokens}) must be less than max_tokens ({max_tokens}).")]
	OverlapTooLarge { max_tokens: u32, overlap_tokens: u32 },
	#[error("Tokenizer failed: {message}")]
	Tokenizer { message: String },
}

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_tokens: u32,
	pub overlap_tokens: u32,
}
impl ChunkingConfig {
	/// The progress guard: a window must always end past the overlap it
	/// shares with its successor, otherwise the window loop cannot advance.
	pub fn validate(&self) -> Result<()> {
		if self.max_tokens == 0 {
			return Err(Error::ZeroMaxTokens);
		}
		if self.overlap_tokens >= self.max_tokens {
			return Err(Error::OverlapTooLarge {
				max_tokens: self.max_tokens,
				overlap_tokens: self.overlap_tokens,
			});
		}

		Ok(())
	}
}

#[derive(Clone, Debug)]
pub struct Chunk {
	pub chunk_index: i32,
	pub start_token: usize,
	pub end_token: usize,
	pub text: String,
}

pub fn load_tokenizer(repo: &str) -> Result<Tokenizer> {
	Tokenizer::from_pretrained(repo, None)
		.map_err(|err| Error::Tokenizer { message: err.to_string() })
}

/// Splits text into windows of at most `max_tokens` token ids, consecutive
/// windows sharing `overlap_tokens` ids so boundary context survives. Window
/// starts advance strictly (guaranteed by [`ChunkingConfig::validate`]), so
/// the loop terminates for every input. Empty or whitespace-only text yields
/// no chunks.
pub fn split_text(text: &str, cfg: &ChunkingConfig, tokenizer: &Tokenizer) -> Result<Vec<Chunk>> {
	cfg.validate()?;

	let text = text.trim();

	if text.is_empty() {
		return Ok(Vec::new());
	}

	let encoding = tokenizer
		.encode(text, false)
		.map_err(|err| Error::Tokenizer { message: err.to_string() })?;
	let token_ids = encoding.get_ids();
	let n_tokens = token_ids.len();

	if n_tokens == 0 {
		return Ok(Vec::new());
	}

	let max_tokens = cfg.max_tokens as usize;
	let overlap_tokens = cfg.overlap_tokens as usize;
	let mut chunks = Vec::new();
	let mut start = 0_usize;
	let mut chunk_index = 0_i32;

	loop {
		let end = usize::min(start + max_tokens, n_tokens);
		let window = &token_ids[start..end];
		let chunk_text = tokenizer
			.decode(window, true)
			.map_err(|err| Error::Tokenizer { message: err.to_string() })?;

		chunks.push(Chunk { chunk_index, start_token: start, end_token: end, text: chunk_text });

		chunk_index += 1;

		if end == n_tokens {
			break;
		}

		// end == start + max_tokens here, and overlap < max, so this
		// strictly advances.
		start = end - overlap_tokens;
	}

	Ok(chunks)
}
