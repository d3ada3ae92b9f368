use regex::Regex;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{label} must be alphanumeric and may include '-' or '_'.")]
pub struct InvalidIdent {
	pub label: &'static str,
}

/// Tenant ids and collection names share one identifier alphabet. Rejection
/// happens before any namespace key is derived.
pub fn validate(label: &'static str, value: &str) -> Result<(), InvalidIdent> {
	if is_valid(value) { Ok(()) } else { Err(InvalidIdent { label }) }
}

pub fn is_valid(value: &str) -> bool {
	Regex::new(r"^[A-Za-z0-9_-]+$").map(|re| re.is_match(value)).unwrap_or(false)
}
