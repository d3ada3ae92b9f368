pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unknown embedding provider id {provider_id:?}.")]
	UnknownProvider { provider_id: String },
}
