//! Namespace keys partition the vector backend per (tenant, collection).
//! A key is `tenant_id + "__" + collection_name`; collection names can be
//! reused across tenants because the tenant prefix keeps keys globally
//! unique.

pub const SEPARATOR: &str = "__";

pub fn key(tenant_id: &str, collection_name: &str) -> String {
	format!("{tenant_id}{SEPARATOR}{collection_name}")
}

/// Left inverse of [`key`]: splits at the FIRST separator occurrence.
/// Keys without a separator, or with an empty half, are foreign to this
/// scheme and yield `None`.
pub fn parse(namespace_key: &str) -> Option<(&str, &str)> {
	let (tenant_id, collection_name) = namespace_key.split_once(SEPARATOR)?;

	if tenant_id.is_empty() || collection_name.is_empty() {
		return None;
	}

	Some((tenant_id, collection_name))
}

/// Strips `tenant_id + SEPARATOR` off a key, returning the collection name
/// when the key belongs to that tenant.
pub fn collection_for_tenant<'a>(namespace_key: &'a str, tenant_id: &str) -> Option<&'a str> {
	let rest = namespace_key.strip_prefix(tenant_id)?.strip_prefix(SEPARATOR)?;

	if rest.is_empty() { None } else { Some(rest) }
}

pub fn tenant_of(namespace_key: &str) -> Option<&str> {
	parse(namespace_key).map(|(tenant_id, _)| tenant_id)
}
