use time::OffsetDateTime;

use sift_domain::access::{self, Collection, Visibility};

/// Catalog row for a collection. ACL fields are stored as serialized JSON
/// lists and decoded leniently on the way out; an unparsable visibility
/// makes the row undecodable (the caller skips it, failing closed).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRecord {
	pub tenant_id: String,
	pub name: String,
	pub visibility: String,
	pub organization_id: Option<String>,
	pub allowed_roles: Option<String>,
	pub allowed_user_ids: Option<String>,
	pub created_at: OffsetDateTime,
}
impl CollectionRecord {
	pub fn into_domain(self) -> Option<Collection> {
		let visibility = Visibility::parse(&self.visibility)?;

		Some(Collection {
			tenant_id: self.tenant_id,
			name: self.name,
			visibility,
			organization_id: self.organization_id,
			allowed_roles: access::acl_list(self.allowed_roles.as_deref()),
			allowed_user_ids: access::acl_list(self.allowed_user_ids.as_deref()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(visibility: &str, allowed_roles: Option<&str>) -> CollectionRecord {
		CollectionRecord {
			tenant_id: "acme".to_string(),
			name: "policies".to_string(),
			visibility: visibility.to_string(),
			organization_id: None,
			allowed_roles: allowed_roles.map(str::to_string),
			allowed_user_ids: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn decodes_known_visibility() {
		let collection = record("role", Some("[\"group_hr\"]")).into_domain().unwrap();

		assert_eq!(collection.visibility, Visibility::Role);
		assert_eq!(collection.allowed_roles, vec!["group_hr".to_string()]);
	}

	#[test]
	fn unknown_visibility_fails_closed() {
		assert!(record("everyone", None).into_domain().is_none());
	}

	#[test]
	fn corrupt_acl_fields_decode_to_empty() {
		let collection = record("role", Some("{{not json")).into_domain().unwrap();

		assert!(collection.allowed_roles.is_empty());
	}
}
