use sift_domain::access::{self, Collection, User};

use crate::{ServiceResult, SiftService};

impl SiftService {
	/// Pure read-permission decision; see `sift_domain::access` for the
	/// decision table. Consulted before any query reaches the engine.
	pub fn can_access(&self, user: &User, collection: &Collection) -> bool {
		access::can_access(user, collection, self.access_policy())
	}

	/// Collections of the user's tenant the user may read. Tenant
	/// narrowing and the optional name filter run in the catalog; the
	/// per-candidate decision runs here. Rows whose visibility does not
	/// decode are skipped, failing closed.
	pub async fn allowed_collections(
		&self,
		user: &User,
		names: Option<&[String]>,
	) -> ServiceResult<Vec<Collection>> {
		let records = self.catalog.fetch(&user.tenant_id, names).await?;
		let policy = self.access_policy();
		let mut allowed = Vec::new();

		for record in records {
			let tenant_id = record.tenant_id.clone();
			let name = record.name.clone();
			let Some(collection) = record.into_domain() else {
				tracing::warn!(
					tenant_id = tenant_id.as_str(),
					collection_name = name.as_str(),
					"Skipping collection with unparsable visibility."
				);

				continue;
			};

			if access::can_access(user, &collection, policy) {
				allowed.push(collection);
			}
		}

		Ok(allowed)
	}
}
