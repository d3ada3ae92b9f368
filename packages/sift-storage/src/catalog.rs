use sqlx::PgPool;

use crate::{BoxFuture, Result, models::CollectionRecord};

/// The collection catalog: tenant narrowing and the optional name filter
/// happen here, at the storage layer, before any per-candidate access
/// check runs in memory.
pub trait CollectionCatalog
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		tenant_id: &'a str,
		names: Option<&'a [String]>,
	) -> BoxFuture<'a, Result<Vec<CollectionRecord>>>;

	fn upsert<'a>(&'a self, record: CollectionRecord) -> BoxFuture<'a, Result<()>>;
}

pub struct PgCatalog {
	pub pool: PgPool,
}
impl PgCatalog {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl CollectionCatalog for PgCatalog {
	fn fetch<'a>(
		&'a self,
		tenant_id: &'a str,
		names: Option<&'a [String]>,
	) -> BoxFuture<'a, Result<Vec<CollectionRecord>>> {
		Box::pin(async move {
			let mut builder = sqlx::QueryBuilder::new(
				"SELECT tenant_id, name, visibility, organization_id, allowed_roles, allowed_user_ids, created_at \
				 FROM collections WHERE tenant_id = ",
			);

			builder.push_bind(tenant_id);

			if let Some(names) = names
				&& !names.is_empty()
			{
				builder.push(" AND name IN (");

				let mut separated = builder.separated(", ");

				for name in names {
					separated.push_bind(name);
				}

				separated.push_unseparated(")");
			}

			builder.push(" ORDER BY name");

			let records: Vec<CollectionRecord> =
				builder.build_query_as().fetch_all(&self.pool).await?;

			Ok(records)
		})
	}

	fn upsert<'a>(&'a self, record: CollectionRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO collections (
	tenant_id,
	name,
	visibility,
	organization_id,
	allowed_roles,
	allowed_user_ids,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (tenant_id, name)
DO UPDATE
SET
	visibility = EXCLUDED.visibility,
	organization_id = EXCLUDED.organization_id,
	allowed_roles = EXCLUDED.allowed_roles,
	allowed_user_ids = EXCLUDED.allowed_user_ids",
			)
			.bind(&record.tenant_id)
			.bind(&record.name)
			.bind(&record.visibility)
			.bind(&record.organization_id)
			.bind(&record.allowed_roles)
			.bind(&record.allowed_user_ids)
			.bind(record.created_at)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}
}
