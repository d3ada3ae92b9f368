use std::collections::HashSet;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use sift_domain::{access::Visibility, ident, namespace};
use sift_storage::models::CollectionRecord;

use crate::{ServiceResult, SiftService, with_cancel};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProvisionTenantRequest {
	pub tenant_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProvisionTenantResponse {
	pub tenant_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateCollectionRequest {
	pub tenant_id: String,
	pub collection_name: String,
	pub visibility: Option<Visibility>,
	pub organization_id: Option<String>,
	#[serde(default)]
	pub allowed_roles: Vec<String>,
	#[serde(default)]
	pub allowed_user_ids: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateCollectionResponse {
	pub tenant_id: String,
	/// UI-facing name.
	pub collection_name: String,
	/// Namespaced key in the vector backend.
	pub internal_name: String,
	pub document_count: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConfigureRequest {
	pub tenant_id: String,
	pub collection_name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConfigureResponse {
	pub tenant_id: String,
	pub provision: ProvisionTenantResponse,
	pub collection: CreateCollectionResponse,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TenantEntry {
	pub tenant_id: String,
	/// Same as the id until an app-level directory overrides it.
	pub display_name: String,
}

impl SiftService {
	/// Logical provisioning when a tenant first configures retrieval.
	/// Validation only today; the app database hook goes here.
	pub fn provision_tenant(
		&self,
		req: ProvisionTenantRequest,
	) -> ServiceResult<ProvisionTenantResponse> {
		ident::validate("tenant_id", &req.tenant_id)?;

		Ok(ProvisionTenantResponse { tenant_id: req.tenant_id })
	}

	/// Get-or-create of a collection's namespace plus its catalog row.
	/// Collection names can repeat across tenants; the tenant prefix keeps
	/// the backend keys unique.
	pub async fn create_collection(
		&self,
		req: CreateCollectionRequest,
		cancel: &CancellationToken,
	) -> ServiceResult<CreateCollectionResponse> {
		ident::validate("tenant_id", &req.tenant_id)?;
		ident::validate("collection_name", &req.collection_name)?;

		let key = namespace::key(&req.tenant_id, &req.collection_name);

		with_cancel(cancel, self.index.ensure_namespace(&key)).await??;

		let visibility = req.visibility.unwrap_or(Visibility::Tenant);
		let record = CollectionRecord {
			tenant_id: req.tenant_id.clone(),
			name: req.collection_name.clone(),
			visibility: visibility.as_str().to_string(),
			organization_id: req.organization_id,
			allowed_roles: serialize_acl(&req.allowed_roles),
			allowed_user_ids: serialize_acl(&req.allowed_user_ids),
			created_at: OffsetDateTime::now_utc(),
		};

		with_cancel(cancel, self.catalog.upsert(record)).await??;

		let document_count = with_cancel(cancel, self.index.count(&key)).await??;

		Ok(CreateCollectionResponse {
			tenant_id: req.tenant_id,
			collection_name: req.collection_name,
			internal_name: key,
			document_count,
		})
	}

	/// Provision plus create in one call, for the first-run configuration
	/// flow.
	pub async fn configure(
		&self,
		req: ConfigureRequest,
		cancel: &CancellationToken,
	) -> ServiceResult<ConfigureResponse> {
		let provision =
			self.provision_tenant(ProvisionTenantRequest { tenant_id: req.tenant_id.clone() })?;
		let collection = self
			.create_collection(
				CreateCollectionRequest {
					tenant_id: req.tenant_id.clone(),
					collection_name: req.collection_name,
					visibility: None,
					organization_id: None,
					allowed_roles: Vec::new(),
					allowed_user_ids: Vec::new(),
				},
				cancel,
			)
			.await?;

		Ok(ConfigureResponse { tenant_id: req.tenant_id, provision, collection })
	}

	/// Collection names of one tenant, prefix stripped for display.
	/// Backend ordering is preserved.
	pub async fn list_collections(&self, tenant_id: &str) -> ServiceResult<Vec<String>> {
		ident::validate("tenant_id", tenant_id)?;

		let keys = self.index.list_namespaces().await?;

		Ok(keys
			.iter()
			.filter_map(|key| namespace::collection_for_tenant(key, tenant_id))
			.map(str::to_string)
			.collect())
	}

	/// Tenants derived from existing namespace keys. Keys foreign to the
	/// namespacing scheme are skipped, never an error.
	pub async fn list_tenants(&self) -> ServiceResult<Vec<TenantEntry>> {
		let keys = self.index.list_namespaces().await?;
		let mut seen = HashSet::new();
		let mut tenants = Vec::new();

		for key in &keys {
			let Some(tenant_id) = namespace::tenant_of(key) else {
				continue;
			};

			if seen.insert(tenant_id.to_string()) {
				tenants.push(TenantEntry {
					tenant_id: tenant_id.to_string(),
					display_name: tenant_id.to_string(),
				});
			}
		}

		Ok(tenants)
	}
}

fn serialize_acl(values: &[String]) -> Option<String> {
	if values.is_empty() {
		None
	} else {
		serde_json::to_string(values).ok()
	}
}
