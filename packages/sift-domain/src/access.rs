//! Collection read permission. A pure decision over (user, collection); the
//! evaluator owns no state and never touches storage.

use serde::{Deserialize, Serialize};

/// Who may read a collection. The set is closed on purpose: adding a new
/// visibility kind must fail the exhaustive matches below at compile time
/// instead of silently falling through to a deny arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
	Tenant,
	Org,
	Role,
	User,
}
impl Visibility {
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"tenant" => Some(Self::Tenant),
			"org" => Some(Self::Org),
			"role" => Some(Self::Role),
			"user" => Some(Self::User),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Tenant => "tenant",
			Self::Org => "org",
			Self::Role => "role",
			Self::User => "user",
		}
	}
}

/// The closed role set. Group roles span the whole tenant umbrella;
/// subsidiary roles are scoped to one organization within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	GroupGmd,
	GroupExec,
	GroupHr,
	GroupAdmin,
	GroupFinance,
	GroupOperation,
	GroupProduction,
	GroupMarketing,
	GroupLegal,
	SubMd,
	SubExec,
	SubAdmin,
	SubOperations,
	SubHr,
	SubFinance,
	SubProduction,
	SubLegal,
	SubMarketing,
	Employee,
}
impl Role {
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"group_gmd" => Some(Self::GroupGmd),
			"group_exe" => Some(Self::GroupExec),
			"group_hr" => Some(Self::GroupHr),
			"group_admin" => Some(Self::GroupAdmin),
			"group_finance" => Some(Self::GroupFinance),
			"group_operation" => Some(Self::GroupOperation),
			"group_production" => Some(Self::GroupProduction),
			"group_marketing" => Some(Self::GroupMarketing),
			"group_legal" => Some(Self::GroupLegal),
			"sub_md" => Some(Self::SubMd),
			"sub_exec" => Some(Self::SubExec),
			"sub_admin" => Some(Self::SubAdmin),
			"sub_operations" => Some(Self::SubOperations),
			"sub_hr" => Some(Self::SubHr),
			"sub_finance" => Some(Self::SubFinance),
			"sub_production" => Some(Self::SubProduction),
			"sub_legal" => Some(Self::SubLegal),
			"sub_marketing" => Some(Self::SubMarketing),
			"employee" => Some(Self::Employee),
			_ => None,
		}
	}

	pub fn is_group(self) -> bool {
		matches!(
			self,
			Self::GroupGmd
				| Self::GroupExec
				| Self::GroupHr
				| Self::GroupAdmin
				| Self::GroupFinance
				| Self::GroupOperation
				| Self::GroupProduction
				| Self::GroupMarketing
				| Self::GroupLegal
		)
	}
}

/// Read-only view of the auth subsystem's user record. `role` stays a raw
/// string here; an unknown role parses to `None` and denies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: String,
	pub tenant_id: String,
	pub role: String,
	pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
	pub tenant_id: String,
	pub name: String,
	pub visibility: Visibility,
	pub organization_id: Option<String>,
	pub allowed_roles: Vec<String>,
	pub allowed_user_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
	/// When set, a non-empty allowed-user list requires membership before
	/// any visibility branch runs.
	pub explicit_user_list_wins: bool,
}

/// Normalizes a stored ACL field (absent / JSON array / garbage) into a
/// list. Corrupt encodings degrade to the empty list; they never surface a
/// parse error to access checks.
pub fn acl_list(raw: Option<&str>) -> Vec<String> {
	let Some(raw) = raw else {
		return Vec::new();
	};
	let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
		return Vec::new();
	};
	let Some(items) = value.as_array() else {
		return Vec::new();
	};

	items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
}

pub fn can_access(user: &User, collection: &Collection, policy: AccessPolicy) -> bool {
	// Tenant isolation is the hard gate; nothing below may override it.
	if collection.tenant_id != user.tenant_id {
		return false;
	}

	let Some(role) = Role::parse(&user.role) else {
		return false;
	};

	if policy.explicit_user_list_wins
		&& !collection.allowed_user_ids.is_empty()
		&& !collection.allowed_user_ids.iter().any(|id| id == &user.id)
	{
		return false;
	}

	if role.is_group() {
		return match collection.visibility {
			Visibility::Role => collection.allowed_roles.iter().any(|r| r == &user.role),
			Visibility::User => collection.allowed_user_ids.iter().any(|id| id == &user.id),
			Visibility::Tenant | Visibility::Org => true,
		};
	}

	match collection.visibility {
		Visibility::Tenant => true,
		Visibility::Org =>
			user.organization_id.is_some()
				&& user.organization_id == collection.organization_id,
		Visibility::Role =>
			user.organization_id == collection.organization_id
				&& collection.allowed_roles.iter().any(|r| r == &user.role),
		Visibility::User => collection.allowed_user_ids.iter().any(|id| id == &user.id),
	}
}
