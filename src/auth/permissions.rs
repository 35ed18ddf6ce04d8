//! Role-based permission table for the central repository read surface.
//!
//! The table is built once at process start and never mutated; callers get
//! shared references through [`permission_table`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Named read permissions gating central-repository routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadInstitutions,
    ReadParameters,
    ReadApplications,
    ReadAiData,
    ReadDocuments,
    QueryByParameters,
    BulkQuery,
    ReadStatistics,
    ReadAllInstitutions,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadInstitutions => "canReadInstitutions",
            Permission::ReadParameters => "canReadParameters",
            Permission::ReadApplications => "canReadApplications",
            Permission::ReadAiData => "canReadAIData",
            Permission::ReadDocuments => "canReadDocuments",
            Permission::QueryByParameters => "canQueryByParameters",
            Permission::BulkQuery => "canBulkQuery",
            Permission::ReadStatistics => "canReadStatistics",
            Permission::ReadAllInstitutions => "canReadAllInstitutions",
        }
    }
}

/// Roles recognized by the central repository. Wider than the login roles:
/// API keys may authenticate as an external service, and requests without
/// credentials resolve to the public role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    SuperAdmin,
    AicteAdmin,
    UgcAdmin,
    Institution,
    ExternalService,
    Public,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRole::SuperAdmin => "super_admin",
            AccessRole::AicteAdmin => "aicte_admin",
            AccessRole::UgcAdmin => "ugc_admin",
            AccessRole::Institution => "institution",
            AccessRole::ExternalService => "external_service",
            AccessRole::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<AccessRole> {
        match s {
            "super_admin" => Some(AccessRole::SuperAdmin),
            "aicte_admin" => Some(AccessRole::AicteAdmin),
            "ugc_admin" => Some(AccessRole::UgcAdmin),
            "institution" => Some(AccessRole::Institution),
            "external_service" => Some(AccessRole::ExternalService),
            "public" => Some(AccessRole::Public),
            _ => None,
        }
    }
}

impl From<Role> for AccessRole {
    fn from(role: Role) -> Self {
        match role {
            Role::SuperAdmin => AccessRole::SuperAdmin,
            Role::Aicte => AccessRole::AicteAdmin,
            Role::Ugc => AccessRole::UgcAdmin,
            Role::Institution => AccessRole::Institution,
        }
    }
}

/// Fixed permission bundle attached to a resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PermissionSet {
    pub can_read_institutions: bool,
    pub can_read_parameters: bool,
    pub can_read_applications: bool,
    pub can_read_ai_data: bool,
    pub can_read_documents: bool,
    pub can_query_by_parameters: bool,
    pub can_bulk_query: bool,
    pub can_read_statistics: bool,
    pub can_read_all_institutions: bool,
    /// Identity may only see data for its own bound institution.
    pub own_data_only: bool,
}

impl PermissionSet {
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ReadInstitutions => self.can_read_institutions,
            Permission::ReadParameters => self.can_read_parameters,
            Permission::ReadApplications => self.can_read_applications,
            Permission::ReadAiData => self.can_read_ai_data,
            Permission::ReadDocuments => self.can_read_documents,
            Permission::QueryByParameters => self.can_query_by_parameters,
            Permission::BulkQuery => self.can_bulk_query,
            Permission::ReadStatistics => self.can_read_statistics,
            Permission::ReadAllInstitutions => self.can_read_all_institutions,
        }
    }

    fn full() -> Self {
        Self {
            can_read_institutions: true,
            can_read_parameters: true,
            can_read_applications: true,
            can_read_ai_data: true,
            can_read_documents: true,
            can_query_by_parameters: true,
            can_bulk_query: true,
            can_read_statistics: true,
            can_read_all_institutions: true,
            own_data_only: false,
        }
    }

    /// Apply per-key overrides on top of this set; absent fields keep their
    /// current value.
    pub fn with_overrides(mut self, overrides: &PermissionOverrides) -> Self {
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(value) = overrides.$field {
                    self.$field = value;
                })*
            };
        }
        apply!(
            can_read_institutions,
            can_read_parameters,
            can_read_applications,
            can_read_ai_data,
            can_read_documents,
            can_query_by_parameters,
            can_bulk_query,
            can_read_statistics,
            can_read_all_institutions,
            own_data_only
        );
        self
    }
}

/// Partial permission override stored per API key. Every field is optional
/// so a stored `{"can_read_ai_data": true}` flips one flag and leaves the
/// role defaults intact.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PermissionOverrides {
    pub can_read_institutions: Option<bool>,
    pub can_read_parameters: Option<bool>,
    pub can_read_applications: Option<bool>,
    pub can_read_ai_data: Option<bool>,
    pub can_read_documents: Option<bool>,
    pub can_query_by_parameters: Option<bool>,
    pub can_bulk_query: Option<bool>,
    pub can_read_statistics: Option<bool>,
    pub can_read_all_institutions: Option<bool>,
    pub own_data_only: Option<bool>,
}

/// Static role -> permission bundle mapping.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    super_admin: PermissionSet,
    aicte_admin: PermissionSet,
    ugc_admin: PermissionSet,
    institution: PermissionSet,
    external_service: PermissionSet,
    public: PermissionSet,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self {
            super_admin: PermissionSet::full(),
            aicte_admin: PermissionSet::full(),
            ugc_admin: PermissionSet::full(),
            institution: PermissionSet {
                can_read_parameters: true,
                can_read_applications: true,
                can_read_ai_data: true,
                can_read_documents: true,
                own_data_only: true,
                ..PermissionSet::default()
            },
            external_service: PermissionSet {
                can_read_institutions: true,
                can_read_parameters: true,
                can_read_applications: true,
                can_query_by_parameters: true,
                can_bulk_query: true,
                can_read_statistics: true,
                can_read_all_institutions: true,
                ..PermissionSet::default()
            },
            public: PermissionSet {
                can_read_institutions: true,
                can_read_statistics: true,
                can_read_all_institutions: true,
                ..PermissionSet::default()
            },
        }
    }
}

impl PermissionTable {
    pub fn for_role(&self, role: AccessRole) -> PermissionSet {
        match role {
            AccessRole::SuperAdmin => self.super_admin,
            AccessRole::AicteAdmin => self.aicte_admin,
            AccessRole::UgcAdmin => self.ugc_admin,
            AccessRole::Institution => self.institution,
            AccessRole::ExternalService => self.external_service,
            AccessRole::Public => self.public,
        }
    }
}

static PERMISSION_TABLE: Lazy<PermissionTable> = Lazy::new(PermissionTable::default);

pub fn permission_table() -> &'static PermissionTable {
    &PERMISSION_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_roles_have_full_access() {
        let table = PermissionTable::default();
        for role in [AccessRole::SuperAdmin, AccessRole::AicteAdmin, AccessRole::UgcAdmin] {
            let set = table.for_role(role);
            assert!(set.allows(Permission::ReadAiData), "{:?}", role);
            assert!(set.allows(Permission::BulkQuery), "{:?}", role);
            assert!(!set.own_data_only);
        }
    }

    #[test]
    fn institution_is_scoped_to_own_data() {
        let set = PermissionTable::default().for_role(AccessRole::Institution);
        assert!(set.own_data_only);
        assert!(set.allows(Permission::ReadParameters));
        assert!(set.allows(Permission::ReadDocuments));
        assert!(!set.allows(Permission::ReadInstitutions));
        assert!(!set.allows(Permission::BulkQuery));
        assert!(!set.allows(Permission::ReadStatistics));
    }

    #[test]
    fn external_service_cannot_read_ai_data_or_documents() {
        let set = PermissionTable::default().for_role(AccessRole::ExternalService);
        assert!(set.allows(Permission::ReadInstitutions));
        assert!(set.allows(Permission::ReadStatistics));
        assert!(!set.allows(Permission::ReadAiData));
        assert!(!set.allows(Permission::ReadDocuments));
    }

    #[test]
    fn public_gets_institutions_and_statistics_only() {
        let set = PermissionTable::default().for_role(AccessRole::Public);
        assert!(set.allows(Permission::ReadInstitutions));
        assert!(set.allows(Permission::ReadStatistics));
        assert!(!set.allows(Permission::ReadParameters));
        assert!(!set.allows(Permission::ReadApplications));
    }

    #[test]
    fn login_roles_map_to_access_roles() {
        assert_eq!(AccessRole::from(Role::Ugc), AccessRole::UgcAdmin);
        assert_eq!(AccessRole::from(Role::Aicte), AccessRole::AicteAdmin);
        assert_eq!(AccessRole::from(Role::Institution), AccessRole::Institution);
    }
}
