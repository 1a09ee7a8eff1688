//! Entity catalogue
//!
//! The set of exportable entity types is closed and known at compile time.
//! Each type carries a static [`EntitySchema`] describing its archive name,
//! schema version, scope, foreign keys and constraints. Dependency ordering,
//! serialization, validation and restore are all driven from this table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ORG_REF;

/// Where an entity type lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLevel {
    /// Rows belong to one organization (carry an `org_id` reference)
    Tenant,
    /// Rows are instance-wide and only exported in global scope
    Global,
}

/// Declared foreign key of an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Reference field name in [`Record::refs`](crate::Record)
    pub field: &'static str,
    /// Entity type the field points at
    pub parent: EntityType,
    /// Whether every record must carry the reference
    pub required: bool,
}

const fn fk(field: &'static str, parent: EntityType, required: bool) -> ForeignKey {
    ForeignKey {
        field,
        parent,
        required,
    }
}

/// Static description of one entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Archive name (also the payload file stem)
    pub name: &'static str,
    /// Record layout version written into archives
    pub version: u32,
    /// Tenant-owned or instance-wide
    pub scope: ScopeLevel,
    /// Archives without this type cannot be restored
    pub mandatory: bool,
    /// Readers that do not know this type may skip it
    pub skippable: bool,
    /// Foreign keys in declaration order
    pub foreign_keys: &'static [ForeignKey],
    /// Data fields every record must carry
    pub required_fields: &'static [&'static str],
    /// Data fields unique per organization (or per instance for global types)
    pub unique_fields: &'static [&'static str],
}

/// Exportable entity types, in declaration order
///
/// Declaration order is the tie-breaker of the dependency sort, so it must
/// stay stable for archives to remain reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Organizations (tenants) and their settings
    Organizations,
    /// User accounts
    Users,
    /// Spaces (folders)
    Spaces,
    /// Document categories within a space
    Categories,
    /// Documents
    Documents,
    /// Pages (document sections)
    Pages,
    /// File attachments of documents
    Attachments,
    /// Document ↔ category assignments
    CategoryMembers,
    /// Space permissions
    Permissions,
    /// Instance-wide configuration
    Config,
}

use EntityType::*;

static ORGANIZATIONS: EntitySchema = EntitySchema {
    name: "organizations",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: true,
    skippable: false,
    foreign_keys: &[],
    required_fields: &["title"],
    unique_fields: &["domain"],
};

static USERS: EntitySchema = EntitySchema {
    name: "users",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: false,
    foreign_keys: &[fk(ORG_REF, Organizations, true)],
    required_fields: &["email"],
    unique_fields: &["email"],
};

static SPACES: EntitySchema = EntitySchema {
    name: "spaces",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: false,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("created_by", Users, false),
    ],
    required_fields: &["name"],
    unique_fields: &[],
};

static CATEGORIES: EntitySchema = EntitySchema {
    name: "categories",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: true,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("space_id", Spaces, true),
    ],
    required_fields: &["name"],
    unique_fields: &[],
};

static DOCUMENTS: EntitySchema = EntitySchema {
    name: "documents",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: false,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("space_id", Spaces, true),
        fk("created_by", Users, false),
    ],
    required_fields: &["title"],
    unique_fields: &[],
};

static PAGES: EntitySchema = EntitySchema {
    name: "pages",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: false,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("document_id", Documents, true),
        fk("created_by", Users, false),
    ],
    required_fields: &["title"],
    unique_fields: &[],
};

static ATTACHMENTS: EntitySchema = EntitySchema {
    name: "attachments",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: true,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("document_id", Documents, true),
        fk("page_id", Pages, false),
    ],
    required_fields: &["filename"],
    unique_fields: &[],
};

static CATEGORY_MEMBERS: EntitySchema = EntitySchema {
    name: "category_members",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: true,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("category_id", Categories, true),
        fk("document_id", Documents, true),
    ],
    required_fields: &[],
    unique_fields: &[],
};

static PERMISSIONS: EntitySchema = EntitySchema {
    name: "permissions",
    version: 1,
    scope: ScopeLevel::Tenant,
    mandatory: false,
    skippable: true,
    foreign_keys: &[
        fk(ORG_REF, Organizations, true),
        fk("space_id", Spaces, true),
        fk("user_id", Users, false),
    ],
    required_fields: &["action"],
    unique_fields: &[],
};

static CONFIG: EntitySchema = EntitySchema {
    name: "config",
    version: 1,
    scope: ScopeLevel::Global,
    mandatory: false,
    skippable: true,
    foreign_keys: &[],
    required_fields: &[],
    unique_fields: &["key"],
};

impl EntityType {
    /// All entity types in declaration order
    pub const ALL: [EntityType; 10] = [
        Organizations,
        Users,
        Spaces,
        Categories,
        Documents,
        Pages,
        Attachments,
        CategoryMembers,
        Permissions,
        Config,
    ];

    /// Static schema for this type
    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Organizations => &ORGANIZATIONS,
            Users => &USERS,
            Spaces => &SPACES,
            Categories => &CATEGORIES,
            Documents => &DOCUMENTS,
            Pages => &PAGES,
            Attachments => &ATTACHMENTS,
            CategoryMembers => &CATEGORY_MEMBERS,
            Permissions => &PERMISSIONS,
            Config => &CONFIG,
        }
    }

    /// Archive name
    pub fn name(self) -> &'static str {
        self.schema().name
    }

    /// Position in declaration order
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Look up a type by archive name
    pub fn from_name(name: &str) -> Option<EntityType> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Foreign keys of this type
    pub fn foreign_keys(self) -> &'static [ForeignKey] {
        self.schema().foreign_keys
    }

    /// Distinct parent types, in foreign-key declaration order
    pub fn parents(self) -> Vec<EntityType> {
        let mut parents: Vec<EntityType> = Vec::new();
        for key in self.foreign_keys() {
            if !parents.contains(&key.parent) {
                parents.push(key.parent);
            }
        }
        parents
    }

    /// Parent types that at least one required foreign key points at
    pub fn required_parents(self) -> Vec<EntityType> {
        let mut parents: Vec<EntityType> = Vec::new();
        for key in self.foreign_keys().iter().filter(|k| k.required) {
            if !parents.contains(&key.parent) {
                parents.push(key.parent);
            }
        }
        parents
    }

    /// True for instance-wide types
    pub fn is_global_only(self) -> bool {
        self.schema().scope == ScopeLevel::Global
    }

    /// True for types every archive must contain
    pub fn is_mandatory(self) -> bool {
        self.schema().mandatory
    }

    /// True for types older readers may skip
    pub fn is_skippable(self) -> bool {
        self.schema().skippable
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::from_name(s).ok_or_else(|| format!("unknown entity type '{}'", s))
    }
}
