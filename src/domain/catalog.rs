//! Permission catalog: the closed set of capability keys known to the dashboard

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Regex for permission key format (e.g., "users.edit", "tools.whois.access")
lazy_static::lazy_static! {
    pub static ref PERMISSION_KEY_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*)+$").unwrap();
}

/// Grouping tag used by the admin screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Users,
    Administration,
    Tools,
    Quiz,
}

impl PermissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Administration => "administration",
            Self::Tools => "tools",
            Self::Quiz => "quiz",
        }
    }
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! permission_catalog {
    ($( $variant:ident => ($key:literal, $name:literal, $category:ident, $description:literal) ),+ $(,)?) => {
        /// Every permission the code can check.
        ///
        /// Keys are append-only: a variant may be added, but its key string
        /// must never change once it has been bound to a role.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PermissionKey {
            $( $variant, )+
        }

        impl PermissionKey {
            pub const ALL: &'static [PermissionKey] = &[ $( PermissionKey::$variant, )+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( PermissionKey::$variant => $key, )+
                }
            }

            pub fn definition(&self) -> PermissionDefinition {
                match self {
                    $( PermissionKey::$variant => PermissionDefinition {
                        key: *self,
                        name: $name,
                        category: PermissionCategory::$category,
                        description: $description,
                    }, )+
                }
            }
        }

        impl FromStr for PermissionKey {
            type Err = PermissionKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $key => Ok(PermissionKey::$variant), )+
                    other if PERMISSION_KEY_REGEX.is_match(other) => {
                        Err(PermissionKeyError::Unknown(other.to_string()))
                    }
                    other => Err(PermissionKeyError::Malformed(other.to_string())),
                }
            }
        }
    };
}

permission_catalog! {
    UsersView => ("users.view", "View users", Users, "List principals and their roles"),
    UsersEdit => ("users.edit", "Edit users", Users, "Change user profile data"),
    UsersDelete => ("users.delete", "Deactivate users", Users, "Deactivate user accounts"),
    RolesManage => ("roles.manage", "Manage roles", Administration, "Create, edit and delete roles"),
    SettingsManage => ("settings.manage", "Manage settings", Administration, "Change global toggles"),
    ModulesManage => ("modules.manage", "Manage modules", Administration, "Enable or disable tools"),
    AuditView => ("audit.view", "View audit log", Administration, "Read the audit trail"),
    ToolsWhoisAccess => ("tools.whois.access", "WHOIS lookup", Tools, "Use the WHOIS lookup tool"),
    ToolsDnsAccess => ("tools.dns.access", "DNS lookup", Tools, "Use the DNS lookup tool"),
    ToolsSslAccess => ("tools.ssl.access", "SSL checker", Tools, "Use the SSL certificate checker"),
    ToolsPdfAccess => ("tools.pdf.access", "PDF tools", Tools, "Merge, split and compress PDFs"),
    ToolsConvertAccess => ("tools.convert.access", "Converters", Tools, "Use file format converters"),
    ToolsMailAccess => ("tools.mail.access", "Mail tester", Tools, "Send test mails"),
    QuizManage => ("quiz.manage", "Manage quizzes", Quiz, "Create quizzes and share links"),
}

impl PermissionKey {
    /// Keys granted to the built-in "User" role when it is first created.
    pub fn default_user_grants() -> Vec<PermissionKey> {
        Self::ALL
            .iter()
            .copied()
            .filter(|k| k.definition().category == PermissionCategory::Tools)
            .collect()
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PermissionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PermissionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionKeyError {
    /// Well-formed but not part of the catalog
    #[error("unknown permission key: {0}")]
    Unknown(String),
    /// Not a dotted lowercase key at all
    #[error("malformed permission key: {0}")]
    Malformed(String),
}

/// Static description of one catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub key: PermissionKey,
    pub name: &'static str,
    pub category: PermissionCategory,
    pub description: &'static str,
}
