//! Module (tool) registry
//!
//! The catalog is compiled into the binary. Only the enablement flag of each
//! module is runtime state, stored as a setting under `module:<key>:enabled`.

use super::catalog::{PermissionKey, PermissionKeyError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    Network,
    Documents,
    Text,
    Converters,
    Mail,
    Education,
}

/// Static description of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub category: ModuleCategory,
    /// Permission key a principal must hold; `None` means any principal
    pub required_permission: Option<&'static str>,
}

impl ModuleDefinition {
    /// Setting key under which the enablement flag is stored
    pub fn enablement_key(&self) -> String {
        enablement_setting_key(self.key)
    }

    /// Typed form of the required permission.
    ///
    /// `Ok(None)` when the module is ungated.
    pub fn required_key(&self) -> Result<Option<PermissionKey>, PermissionKeyError> {
        self.required_permission
            .map(|raw| raw.parse::<PermissionKey>())
            .transpose()
    }
}

pub fn enablement_setting_key(module_key: &str) -> String {
    format!("module:{}:enabled", module_key)
}

const BUILTIN_MODULES: &[ModuleDefinition] = &[
    ModuleDefinition {
        key: "whois-lookup",
        name: "WHOIS Lookup",
        category: ModuleCategory::Network,
        required_permission: Some("tools.whois.access"),
    },
    ModuleDefinition {
        key: "dns-lookup",
        name: "DNS Lookup",
        category: ModuleCategory::Network,
        required_permission: Some("tools.dns.access"),
    },
    ModuleDefinition {
        key: "ssl-checker",
        name: "SSL Checker",
        category: ModuleCategory::Network,
        required_permission: Some("tools.ssl.access"),
    },
    ModuleDefinition {
        key: "pdf-merge",
        name: "PDF Merge",
        category: ModuleCategory::Documents,
        required_permission: Some("tools.pdf.access"),
    },
    ModuleDefinition {
        key: "pdf-split",
        name: "PDF Split",
        category: ModuleCategory::Documents,
        required_permission: Some("tools.pdf.access"),
    },
    ModuleDefinition {
        key: "image-converter",
        name: "Image Converter",
        category: ModuleCategory::Converters,
        required_permission: Some("tools.convert.access"),
    },
    ModuleDefinition {
        key: "json-formatter",
        name: "JSON Formatter",
        category: ModuleCategory::Text,
        required_permission: None,
    },
    ModuleDefinition {
        key: "base64-codec",
        name: "Base64 Encoder/Decoder",
        category: ModuleCategory::Text,
        required_permission: None,
    },
    ModuleDefinition {
        key: "word-counter",
        name: "Word Counter",
        category: ModuleCategory::Text,
        required_permission: None,
    },
    ModuleDefinition {
        key: "mail-tester",
        name: "Mail Tester",
        category: ModuleCategory::Mail,
        required_permission: Some("tools.mail.access"),
    },
    ModuleDefinition {
        key: "quiz-builder",
        name: "Quiz Builder",
        category: ModuleCategory::Education,
        required_permission: Some("quiz.manage"),
    },
];

/// Lookup table over module definitions
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<ModuleDefinition>,
}

impl ModuleRegistry {
    pub fn new(modules: Vec<ModuleDefinition>) -> Self {
        Self { modules }
    }

    /// The modules shipped with the dashboard
    pub fn builtin() -> Self {
        Self::new(BUILTIN_MODULES.to_vec())
    }

    pub fn get(&self, key: &str) -> Option<&ModuleDefinition> {
        self.modules.iter().find(|m| m.key == key)
    }

    pub fn all(&self) -> &[ModuleDefinition] {
        &self.modules
    }

    /// Check every required permission against the permission catalog.
    ///
    /// Returns the offending `(module, key)` pairs. Such modules are denied to
    /// everyone at runtime; boot logs them as configuration warnings.
    pub fn dangling_permissions(&self) -> Vec<(&'static str, &'static str)> {
        self.modules
            .iter()
            .filter_map(|m| match (m.required_permission, m.required_key()) {
                (Some(raw), Err(_)) => Some((m.key, raw)),
                _ => None,
            })
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
