//! Registry DTOs

use serde::{Deserialize, Serialize};

use crate::domain::registry::Registry;

/// Registry summary; the password is never listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user: String,
    pub timeout: i64,
}

impl From<&Registry> for RegistryInfo {
    fn from(registry: &Registry) -> Self {
        Self {
            id: registry.id,
            name: registry.name.clone(),
            url: registry.url.clone(),
            user: registry.user.clone(),
            timeout: registry.timeout,
        }
    }
}

/// Request to create or rewrite a registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFields {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout: i64,
}

fn default_timeout() -> i64 {
    60
}
