//! Credential DTOs

use serde::{Deserialize, Serialize};

use crate::domain::credential::Credential;

/// Credential summary; the value is never listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub id: i64,
    pub description: String,
}

impl From<&Credential> for CredentialInfo {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id,
            description: credential.description.clone(),
        }
    }
}

/// Request to create a credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCredential {
    pub description: String,
    pub value: String,
}

/// Request to rewrite a credential's value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCredential {
    pub value: String,
}
