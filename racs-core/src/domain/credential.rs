//! Credential domain types

/// A named secret bound into project build environments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: i64,
    pub description: String,
    pub value: String,
}
