//! Registry domain types

use chrono::{DateTime, Duration, Utc};

/// A container image registry with credentialed login state
///
/// `last_login` is runtime-only: it starts at the epoch so the first
/// push after start-up always re-authenticates.
#[derive(Debug, Clone)]
pub struct Registry {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user: String,
    pub password: String,
    /// Login staleness timeout, in minutes
    pub timeout: i64,
    pub last_login: DateTime<Utc>,
}

impl Registry {
    pub fn new(
        id: i64,
        name: String,
        url: String,
        user: String,
        password: String,
        timeout: i64,
    ) -> Self {
        Self {
            id,
            name,
            url,
            user,
            password,
            timeout,
            last_login: DateTime::UNIX_EPOCH,
        }
    }

    /// Whether a login performed at `last_login` has gone stale by `now`
    pub fn stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_login > Duration::minutes(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_registry_is_stale() {
        let registry = Registry::new(
            1,
            "local".to_string(),
            "registry.example.com".to_string(),
            "ci".to_string(),
            "secret".to_string(),
            60,
        );
        assert!(registry.stale(Utc::now()));
    }

    #[test]
    fn test_recent_login_is_not_stale() {
        let mut registry = Registry::new(
            1,
            "local".to_string(),
            "registry.example.com".to_string(),
            "ci".to_string(),
            "secret".to_string(),
            60,
        );
        let now = Utc::now();
        registry.last_login = now - Duration::minutes(10);
        assert!(!registry.stale(now));
        registry.last_login = now - Duration::minutes(61);
        assert!(registry.stale(now));
    }
}
