//! Registry session cache
//!
//! Per-registry timestamped login state. A login is a no-op while the
//! previous one is within the registry's timeout. Login failures are
//! ignored but still stamp the timestamp, which prevents login storms
//! against a registry with bad credentials.

use std::sync::Arc;

use chrono::Utc;
use racs_core::domain::registry::Registry;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::Config;

/// Ensures a recent login for `registry` and returns its URL for tag
/// construction.
pub async fn login(config: &Config, registry: &Arc<RwLock<Registry>>) -> String {
    let now = Utc::now();
    let (stale, url, user, password) = {
        let registry = registry.read().await;
        (
            registry.stale(now),
            registry.url.clone(),
            registry.user.clone(),
            registry.password.clone(),
        )
    };
    if stale {
        if !user.is_empty() {
            debug!("Logging in to registry {}", url);
            let _ = tokio::process::Command::new(&config.container_tool)
                .args(["login", &url, "-u", &user, "-p", &password])
                .output()
                .await;
        }
        registry.write().await.last_login = now;
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn registry(user: &str) -> Arc<RwLock<Registry>> {
        Arc::new(RwLock::new(Registry::new(
            1,
            "local".to_string(),
            "registry.example.com".to_string(),
            user.to_string(),
            "secret".to_string(),
            60,
        )))
    }

    fn stub_config() -> Config {
        Config {
            // `true` accepts any arguments and exits 0
            container_tool: "true".to_string(),
            no_login: true,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_login_stamps_timestamp_and_returns_url() {
        let config = stub_config();
        let registry = registry("ci");

        let url = login(&config, &registry).await;
        assert_eq!(url, "registry.example.com");
        assert!(!registry.read().await.stale(Utc::now()));
    }

    #[tokio::test]
    async fn test_fresh_login_is_not_repeated() {
        let config = stub_config();
        let registry = registry("ci");

        login(&config, &registry).await;
        let stamped = registry.read().await.last_login;
        login(&config, &registry).await;
        assert_eq!(registry.read().await.last_login, stamped);
    }

    #[tokio::test]
    async fn test_anonymous_registry_still_stamps() {
        let config = stub_config();
        let registry = registry("");
        registry.write().await.last_login = DateTime::UNIX_EPOCH + Duration::seconds(1);

        login(&config, &registry).await;
        assert!(!registry.read().await.stale(Utc::now()));
    }
}
