pub mod types;

pub use types::*;

use anyhow::Result;

impl GatewayConfig {
    /// Build configuration from `PORT`/`HOST`/`HOSTNAME` plus the
    /// `CACHEGATE_*` ambient overrides. There is no file-based business
    /// config to load — routes are compiled in-process at startup.
    pub fn from_env() -> Result<Self> {
        let mut config = GatewayConfig::default();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);
        let host = std::env::var("HOST")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        let resolved_host = if host == "localhost" { "127.0.0.1".to_string() } else { host };
        config.listen = format!("{}:{}", resolved_host, port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;

        if let Ok(v) = std::env::var("CACHEGATE_ADMIN_LISTEN") {
            config.admin_listen = v
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid CACHEGATE_ADMIN_LISTEN: {e}"))?;
        }
        if let Ok(v) = std::env::var("CACHEGATE_CACHE_MAX_BYTES") {
            config.cache_max_bytes = Some(
                v.parse()
                    .map_err(|e| anyhow::anyhow!("invalid CACHEGATE_CACHE_MAX_BYTES: {e}"))?,
            );
        }
        if let Ok(v) = std::env::var("CACHEGATE_PERSIST_PATH") {
            config.persist_path = v.into();
        }
        if let Ok(v) = std::env::var("CACHEGATE_PERSIST_INTERVAL_SECS") {
            config.persist_interval_secs = v
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid CACHEGATE_PERSIST_INTERVAL_SECS: {e}"))?;
        }

        tracing::info!(listen = %config.listen, admin_listen = %config.admin_listen, "loaded gateway configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_listen_addrs() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.persist_interval_secs, 5);
    }
}
