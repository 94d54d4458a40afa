//! Process configuration loaded from environment variables.
//!
//! Cache TTL and rate-limit thresholds are constants in their own modules;
//! only deployment details live here.

use std::time::Duration;

/// Default public hosts of the upstream APIs.
pub const DEFAULT_GAMES_URL: &str = "https://games.roblox.com";
pub const DEFAULT_THUMBNAILS_URL: &str = "https://thumbnails.roblox.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Base URL for the games and game-pass listings.
    pub games_url: String,
    /// Base URL for the thumbnail batch lookup.
    pub thumbnails_url: String,
    /// Bound on every single upstream call.
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            games_url: DEFAULT_GAMES_URL.to_string(),
            thumbnails_url: DEFAULT_THUMBNAILS_URL.to_string(),
            upstream_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load from the environment, falling back to [`Config::default`] for
    /// anything unset or unparseable.
    ///
    /// - `PORT` (default 3000)
    /// - `HOST` (default `0.0.0.0`)
    /// - `ROBLOX_GAMES_URL`, `ROBLOX_THUMBNAILS_URL`
    /// - `UPSTREAM_TIMEOUT_SECS` (default 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let host = lookup("HOST")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.host);

        let games_url = lookup("ROBLOX_GAMES_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.games_url);

        let thumbnails_url = lookup("ROBLOX_THUMBNAILS_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.thumbnails_url);

        let upstream_timeout = lookup("UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.upstream_timeout);

        Self {
            host,
            port,
            games_url,
            thumbnails_url,
            upstream_timeout,
        }
    }

    /// `host:port` string for [`Server::bind`](crate::server::Server::bind).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.games_url, DEFAULT_GAMES_URL);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("ROBLOX_GAMES_URL", "http://localhost:9000/"),
            ("UPSTREAM_TIMEOUT_SECS", "3"),
        ]));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.games_url, "http://localhost:9000");
        assert_eq!(config.thumbnails_url, DEFAULT_THUMBNAILS_URL);
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
    }

    #[test]
    fn garbage_falls_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("UPSTREAM_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }
}
