use std::time::Duration;

/// Relay configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection string for membership and history.
    pub redis_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Upper bound on any single history-store call.
    pub store_timeout: Duration,
    /// Room history behaviour handed to the coordinator.
    pub rooms: RoomSettings,
}

/// Limits applied to per-room history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Messages returned to a client on join.
    pub history_limit: usize,
    /// Messages retained per room.
    pub history_cap: usize,
    /// Expiry refreshed on the history key with every append.
    pub history_ttl_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            history_cap: 100,
            history_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = RoomSettings::default();
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            port: parsed_var("PORT").unwrap_or(5000),
            store_timeout: Duration::from_millis(parsed_var("STORE_TIMEOUT_MS").unwrap_or(2000)),
            rooms: RoomSettings {
                history_limit: parsed_var("HISTORY_LIMIT")
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.history_limit),
                history_cap: parsed_var("HISTORY_CAP")
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.history_cap),
                history_ttl_secs: parsed_var("HISTORY_TTL_SECS")
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.history_ttl_secs),
            },
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_defaults_match_history_policy() {
        let settings = RoomSettings::default();
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.history_cap, 100);
        assert_eq!(settings.history_ttl_secs, 86_400);
    }

    #[test]
    fn parsed_var_ignores_garbage() {
        std::env::set_var("RELAY_TEST_GARBAGE", "not-a-number");
        assert_eq!(parsed_var::<u16>("RELAY_TEST_GARBAGE"), None);
        std::env::set_var("RELAY_TEST_PORT", " 8080 ");
        assert_eq!(parsed_var::<u16>("RELAY_TEST_PORT"), Some(8080));
        assert_eq!(parsed_var::<u16>("RELAY_TEST_UNSET_VAR"), None);
    }
}
