use std::time::Duration;

use serde::Deserialize;

use tag_core::powerup::SpawnLocation;

/// Top-level server configuration, loaded from `tag.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory of the browser client. Static serving is skipped when unset.
    pub web_root: Option<String>,
    pub game: GameConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: None,
            game: GameConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Tag and buff rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub buff_spawn_interval_ms: u64,
    pub buff_duration_ms: u64,
    /// Largest spawn location list a client may register.
    pub max_spawn_locations: usize,
    /// Spawn points known at boot. When non-empty, client registrations are
    /// ignored and the spawn timer starts immediately.
    pub spawn_locations: Vec<SpawnLocation>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            buff_spawn_interval_ms: 30_000,
            buff_duration_ms: 5_000,
            max_spawn_locations: 256,
            spawn_locations: Vec::new(),
        }
    }
}

impl GameConfig {
    pub fn buff_spawn_interval(&self) -> Duration {
        Duration::from_millis(self.buff_spawn_interval_ms)
    }

    pub fn buff_duration(&self) -> Duration {
        Duration::from_millis(self.buff_duration_ms)
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Position updates per second per connection, also the burst size.
    pub ws_position_rate_per_sec: f64,
    /// Name changes, pings, and unrecognised frames per second per connection.
    /// Tag and buff claims are never metered.
    pub ws_control_rate_per_sec: f64,
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            // Clients send a position update every animation frame, and
            // displays run at up to 240 Hz
            ws_position_rate_per_sec: 300.0,
            ws_control_rate_per_sec: 30.0,
            player_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Check the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            ));
        }

        if self.game.buff_spawn_interval_ms == 0 {
            return Err("game.buff_spawn_interval_ms must be > 0".to_string());
        }
        if self.game.buff_duration_ms == 0 {
            return Err("game.buff_duration_ms must be > 0".to_string());
        }
        if self.game.max_spawn_locations == 0 {
            return Err("game.max_spawn_locations must be > 0".to_string());
        }
        if self.game.spawn_locations.len() > self.game.max_spawn_locations {
            return Err(format!(
                "game.spawn_locations has {} entries, more than max_spawn_locations ({})",
                self.game.spawn_locations.len(),
                self.game.max_spawn_locations
            ));
        }

        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.ws_position_rate_per_sec < 1.0 {
            return Err("limits.ws_position_rate_per_sec must be >= 1".to_string());
        }
        if self.limits.ws_control_rate_per_sec < 1.0 {
            return Err("limits.ws_control_rate_per_sec must be >= 1".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }

        if self.game.buff_duration_ms > self.game.buff_spawn_interval_ms {
            tracing::warn!(
                duration_ms = self.game.buff_duration_ms,
                interval_ms = self.game.buff_spawn_interval_ms,
                "Buff duration exceeds spawn interval; buffs will overlap"
            );
        }

        Ok(())
    }

    /// Load config from `tag.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("tag.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from tag.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse tag.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No tag.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("TAG_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("TAG_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = Some(root);
        }

        if let Ok(val) = std::env::var("TAG_BUFF_SPAWN_INTERVAL_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.buff_spawn_interval_ms = n;
        }
        if let Ok(val) = std::env::var("TAG_BUFF_DURATION_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.buff_duration_ms = n;
        }

        if let Ok(val) = std::env::var("TAG_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("TAG_WS_POSITION_RATE")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_position_rate_per_sec = n;
        }
        if let Ok(val) = std::env::var("TAG_WS_CONTROL_RATE")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_control_rate_per_sec = n;
        }

        config
    }
}
