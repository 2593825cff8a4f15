//! Server configuration: an optional TOML file, then environment overrides.
//!
//! ```toml
//! listen_addr = "0.0.0.0:3000"
//! levels_path = "levels/levels.json"
//! default_room = "main"
//!
//! [room]
//! turn_secs = 60
//!
//! [eval]
//! interpreter = "python3"
//! timeout_secs = 5
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use codeturn_eval::{EvalConfig, ScoreRules};
use codeturn_room::{DEFAULT_EMPTY_ROOM_GRACE, DEFAULT_MAX_ROOMS, RoomConfig};
use serde::Deserialize;

/// Config file read when `CODETURN_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "codeturn.toml";

/// Errors building a [`ServerConfig`]. All of them stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level server configuration, loaded from `codeturn.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub levels_path: PathBuf,
    /// Joining this room name creates it on demand. Empty disables it.
    pub default_room: Option<String>,
    /// Connections silent for this long are closed.
    pub idle_timeout_secs: u64,
    pub max_frame_bytes: usize,
    pub max_rooms: usize,
    /// Rooms nobody joins are dropped after this long.
    pub empty_room_grace_secs: u64,
    pub room: RoomConfig,
    pub eval: EvalSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            levels_path: PathBuf::from("levels/levels.json"),
            default_room: Some("main".to_string()),
            idle_timeout_secs: 300,
            max_frame_bytes: 256 * 1024,
            max_rooms: DEFAULT_MAX_ROOMS,
            empty_room_grace_secs: DEFAULT_EMPTY_ROOM_GRACE.as_secs(),
            room: RoomConfig::default(),
            eval: EvalSection::default(),
        }
    }
}

/// The `[eval]` table: how submissions are run and scored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvalSection {
    pub interpreter: String,
    pub timeout_secs: u64,
    pub work_dir: Option<PathBuf>,
    pub max_diagnostic_chars: usize,
    pub epsilon: f64,
    pub score_base: u64,
    pub score_ms_per_point: u64,
    pub score_points_per_char: u64,
}

impl Default for EvalSection {
    fn default() -> Self {
        let runner = EvalConfig::default();
        let score = ScoreRules::default();
        Self {
            interpreter: runner.interpreter,
            timeout_secs: runner.timeout_secs,
            work_dir: runner.work_dir,
            max_diagnostic_chars: runner.max_diagnostic_chars,
            epsilon: runner.epsilon,
            score_base: score.base,
            score_ms_per_point: score.ms_per_point,
            score_points_per_char: score.points_per_char,
        }
    }
}

impl EvalSection {
    pub fn eval_config(&self) -> EvalConfig {
        EvalConfig {
            interpreter: self.interpreter.clone(),
            timeout_secs: self.timeout_secs,
            work_dir: self.work_dir.clone(),
            max_diagnostic_chars: self.max_diagnostic_chars,
            epsilon: self.epsilon,
        }
    }

    pub fn score_rules(&self) -> ScoreRules {
        ScoreRules {
            base: self.score_base,
            ms_per_point: self.score_ms_per_point,
            points_per_char: self.score_points_per_char,
        }
    }
}

impl ServerConfig {
    /// Load from `CODETURN_CONFIG` (or `codeturn.toml` if it exists), apply
    /// environment overrides, and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CODETURN_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            _ => {
                tracing::info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `CODETURN_*` overrides. `lookup` is `std::env::var` in
    /// production; empty values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT") {
            let port: u16 = parse("PORT", &port)?;
            self.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Some(addr) = var("CODETURN_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(path) = var("CODETURN_LEVELS") {
            self.levels_path = PathBuf::from(path);
        }
        if let Some(interpreter) = var("CODETURN_PYTHON") {
            self.eval.interpreter = interpreter;
        }
        if let Some(secs) = var("CODETURN_TURN_SECS") {
            self.room.turn_secs = parse("CODETURN_TURN_SECS", &secs)?;
        }
        if let Some(room) = lookup("CODETURN_DEFAULT_ROOM") {
            self.default_room = Some(room);
        }
        Ok(())
    }

    /// Reject settings the server can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "listen_addr",
                value: self.listen_addr.clone(),
            });
        }
        let positive = [
            ("room.turn_secs", self.room.turn_secs),
            ("room.max_players", self.room.max_players as u64),
            ("eval.timeout_secs", self.eval.timeout_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("max_frame_bytes", self.max_frame_bytes as u64),
            ("max_rooms", self.max_rooms as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{key} must be > 0")));
            }
        }
        if self.eval.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("eval.interpreter must be set".into()));
        }
        if self.room.min_ready_players > self.room.max_players {
            tracing::warn!(
                min_ready = self.room.min_ready_players,
                max_players = self.room.max_players,
                "room.min_ready_players exceeds room.max_players, games can never start"
            );
        }
        Ok(())
    }

    /// The default room name, or `None` when unset or blank.
    pub fn default_room(&self) -> Option<&str> {
        self.default_room
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn empty_room_grace(&self) -> Duration {
        Duration::from_secs(self.empty_room_grace_secs)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_room(), Some("main"));
        assert_eq!(config.room.turn_secs, 60);
        assert_eq!(
            config.eval.eval_config().interpreter,
            EvalConfig::default().interpreter
        );
        assert_eq!(config.eval.score_rules(), ScoreRules::default());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
listen_addr = "127.0.0.1:9090"

[room]
turn_secs = 30

[eval]
timeout_secs = 2
score_base = 500
"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.room.turn_secs, 30);
        assert_eq!(config.room.max_players, 8);
        assert_eq!(config.eval.timeout_secs, 2);
        assert_eq!(config.eval.interpreter, "python3");
        assert_eq!(config.eval.score_rules().base, 500);
        assert_eq!(config.idle_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("CODETURN_LEVELS", "/srv/levels.json"),
                ("CODETURN_PYTHON", "python3.12"),
                ("CODETURN_TURN_SECS", "45"),
                ("CODETURN_DEFAULT_ROOM", ""),
                ("PORT", "8081"),
            ]))
            .unwrap();
        assert_eq!(config.levels_path, PathBuf::from("/srv/levels.json"));
        assert_eq!(config.eval.interpreter, "python3.12");
        assert_eq!(config.room.turn_secs, 45);
        assert_eq!(config.listen_addr, "0.0.0.0:8081");
        assert_eq!(config.default_room(), None);
    }

    #[test]
    fn test_env_listen_addr_wins_over_port() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[("PORT", "8081"), ("CODETURN_LISTEN_ADDR", "127.0.0.1:7000")]))
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_env_bad_number_is_rejected() {
        let mut config = ServerConfig::default();
        let result = config.apply_env(env(&[("CODETURN_TURN_SECS", "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "CODETURN_TURN_SECS", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_addr_and_zero_limits() {
        let mut config = ServerConfig::default();
        config.listen_addr = "not an address".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = ServerConfig::default();
        config.room.turn_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.eval.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.max_rooms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("max_rooms")
        ));
    }

    #[test]
    fn test_parse_room_limits() {
        let config: ServerConfig =
            toml::from_str("max_rooms = 8\nempty_room_grace_secs = 5\n").unwrap();
        assert_eq!(config.max_rooms, 8);
        assert_eq!(config.empty_room_grace(), Duration::from_secs(5));
        assert_eq!(ServerConfig::default().max_rooms, DEFAULT_MAX_ROOMS);
    }

    #[test]
    fn test_from_file_missing_is_read_error() {
        let result = ServerConfig::from_file("/definitely/not/here/codeturn.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
