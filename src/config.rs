//! Process-level configuration for the server binary.

use crate::lock::DEFAULT_POOL_CAPACITY;
use crate::types::{GameConfig, NoCorrectTiming};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Sliding expiration of every store entry
    pub session_ttl: Duration,
    /// How often the inactivity scanner wakes up
    pub scan_interval: Duration,
    /// Idle mutexes kept around by the round lock
    pub round_lock_pool: usize,
    /// Rules given to newly created rooms
    pub game: GameConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6574)),
            session_ttl: Duration::from_secs(60 * 60),
            scan_interval: Duration::from_secs(10),
            round_lock_pool: DEFAULT_POOL_CAPACITY,
            game: GameConfig::default(),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            session_ttl: Duration::from_secs(
                env_or("SESSION_TTL_MINUTES", defaults.session_ttl.as_secs() / 60) * 60,
            ),
            scan_interval: Duration::from_secs(env_or(
                "SCAN_INTERVAL_SECS",
                defaults.scan_interval.as_secs(),
            ))
            .max(Duration::from_secs(1)),
            round_lock_pool: env_or("ROUND_LOCK_POOL", defaults.round_lock_pool),
            game: game_config_from_env(),
        }
    }
}

/// Default room rules, overridable per room by the host
pub fn game_config_from_env() -> GameConfig {
    let defaults = GameConfig::default();
    let config = GameConfig {
        question_limit: env_or("GAME_QUESTION_LIMIT", defaults.question_limit),
        answer_limit: env_or("GAME_ANSWER_LIMIT", defaults.answer_limit),
        correct_point: env_or("GAME_CORRECT_POINT", defaults.correct_point),
        liar_point: env_or("GAME_LIAR_POINT", defaults.liar_point),
        no_correct_point: env_or("GAME_NO_CORRECT_POINT", defaults.no_correct_point),
        inactivity_threshold_minutes: env_or(
            "GAME_INACTIVITY_MINUTES",
            defaults.inactivity_threshold_minutes,
        ),
        ai_question_threshold: env_or(
            "GAME_AI_QUESTION_THRESHOLD",
            defaults.ai_question_threshold,
        ),
        no_correct_timing: env_or::<NoCorrectTiming>(
            "GAME_NO_CORRECT_TIMING",
            defaults.no_correct_timing,
        ),
    };

    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            tracing::warn!("Invalid game defaults ({}), using built-in rules", e);
            defaults
        }
    }
}
