use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use minesweeper_common::protocol::LEVELS;
use minesweeper_solver::SolverSettings;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::Result;
use crate::storage::{FileTokenStore, MemoryTokenStore, TokenStore};

pub const DEFAULT_SERVER_URL: &str = "wss://hometask.eg1236.com/game1/";

/// Client settings read from the environment. Invalid values fall back to
/// the defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub level: u8,
    pub token_file: Option<PathBuf>,
    pub solver: SolverSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            level: 1,
            token_file: None,
            solver: SolverSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let solver = SolverSettings {
            step_delay_ms: setting(
                &lookup,
                "SOLVER_STEP_DELAY_MS",
                defaults.solver.step_delay_ms,
                |_| true,
            ),
            predict_bound: setting(
                &lookup,
                "SOLVER_PREDICT_BOUND",
                defaults.solver.predict_bound,
                |bound| (0.0..=1.0).contains(bound),
            ),
            random_when_stuck: setting(
                &lookup,
                "SOLVER_RANDOM_WHEN_STUCK",
                defaults.solver.random_when_stuck,
                |_| true,
            ),
        };

        let level = lookup("MINESWEEPER_LEVEL")
            .unwrap_or_else(|| defaults.level.to_string())
            .parse::<u8>()
            .ok()
            .filter(|level| LEVELS.contains(level))
            .unwrap_or_else(|| {
                warn!("MINESWEEPER_LEVEL is not one of 1..=4, using 1");
                defaults.level
            });

        let server_url = match lookup("MINESWEEPER_SERVER_URL") {
            Some(raw) if is_websocket_url(&raw) => raw,
            Some(raw) => {
                warn!("Ignoring invalid MINESWEEPER_SERVER_URL: {}", raw);
                defaults.server_url
            }
            None => defaults.server_url,
        };

        let config = Self {
            server_url,
            level,
            token_file: lookup("MINESWEEPER_TOKEN_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            solver,
        };
        info!(
            "Client config: server {}, level {}, step delay {}ms, predict bound {}",
            config.server_url, config.level, config.solver.step_delay_ms, config.solver.predict_bound
        );
        config
    }

    /// File-backed store when a token file is configured, memory otherwise
    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        Ok(match &self.token_file {
            Some(path) => Box::new(FileTokenStore::open(path)?),
            None => Box::new(MemoryTokenStore::new()),
        })
    }
}

/// Parsed value of `name`, or `default` when it is unset, unparsable or
/// rejected by `valid`.
fn setting<T, F, V>(lookup: &F, name: &str, default: T, valid: V) -> T
where
    T: FromStr + Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!("Ignoring invalid {}: {}, using {}", name, raw, default);
            default
        }
    }
}

fn is_websocket_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "ws" | "wss"))
}
