//! Process configuration read from the environment

use crate::llm::LlmConfig;
use crate::roles::GatewayConfig;
use crate::state_machine::DEFAULT_OVERRIDE_PHRASES;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub override_phrases: Vec<String>,
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("STUDYBUDDY_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.studybuddy/studybuddy.db"))
            },
            PathBuf::from,
        );

        let port = lookup("STUDYBUDDY_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let override_phrases = lookup("STUDYBUDDY_OVERRIDE_PHRASES")
            .map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|phrases| !phrases.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_OVERRIDE_PHRASES
                    .iter()
                    .map(|p| (*p).to_string())
                    .collect()
            });

        let defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            output_retries: lookup("STUDYBUDDY_OUTPUT_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.output_retries),
            max_attempts: lookup("STUDYBUDDY_MAX_ATTEMPTS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            ..defaults
        };

        Self {
            db_path,
            port,
            override_phrases,
            gateway,
            llm: LlmConfig::from_lookup(&lookup),
        }
    }
}
