use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

/// Process-wide configuration, loaded once from the environment (optionally
/// seeded from a `.env` file). The quiz tuning knobs live here so deployments
/// can switch between the observed scoring presets without a rebuild.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_url: String,
    /// Minimum score (0-100) that counts as a pass.
    pub quiz_pass_threshold: i32,
    /// Multiplicative points penalty per retry attempt beyond the first.
    pub quiz_decay_factor: f64,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(|| {
            let project_name =
                env::var("PROJECT_NAME").unwrap_or_else(|_| "learnsphere-api".into());
            let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
            let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/api.log".into());
            let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                fs::create_dir_all(parent).expect("Failed to create log directory");
            }

            let quiz_pass_threshold = env::var("QUIZ_PASS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(80);
            let quiz_decay_factor = env::var("QUIZ_DECAY_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.7);

            Config {
                project_name,
                log_level,
                log_file,
                database_url,
                quiz_pass_threshold,
                quiz_decay_factor,
            }
        })
    }

    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized")
    }
}
