// src/config.rs

use std::{env, str::FromStr};

use dotenvy::dotenv;

use crate::grading::PassThreshold;

/// Default number of violations after which an attempt is auto-submitted.
pub const DEFAULT_MAX_VIOLATIONS: u32 = 5;

/// Default fraction of correct answers required to pass.
pub const DEFAULT_PASSING_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    /// Origins allowed by CORS (the student/examiner frontends).
    pub allowed_origins: Vec<String>,
    pub passing_threshold: PassThreshold,
    /// Violations tolerated before the monitor forces submission.
    pub max_violations: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let allowed_origins = env::var("FRONTEND_URL")
            .map(|raw| split_origins(&raw))
            .unwrap_or_else(|_| vec!["http://localhost:5173".to_string()]);

        let threshold: f64 = parse_var("PASSING_THRESHOLD", DEFAULT_PASSING_THRESHOLD);
        let passing_threshold = PassThreshold::new(threshold)
            .expect("PASSING_THRESHOLD must be a fraction between 0 and 1");

        let max_violations = parse_var("MAX_VIOLATIONS", DEFAULT_MAX_VIOLATIONS);
        assert!(max_violations >= 1, "MAX_VIOLATIONS must be at least 1");

        Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_var("PORT", 5000),
            allowed_origins,
            passing_threshold,
            max_violations,
        }
    }
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A present but malformed value aborts startup.
fn parse_var<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw).unwrap_or_else(|msg| panic!("{}", msg)),
        Err(_) => default,
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| format!("{} has an invalid value '{}': {}", key, raw, e))
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
