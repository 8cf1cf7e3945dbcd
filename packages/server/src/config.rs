use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    /// Secret for interview action tokens (accept/reject links)
    pub token_signing_secret: String,
    /// Secret for recruiter session JWTs (issuance handled externally)
    pub jwt_secret: String,
    pub jwt_issuer: String,

    /// Candidate-facing landing pages; when unset, action endpoints answer JSON
    pub frontend_base_url: Option<String>,

    pub email_service_url: String,
    pub calendar_service_url: String,
    pub risk_service_url: String,
    pub scoring_service_url: String,
    /// Absent disables LLM parsing/responses regardless of feature flags
    pub llm_service_url: Option<String>,

    pub email_timeout: Duration,
    pub calendar_timeout: Duration,
    pub risk_timeout: Duration,
    pub scoring_timeout: Duration,
    pub llm_timeout: Duration,

    /// Background cycle period (default five minutes)
    pub cycle_period: Duration,
    pub confirmation_deadline_hours: i64,
    pub slot_selection_deadline_hours: i64,
    pub default_buffer_target: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            token_signing_secret: env::var("TOKEN_SIGNING_SECRET")
                .context("TOKEN_SIGNING_SECRET must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "hireflow".to_string()),
            frontend_base_url: env::var("FRONTEND_BASE_URL").ok(),
            email_service_url: env::var("EMAIL_SERVICE_URL")
                .context("EMAIL_SERVICE_URL must be set")?,
            calendar_service_url: env::var("CALENDAR_SERVICE_URL")
                .context("CALENDAR_SERVICE_URL must be set")?,
            risk_service_url: env::var("RISK_SERVICE_URL")
                .context("RISK_SERVICE_URL must be set")?,
            scoring_service_url: env::var("SCORING_SERVICE_URL")
                .context("SCORING_SERVICE_URL must be set")?,
            llm_service_url: env::var("LLM_SERVICE_URL").ok(),
            email_timeout: duration_secs("EMAIL_TIMEOUT_SECONDS", 5)?,
            calendar_timeout: duration_secs("CALENDAR_TIMEOUT_SECONDS", 10)?,
            risk_timeout: duration_secs("RISK_TIMEOUT_SECONDS", 5)?,
            scoring_timeout: duration_secs("SCORING_TIMEOUT_SECONDS", 30)?,
            llm_timeout: duration_secs("LLM_TIMEOUT_SECONDS", 10)?,
            cycle_period: duration_secs("CYCLE_SECONDS", 300)?,
            confirmation_deadline_hours: int_var("CONFIRMATION_DEADLINE_HOURS", 48)?,
            slot_selection_deadline_hours: int_var("SLOT_SELECTION_DEADLINE_HOURS", 24)?,
            default_buffer_target: int_var("DEFAULT_BUFFER_TARGET", 3)? as i32,
        })
    }
}

fn duration_secs(name: &str, default: u64) -> Result<Duration> {
    let secs = match env::var(name) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{} must be a valid number of seconds", name))?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}

fn int_var(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{} must be a valid integer", name)),
        Err(_) => Ok(default),
    }
}
