//! Runtime configuration: command-line flags with environment fallbacks.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use tasklane_adapters::weather::DEFAULT_WEATHER_API_BASE;
use tasklane_adapters::{SmtpConfig, SmtpMailer, WeatherClient, WeatherConfig};
use tasklane_cache::{Cache, CacheBackend, CacheConfig};
use tasklane_db::{DbConfig, SqliteDatabase};
use tasklane_service::{AuthConfig, AuthService, TaskService};
use tasklane_store::StoreConfig;

use crate::routes::{AppState, InnerAppState};

const DEV_JWT_SECRET: &str = "tasklane-dev-secret-change-me";
/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 87_600;

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "TASKLANE_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// SQLite file; defaults to the XDG data directory
    #[arg(long, env = "TASKLANE_DB_PATH")]
    pub db_path: Option<String>,

    /// Root directory for uploaded attachments
    #[arg(long, env = "TASKLANE_UPLOAD_DIR")]
    pub upload_dir: Option<String>,

    /// redis, memory or disabled
    #[arg(long, env = "CACHE_BACKEND", default_value = "redis")]
    pub cache_backend: CacheBackend,

    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    pub redis_url: String,

    /// Cache entry lifetime in seconds
    #[arg(long, env = "CACHE_TTL", default_value_t = tasklane_cache::DEFAULT_TTL_SECS)]
    pub cache_ttl: u64,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime, 1 to 87600 hours
    #[arg(
        long,
        env = "TOKEN_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_HOURS)
    )]
    pub token_ttl_hours: i64,

    /// Put task, attachment, cache, email and weather routes behind bearer auth
    #[arg(long, env = "TASKLANE_REQUIRE_AUTH")]
    pub require_auth: bool,

    /// SMTP host; email is disabled when unset
    #[arg(long, env = "EMAIL_HOST")]
    pub email_host: Option<String>,

    #[arg(long, env = "EMAIL_PORT", default_value_t = tasklane_adapters::email::DEFAULT_SMTP_PORT)]
    pub email_port: u16,

    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// Send SMTP credentials even when the server does not offer STARTTLS
    #[arg(long, env = "EMAIL_ALLOW_PLAINTEXT_AUTH")]
    pub email_allow_plaintext_auth: bool,

    /// Sender address; defaults to EMAIL_USER
    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Weather API key; the weather route answers 503 when unset
    #[arg(long, env = "WEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    #[arg(long, env = "WEATHER_API_BASE", default_value = DEFAULT_WEATHER_API_BASE)]
    pub weather_api_base: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            backend: self.cache_backend,
            redis_url: self.redis_url.clone(),
            ..CacheConfig::default()
        }
        .with_ttl_secs(self.cache_ttl)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            upload_dir: self.upload_dir.clone(),
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        let secret = match non_empty(&self.jwt_secret) {
            Some(secret) => secret.to_string(),
            None => {
                warn!("JWT_SECRET is not set, falling back to the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        AuthConfig {
            token_ttl: chrono::Duration::hours(self.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS)),
            ..AuthConfig::new(secret)
        }
    }

    /// `None` when no SMTP host is configured.
    pub fn smtp_config(&self) -> Option<SmtpConfig> {
        let host = non_empty(&self.email_host)?;
        let mut config = SmtpConfig::new(host, self.email_port);
        if let (Some(user), Some(password)) = (non_empty(&self.email_user), &self.email_password) {
            config = config.with_credentials(user, password.as_str());
        }
        if let Some(from) = non_empty(&self.email_from) {
            config = config.with_from(from);
        }
        config.allow_plaintext_auth = self.email_allow_plaintext_auth;
        Some(config)
    }

    pub fn weather_config(&self) -> Option<WeatherConfig> {
        let api_key = non_empty(&self.weather_api_key)?;
        Some(WeatherConfig {
            base_url: self.weather_api_base.clone(),
            ..WeatherConfig::new(api_key)
        })
    }
}

/// Open the database, cache and upload store and wire up the services.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let db = Arc::new(
        SqliteDatabase::open(&DbConfig {
            sqlite_path: config.db_path.clone(),
        })
        .context("failed to open database")?,
    );

    let cache_config = config.cache_config();
    let cache = tasklane_cache::connect(&cache_config).await;
    if cache.is_available() {
        info!(backend = cache_config.backend.as_str(), "cache ready");
    } else {
        warn!(
            backend = cache_config.backend.as_str(),
            "cache unavailable, serving every read from the database"
        );
    }

    let store = tasklane_store::create_store(&config.store_config());
    let mut tasks = TaskService::new(db.clone(), cache, store, cache_config.ttl);

    match config.smtp_config() {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "email enabled");
            tasks = tasks.with_mailer(Arc::new(SmtpMailer::new(smtp)));
        }
        None => info!("email disabled (EMAIL_HOST not set)"),
    }

    let weather = match config.weather_config() {
        Some(weather) => {
            Some(WeatherClient::new(weather).context("failed to build weather client")?)
        }
        None => {
            info!("weather disabled (WEATHER_API_KEY not set)");
            None
        }
    };

    let auth = AuthService::new(db, &config.auth_config());

    Ok(Arc::new(InnerAppState {
        tasks,
        auth,
        weather,
        require_auth: config.require_auth,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["tasklane-server"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--bind",
            "127.0.0.1",
            "--port",
            "8080",
            "--cache-backend",
            "memory",
            "--cache-ttl",
            "0",
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8080".parse().unwrap());

        let cache = config.cache_config();
        assert_eq!(cache.backend, CacheBackend::Memory);
        assert_eq!(cache.ttl, Duration::from_secs(1));
    }

    #[test]
    fn unknown_cache_backend_is_rejected() {
        let argv = ["tasklane-server", "--cache-backend", "memcached"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn smtp_needs_a_host() {
        let config = parse(&[
            "--email-host",
            "smtp.example.com",
            "--email-port",
            "2525",
            "--email-user",
            "bot@example.com",
            "--email-password",
            "pw",
        ]);
        let smtp = config.smtp_config().unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.username.as_deref(), Some("bot@example.com"));
        assert_eq!(smtp.from, "bot@example.com");
        assert!(!smtp.allow_plaintext_auth);

        let config = parse(&["--email-host", "localhost", "--email-allow-plaintext-auth"]);
        assert!(config.smtp_config().unwrap().allow_plaintext_auth);

        let config = parse(&["--email-host", "   "]);
        assert!(config.smtp_config().is_none());
    }

    #[test]
    fn weather_uses_configured_base() {
        let config = parse(&[
            "--weather-api-key",
            "k",
            "--weather-api-base",
            "http://localhost:9999",
        ]);
        let weather = config.weather_config().unwrap();
        assert_eq!(weather.api_key, "k");
        assert_eq!(weather.base_url, "http://localhost:9999");
    }

    #[test]
    fn token_ttl_comes_from_hours() {
        let config = parse(&["--jwt-secret", "s3cret", "--token-ttl-hours", "2"]);
        let auth = config.auth_config();
        assert_eq!(auth.jwt_secret, "s3cret");
        assert_eq!(auth.token_ttl, chrono::Duration::hours(2));
    }

    #[test]
    fn token_ttl_out_of_range_is_rejected() {
        for hours in ["0", "-5", "87601", "9223372036854775807"] {
            let argv = ["tasklane-server", "--token-ttl-hours", hours];
            assert!(TestCli::try_parse_from(argv).is_err(), "{hours}");
        }
        let config = parse(&["--token-ttl-hours", "87600"]);
        assert_eq!(config.auth_config().token_ttl, chrono::Duration::hours(87_600));
    }
}
