use std::env;

use crate::constants::DEFAULT_MAX_FREE_ALIASES;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    /// Shared token the mail provider presents on the inbound webhook
    pub inbound_token: String,
    /// Enables `/admin/stats` when set
    pub admin_secret_key: Option<String>,
    /// System relay domains; the first entry is the default for new subdomains and aliases
    pub relay_domains: Vec<String>,
    pub max_free_aliases: i64,
    /// Emit DNS identity jobs for subdomains
    pub provisioning_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let allowed_origins = split_list(
            &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        );

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let inbound_token = env::var("INBOUND_TOKEN")
            .map_err(|_| "INBOUND_TOKEN must be set for the inbound webhook")?;
        if inbound_token.is_empty() {
            return Err("INBOUND_TOKEN must not be empty".to_string());
        }

        let admin_secret_key = env::var("ADMIN_SECRET_KEY").ok().filter(|k| !k.is_empty());

        let relay_domains: Vec<String> = split_list(
            &env::var("RELAY_DOMAINS").unwrap_or_else(|_| "relay.example".to_string()),
        )
        .into_iter()
        .map(|d| d.to_lowercase())
        .collect();
        if relay_domains.is_empty() {
            return Err("RELAY_DOMAINS must name at least one domain".to_string());
        }

        let max_free_aliases = env::var("MAX_FREE_ALIASES")
            .unwrap_or_else(|_| DEFAULT_MAX_FREE_ALIASES.to_string())
            .parse()
            .map_err(|_| "Invalid MAX_FREE_ALIASES")?;

        let provisioning_enabled = parse_flag(
            &env::var("PROVISIONING_ENABLED").unwrap_or_else(|_| "false".to_string()),
        )
        .ok_or("Invalid PROVISIONING_ENABLED")?;

        Ok(Config {
            server_host,
            server_port,
            database_url,
            allowed_origins,
            environment,
            inbound_token,
            admin_secret_key,
            relay_domains,
            max_free_aliases,
            provisioning_enabled,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Domain used when a request does not name one
    pub fn default_domain(&self) -> &str {
        self.relay_domains
            .first()
            .map(String::as_str)
            .unwrap_or("relay.example")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
