//! Configuration loaded from environment variables.
//!
//! `Config` drives the server of record; `ClientConfig` drives the client
//! core (API base URL, cooldowns, timeouts).

use crate::models::AccommodationRateCard;
use std::env;
use std::time::Duration;

/// Server configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL, allowed by CORS and used to decide cookie `Secure`
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session cookies (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret for payment gateway webhook signatures
    pub gateway_webhook_secret: Vec<u8>,
    /// Google OAuth client ID (ID token audience); Google sign-in is
    /// disabled when unset
    pub google_client_id: Option<String>,
    /// SMTP settings; codes are only logged when unset
    pub smtp: Option<SmtpConfig>,
    /// How long an emailed code stays valid
    pub otp_ttl: Duration,
    /// Minimum gap between two codes for the same email
    pub otp_resend_cooldown: Duration,
    /// Rate card served until an administrator changes it
    pub initial_rate_card: AccommodationRateCard,
    /// Administrator account seeded at startup
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587),
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_address: env::var("SMTP_FROM")
                    .map_err(|_| ConfigError::Missing("SMTP_FROM"))?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            gateway_webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GATEWAY_WEBHOOK_SECRET"))?
                .into_bytes(),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            smtp,
            otp_ttl: Duration::from_secs(parse_or("OTP_TTL_SECS", 300)),
            otp_resend_cooldown: Duration::from_secs(parse_or("OTP_RESEND_COOLDOWN_SECS", 30)),
            initial_rate_card: AccommodationRateCard {
                veg_rate: parse_or("VEG_RATE", 150),
                non_veg_rate: parse_or("NON_VEG_RATE", 250),
                price_per_night: parse_or("PRICE_PER_NIGHT", 500),
            },
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            gateway_webhook_secret: b"test_gateway_secret".to_vec(),
            google_client_id: Some("test-client.apps.googleusercontent.com".to_string()),
            smtp: None,
            otp_ttl: Duration::from_secs(300),
            otp_resend_cooldown: Duration::from_secs(30),
            initial_rate_card: AccommodationRateCard {
                veg_rate: 150,
                non_veg_rate: 250,
                price_per_night: 500,
            },
            admin_email: None,
            admin_password: None,
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Client core configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://api.example.com`
    pub api_base_url: String,
    /// Cooldown before another code may be requested on a channel
    pub resend_cooldown: Duration,
    /// Upper bound on any phone-auth provider call
    pub provider_timeout: Duration,
    /// Upper bound on any API call
    pub request_timeout: Duration,
    /// Prefix turning a 10-digit mobile number into E.164
    pub phone_country_code: String,
    /// Web API key for the phone-auth provider
    pub firebase_api_key: Option<String>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_base_url: env::var("HOMESTAY_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("HOMESTAY_API_URL"))?,
            resend_cooldown: Duration::from_secs(parse_or("RESEND_COOLDOWN_SECS", 30)),
            provider_timeout: Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 15)),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 20)),
            phone_country_code: env::var("PHONE_COUNTRY_CODE").unwrap_or_else(|_| "+91".to_string()),
            firebase_api_key: env::var("FIREBASE_API_KEY").ok(),
        })
    }

    pub fn test_default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            resend_cooldown: Duration::from_secs(30),
            provider_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            phone_country_code: "+91".to_string(),
            firebase_api_key: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
