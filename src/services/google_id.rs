// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Verification of Google Sign-In ID tokens.
//!
//! The browser obtains an ID token from Google and posts it to
//! `/api/user/auth/google`. We check the RS256 signature against Google's
//! published keys, then the issuer, audience (our OAuth client ID) and
//! `email_verified`.

use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GoogleIdError {
    /// Token is malformed, expired, or asserts the wrong thing.
    #[error("invalid Google credential: {0}")]
    Rejected(String),
    /// Google's key endpoint could not be reached or returned garbage.
    #[error("Google key service unavailable: {0}")]
    KeysUnavailable(String),
}

enum KeySource {
    Google {
        http: reqwest::Client,
        cache: RwLock<Option<KeySet>>,
        refresh_lock: Mutex<()>,
    },
    Static {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

struct KeySet {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    fetched_until: Instant,
}

/// Checks ID tokens issued to one OAuth client.
pub struct GoogleIdVerifier {
    client_id: String,
    keys: KeySource,
}

impl GoogleIdVerifier {
    /// Verifier that fetches and caches Google's signing keys.
    pub fn new(client_id: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Google key HTTP client")?;

        let client_id = client_id.into();
        tracing::info!(client_id = %client_id, "Google sign-in enabled");

        Ok(Self {
            client_id,
            keys: KeySource::Google {
                http,
                cache: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            },
        })
    }

    /// Verifier pinned to a single RSA key, for tests.
    pub fn new_with_static_key(
        client_id: impl Into<String>,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key id must not be empty");
        }
        Ok(Self {
            client_id: client_id.into(),
            keys: KeySource::Static {
                kid,
                key: Arc::new(key),
            },
        })
    }

    pub async fn verify_id_token(&self, token: &str) -> Result<GoogleIdentity, GoogleIdError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GoogleIdError::Rejected("empty credential".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| GoogleIdError::Rejected(format!("bad header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(GoogleIdError::Rejected(format!(
                "unexpected alg {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| GoogleIdError::Rejected("missing kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(token, key.as_ref(), &validation)
            .map_err(|e| GoogleIdError::Rejected(e.to_string()))?
            .claims;

        check_issued_at(claims.iat)?;

        if claims.email_verified != Some(true) {
            return Err(GoogleIdError::Rejected(
                "email address is not verified".to_string(),
            ));
        }
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| GoogleIdError::Rejected("missing email".to_string()))?;

        tracing::debug!(subject = %claims.sub, "Google ID token verified");

        Ok(GoogleIdentity {
            subject: claims.sub,
            email,
            name: claims.name,
        })
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, GoogleIdError> {
        let (http, cache, refresh_lock) = match &self.keys {
            KeySource::Static { kid: pinned, key } => {
                return if kid == pinned {
                    Ok(key.clone())
                } else {
                    Err(GoogleIdError::Rejected(format!("unknown kid {kid}")))
                };
            }
            KeySource::Google {
                http,
                cache,
                refresh_lock,
            } => (http, cache, refresh_lock),
        };

        if let Some(key) = cached_key(cache, kid).await {
            return Ok(key);
        }

        // Keys rotate; one forced refetch covers a kid we have not seen yet.
        let _guard = refresh_lock.lock().await;
        if let Some(key) = cached_key(cache, kid).await {
            return Ok(key);
        }
        let fresh = fetch_keys(http).await?;
        let found = fresh.by_kid.get(kid).cloned();
        *cache.write().await = Some(fresh);

        found.ok_or_else(|| GoogleIdError::Rejected(format!("unknown kid {kid}")))
    }
}

async fn cached_key(cache: &RwLock<Option<KeySet>>, kid: &str) -> Option<Arc<DecodingKey>> {
    let now = Instant::now();
    cache
        .read()
        .await
        .as_ref()
        .filter(|set| set.fetched_until > now)
        .and_then(|set| set.by_kid.get(kid).cloned())
}

async fn fetch_keys(http: &reqwest::Client) -> Result<KeySet, GoogleIdError> {
    let response = http
        .get(GOOGLE_CERTS_URL)
        .send()
        .await
        .map_err(|e| GoogleIdError::KeysUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(GoogleIdError::KeysUnavailable(format!(
            "status {}",
            response.status()
        )));
    }

    let ttl = max_age(response.headers()).unwrap_or(FALLBACK_KEY_TTL);
    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| GoogleIdError::KeysUnavailable(format!("bad JWKS body: {e}")))?;

    let by_kid: HashMap<_, _> = jwks
        .keys
        .into_iter()
        .filter(|k| k.kty == "RSA" && !k.kid.is_empty())
        .filter(|k| k.alg.as_deref().is_none_or(|a| a == "RS256"))
        .filter_map(|k| match DecodingKey::from_rsa_components(&k.n, &k.e) {
            Ok(key) => Some((k.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %k.kid, "Skipping unusable Google key");
                None
            }
        })
        .collect();

    if by_kid.is_empty() {
        return Err(GoogleIdError::KeysUnavailable(
            "no usable RSA keys".to_string(),
        ));
    }

    tracing::debug!(keys = by_kid.len(), ttl_secs = ttl.as_secs(), "Google keys refreshed");
    Ok(KeySet {
        by_kid,
        fetched_until: Instant::now() + ttl,
    })
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

fn check_issued_at(iat: Option<u64>) -> Result<(), GoogleIdError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    match iat {
        None => Err(GoogleIdError::Rejected("missing iat".to_string())),
        Some(iat) if iat > now + CLOCK_SKEW_SECS => {
            Err(GoogleIdError::Rejected("issued in the future".to_string()))
        }
        Some(_) => Ok(()),
    }
}

fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_max_age)
        .map(Duration::from_secs)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}
