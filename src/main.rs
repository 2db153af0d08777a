// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Homestay API server (server of record).

use chrono::Utc;
use homestay::{
    config::Config,
    db::{MemoryDb, StoredUser},
    models::{AuthProvider, Role, UserIdentity},
    services::{credentials::hash_password, GoogleIdVerifier, LogMailer, Mailer, OtpService, SmtpMailer},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Homestay API");

    let db = MemoryDb::new(config.initial_rate_card);
    seed_admin(&db, &config)?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set, verification codes will only be logged");
            Arc::new(LogMailer)
        }
    };
    let otp = OtpService::new(mailer, config.otp_ttl, config.otp_resend_cooldown);

    let google = match &config.google_client_id {
        Some(client_id) => Some(Arc::new(GoogleIdVerifier::new(client_id.clone())?)),
        None => {
            tracing::info!("GOOGLE_CLIENT_ID not set, Google sign-in disabled");
            None
        }
    };

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        otp,
        google,
    });

    // Build router
    let app = homestay::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the configured administrator unless the email is already taken.
fn seed_admin(db: &MemoryDb, config: &Config) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, no administrator account");
        return Ok(());
    };
    if db.find_by_email(email).is_some() {
        return Ok(());
    }

    db.insert_user(StoredUser {
        identity: UserIdentity {
            id: Uuid::new_v4(),
            name: "Administrator".to_string(),
            email: email.trim().to_ascii_lowercase(),
            mobile: None,
            role: Role::Admin,
            blocked: false,
            provider: AuthProvider::Local,
            created_at: Utc::now(),
        },
        password_hash: Some(hash_password(password)?),
        google_subject: None,
    })?;
    tracing::info!(email = %email, "Administrator account seeded");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("homestay=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
