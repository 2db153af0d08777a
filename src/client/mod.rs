// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client core.
//!
//! `ClientContext` wires one `ApiClient` and one `SyncStore` into the
//! components. Components never talk to each other directly; they read and
//! write committed state through the store.

pub mod action;
pub mod admin_view;
pub mod api;
pub mod booking_form;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod refunds;
pub mod sync;
pub mod verification;

pub use action::{ActionGuard, ActionTracker};
pub use admin_view::{AdminTab, AdminUserView, Page, TabCounts};
pub use api::ApiClient;
pub use booking_form::BookingForm;
pub use error::{ClientError, ProviderError, ValidationError};
pub use orchestrator::{ContactUpdate, FieldState, ProfileEditDraft};
pub use refunds::{DeletePrompt, RefundQuery, RefundStore, SortOrder};
pub use sync::{Cached, Notice, SyncStore};
pub use verification::{
    Channel, ChannelKind, ChannelState, EmailChannel, MobileChannel, PhoneAuthProvider,
};

use crate::config::ClientConfig;
use crate::models::{Review, UserIdentity};
use ports::{BookingApi, IdentityApi};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub store: SyncStore,
}

impl ClientContext {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(ApiClient::new(&config)?);
        Ok(Self {
            config,
            api,
            store: SyncStore::new(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserIdentity, ClientError> {
        let user = self.api.login(email, password).await?;
        self.store.set_identity(user.clone());
        Ok(user)
    }

    pub async fn google_sign_in(&self, credential: &str) -> Result<UserIdentity, ClientError> {
        let user = self.api.google_sign_in(credential).await?;
        self.store.set_identity(user.clone());
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.api.logout().await;
        self.store.clear_session();
        result
    }

    /// Authoritative profile read.
    pub async fn refresh_profile(&self) -> Result<UserIdentity, ClientError> {
        let user = self.api.profile().await?;
        self.store.set_identity(user.clone());
        Ok(user)
    }

    pub async fn load_testimonials(&self) -> Result<Vec<Review>, ClientError> {
        let reviews = self.api.reviews().await?;
        self.store.set_testimonials(reviews.clone());
        Ok(reviews)
    }

    /// Start a profile edit with fresh channels.
    pub fn contact_update(
        &self,
        phone: Arc<dyn PhoneAuthProvider>,
    ) -> Result<ContactUpdate, ClientError> {
        let api: Arc<ApiClient> = Arc::clone(&self.api);
        ContactUpdate::begin(
            api.clone(),
            self.store.clone(),
            MobileChannel::mobile(phone, &self.config),
            EmailChannel::email(api, &self.config),
        )
    }

    pub async fn booking_form(&self) -> Result<BookingForm, ClientError> {
        BookingForm::load(self.api.as_ref(), &self.store).await
    }

    pub fn refunds(&self) -> RefundStore {
        RefundStore::new(self.api.clone(), self.store.clone())
    }

    pub fn admin_user(&self, user_id: Uuid) -> AdminUserView {
        AdminUserView::new(self.api.clone(), self.store.clone(), user_id)
    }
}
