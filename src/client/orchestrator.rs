// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Contact-update orchestrator.
//!
//! Owns one profile-edit draft and the two verification channels. A changed
//! email or mobile must reach `Verified` on its own channel before the draft
//! can be committed. Editing a field back to its snapshot value drops it out
//! of verification entirely.

use crate::client::action::ActionTracker;
use crate::client::error::{ClientError, ValidationError};
use crate::client::ports::IdentityApi;
use crate::client::sync::SyncStore;
use crate::client::verification::{
    ChannelKind, ChannelState, EmailChannel, MobileChannel, Pending, Verified,
};
use crate::models::user::{is_valid_mobile, normalize_email};
use crate::models::{ProfileUpdate, UserIdentity};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where one sensitive field stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Same as the committed value.
    Unchanged,
    /// Changed; carries the channel's progress for the current value.
    Editing(ChannelState),
}

/// Committed snapshot plus the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEditDraft {
    pub snapshot: UserIdentity,
    pub name: String,
    pub email: String,
    pub mobile: String,
}

impl ProfileEditDraft {
    fn from_identity(user: UserIdentity) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone().unwrap_or_default(),
            snapshot: user,
        }
    }

    /// Take a fresh snapshot, keeping the user's edits.
    fn rebase(&mut self, user: UserIdentity) {
        if user.mobile.is_some() {
            self.mobile = user.mobile.clone().unwrap_or_default();
        }
        self.snapshot = user;
    }

    fn name_changed(&self) -> bool {
        self.name.trim() != self.snapshot.name
    }

    fn email_changed(&self) -> bool {
        normalize_email(&self.email) != normalize_email(&self.snapshot.email)
    }

    fn mobile_changed(&self) -> bool {
        self.mobile.trim() != self.snapshot.mobile.as_deref().unwrap_or_default()
    }

    pub fn mobile_locked(&self) -> bool {
        self.snapshot.mobile.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Action {
    RequestCode(ChannelKind),
    ConfirmCode(ChannelKind),
    Submit,
}

struct Inner {
    draft: ProfileEditDraft,
    torn_down: bool,
}

/// One profile-edit session.
pub struct ContactUpdate {
    api: Arc<dyn IdentityApi>,
    store: SyncStore,
    mobile: MobileChannel,
    email: EmailChannel,
    actions: ActionTracker<Action>,
    inner: Mutex<Inner>,
}

impl ContactUpdate {
    /// Start editing the signed-in user's profile.
    pub fn begin(
        api: Arc<dyn IdentityApi>,
        store: SyncStore,
        mobile: MobileChannel,
        email: EmailChannel,
    ) -> Result<Self, ClientError> {
        let user = store.current_user().ok_or(ValidationError::NotSignedIn)?;
        mobile.reset();
        email.reset();
        Ok(Self {
            api,
            store,
            mobile,
            email,
            actions: ActionTracker::new(),
            inner: Mutex::new(Inner {
                draft: ProfileEditDraft::from_identity(user),
                torn_down: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn draft(&self) -> ProfileEditDraft {
        self.lock().draft.clone()
    }

    pub fn mobile_channel(&self) -> &MobileChannel {
        &self.mobile
    }

    pub fn email_channel(&self) -> &EmailChannel {
        &self.email
    }

    // ─── Edits ───────────────────────────────────────────────────

    pub fn set_name(&self, name: &str) {
        self.lock().draft.name = name.to_string();
    }

    pub fn set_email(&self, email: &str) {
        self.lock().draft.email = email.to_string();
        let current = normalize_email(email);
        if self.email.target().as_deref() != Some(current.as_str()) {
            self.email.reset();
        }
    }

    /// Edit the mobile number. Only allowed while none is committed.
    pub fn set_mobile(&self, mobile: &str) -> Result<(), ClientError> {
        {
            let mut inner = self.lock();
            if inner.draft.mobile_locked() {
                return Err(ValidationError::MobileLocked.into());
            }
            inner.draft.mobile = mobile.to_string();
        }
        if self.mobile.target().as_deref() != Some(mobile.trim()) {
            self.mobile.reset();
        }
        Ok(())
    }

    // ─── Derived state ───────────────────────────────────────────

    pub fn field_state(&self, kind: ChannelKind) -> FieldState {
        let draft = self.draft();
        let (changed, current, channel_state, verified) = match kind {
            ChannelKind::Email => (
                draft.email_changed(),
                normalize_email(&draft.email),
                self.email.state(),
                self.email.verified_target(),
            ),
            ChannelKind::Mobile => (
                draft.mobile_changed(),
                draft.mobile.trim().to_string(),
                self.mobile.state(),
                self.mobile.verified_target(),
            ),
        };
        if !changed {
            return FieldState::Unchanged;
        }
        match channel_state {
            ChannelState::Verified if verified.as_deref() == Some(current.as_str()) => {
                FieldState::Editing(ChannelState::Verified)
            }
            ChannelState::Verified => FieldState::Editing(ChannelState::Unstarted),
            other => FieldState::Editing(other),
        }
    }

    pub fn is_dirty(&self) -> bool {
        let draft = self.draft();
        draft.name_changed() || draft.email_changed() || draft.mobile_changed()
    }

    /// Why the draft cannot be submitted, or `Ok` when it can.
    pub fn check_submittable(&self) -> Result<(), ValidationError> {
        let draft = self.draft();
        if draft.name.trim().is_empty() {
            return Err(ValidationError::NameRequired);
        }
        if !self.is_dirty() {
            return Err(ValidationError::NoChanges);
        }
        for kind in [ChannelKind::Mobile, ChannelKind::Email] {
            if let FieldState::Editing(state) = self.field_state(kind) {
                if state != ChannelState::Verified {
                    return Err(ValidationError::VerificationRequired(kind));
                }
            }
        }
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        self.check_submittable().is_ok()
    }

    pub fn is_pending(&self, kind: ChannelKind) -> bool {
        self.actions.is_pending(&Action::RequestCode(kind))
            || self.actions.is_pending(&Action::ConfirmCode(kind))
    }

    pub fn is_submitting(&self) -> bool {
        self.actions.is_pending(&Action::Submit)
    }

    // ─── Verification ────────────────────────────────────────────

    /// Send a code for the edited value of `kind`.
    pub async fn request_code(&self, kind: ChannelKind) -> Result<Pending, ClientError> {
        let _guard = self.actions.begin(Action::RequestCode(kind))?;
        let result = self.request_code_inner(kind).await;
        self.report(result)
    }

    async fn request_code_inner(&self, kind: ChannelKind) -> Result<Pending, ClientError> {
        let draft = self.draft();
        match kind {
            ChannelKind::Email => {
                if !draft.email_changed() {
                    return Err(ValidationError::NoChanges.into());
                }
                self.email.request_code(&draft.email).await
            }
            ChannelKind::Mobile => {
                if draft.mobile_locked() {
                    return Err(ValidationError::MobileLocked.into());
                }
                let number = draft.mobile.trim();
                if !is_valid_mobile(number) {
                    return Err(ValidationError::InvalidMobile.into());
                }
                if !self.api.check_mobile(number).await? {
                    return Err(ValidationError::MobileInUse.into());
                }
                self.ensure_live()?;
                if self.draft().mobile.trim() != number {
                    return Err(ClientError::Superseded);
                }
                self.mobile.request_code(number).await
            }
        }
    }

    pub async fn confirm_code(&self, kind: ChannelKind, code: &str) -> Result<Verified, ClientError> {
        let _guard = self.actions.begin(Action::ConfirmCode(kind))?;
        let result = match kind {
            ChannelKind::Email => self.email.confirm_code(code).await,
            ChannelKind::Mobile => self.mobile.confirm_code(code).await,
        };
        self.report(result)
    }

    /// Abandon verification of `kind`: the field goes back to its snapshot.
    pub fn cancel(&self, kind: ChannelKind) {
        {
            let mut inner = self.lock();
            let draft = &mut inner.draft;
            match kind {
                ChannelKind::Email => draft.email = draft.snapshot.email.clone(),
                ChannelKind::Mobile => {
                    draft.mobile = draft.snapshot.mobile.clone().unwrap_or_default()
                }
            }
        }
        match kind {
            ChannelKind::Email => self.email.reset(),
            ChannelKind::Mobile => self.mobile.reset(),
        }
    }

    // ─── Commit ──────────────────────────────────────────────────

    /// Commit the whole draft in one call.
    pub async fn submit(&self) -> Result<UserIdentity, ClientError> {
        let _guard = self.actions.begin(Action::Submit)?;
        self.check_submittable()?;

        let draft = self.draft();
        let update = ProfileUpdate {
            name: draft.name.trim().to_string(),
            email: normalize_email(&draft.email),
            mobile: if draft.mobile_changed() {
                Some(draft.mobile.trim().to_string())
            } else {
                draft.snapshot.mobile.clone()
            },
        };

        match self.api.update_profile(&update).await {
            Ok(user) => {
                self.ensure_live()?;
                self.store.set_identity(user.clone());
                self.lock().draft = ProfileEditDraft::from_identity(user.clone());
                self.mobile.reset();
                self.email.reset();
                tracing::info!(user_id = %user.id, "Profile updated");
                Ok(user)
            }
            Err(err) => {
                self.ensure_live()?;
                self.store.notify_error(&err);
                if err.needs_refetch() {
                    self.refresh_snapshot().await;
                }
                Err(err)
            }
        }
    }

    /// Re-read the profile after a rejected commit. Edits are kept.
    async fn refresh_snapshot(&self) {
        match self.api.profile().await {
            Ok(user) => {
                if self.ensure_live().is_err() {
                    return;
                }
                self.store.set_identity(user.clone());
                self.lock().draft.rebase(user);
            }
            Err(e) => tracing::warn!(error = %e, "Profile refetch failed"),
        }
    }

    /// The view is closing. Timers stop and late responses are ignored.
    pub fn teardown(&self) {
        self.lock().torn_down = true;
        self.mobile.teardown();
        self.email.teardown();
    }

    fn ensure_live(&self) -> Result<(), ClientError> {
        if self.lock().torn_down {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Validation errors stay inline; everything else becomes a notice.
    fn report<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(err) = &result {
            if !matches!(err, ClientError::Validation(_)) && self.ensure_live().is_ok() {
                self.store.notify_error(err);
            }
        }
        result
    }
}
