// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refund request aggregate with its append-only status timeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

/// Refund status. `Refunded` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RefundStatus {
    Initiated,
    Processing,
    #[serde(alias = "approved")]
    Refunded,
    Rejected,
    /// Any status string this build does not know about.
    #[serde(other)]
    Unknown,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Initiated => "initiated",
            RefundStatus::Processing => "processing",
            RefundStatus::Refunded => "refunded",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RefundStatus::Refunded | RefundStatus::Rejected)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Initiated, Processing)
                | (Processing, Refunded)
                | (Initiated, Rejected)
                | (Processing, Rejected)
        )
    }

    /// Owners may withdraw a request only before the gateway picks it up.
    pub fn is_withdrawable(&self) -> bool {
        *self == RefundStatus::Initiated
    }

    /// Label and tone used by both the owner and admin views.
    pub fn badge(&self) -> StatusBadge {
        let (label, tone) = match self {
            RefundStatus::Initiated => ("Initiated", Tone::Amber),
            RefundStatus::Processing => ("Processing", Tone::Blue),
            RefundStatus::Refunded => ("Refunded", Tone::Green),
            RefundStatus::Rejected => ("Rejected", Tone::Red),
            RefundStatus::Unknown => ("Unknown", Tone::Gray),
        };
        StatusBadge { label, tone }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Tone {
    Amber,
    Blue,
    Green,
    Red,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: Tone,
}

/// One status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: RefundStatus,
    pub date: DateTime<Utc>,
}

/// Timeline entry projected for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TimelineView {
    pub status: RefundStatus,
    pub label: &'static str,
    pub tone: Tone,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: DateTime<Utc>,
}

impl From<&TimelineEntry> for TimelineView {
    fn from(entry: &TimelineEntry) -> Self {
        let badge = entry.status.badge();
        Self {
            status: entry.status,
            label: badge.label,
            tone: badge.tone,
            date: entry.date,
        }
    }
}

/// Errors from an attempted status transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("refund is already {0}")]
    Terminal(RefundStatus),

    #[error("cannot move refund from {from} to {to}")]
    Illegal {
        from: RefundStatus,
        to: RefundStatus,
    },
}

/// A refund request. The status is always the last timeline entry's status,
/// so it is derived rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RefundRecord", into = "RefundRecord")]
pub struct RefundRequest {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    amount: u64,
    reason: String,
    timeline: Vec<TimelineEntry>,
    provider_refund_id: Option<String>,
}

impl RefundRequest {
    /// Open a new request in `initiated`.
    pub fn initiate(
        booking_id: Uuid,
        user_id: Uuid,
        amount: u64,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            user_id,
            amount,
            reason: reason.into(),
            timeline: vec![TimelineEntry {
                status: RefundStatus::Initiated,
                date: at,
            }],
            provider_refund_id: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn booking_id(&self) -> Uuid {
        self.booking_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn provider_refund_id(&self) -> Option<&str> {
        self.provider_refund_id.as_deref()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn status(&self) -> RefundStatus {
        self.timeline
            .last()
            .map(|entry| entry.status)
            .unwrap_or(RefundStatus::Unknown)
    }

    pub fn initiated_at(&self) -> DateTime<Utc> {
        self.timeline
            .first()
            .map(|entry| entry.date)
            .unwrap_or_default()
    }

    /// Calendar date the request was initiated, in the given offset.
    pub fn initiated_on(&self, offset: &chrono::FixedOffset) -> NaiveDate {
        self.initiated_at().with_timezone(offset).date_naive()
    }

    pub fn badge(&self) -> StatusBadge {
        self.status().badge()
    }

    /// Timeline projected for display, oldest first.
    pub fn timeline_view(&self) -> Vec<TimelineView> {
        self.timeline.iter().map(TimelineView::from).collect()
    }

    /// Append a transition. Re-applying the current status is a no-op and
    /// returns `Ok(false)`.
    pub(crate) fn record_transition(
        &mut self,
        next: RefundStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        let current = self.status();
        if current == next {
            return Ok(false);
        }
        if current.is_terminal() {
            return Err(TransitionError::Terminal(current));
        }
        if !current.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: current,
                to: next,
            });
        }

        let last = self.timeline.last().map(|entry| entry.date).unwrap_or(at);
        self.timeline.push(TimelineEntry {
            status: next,
            date: at.max(last),
        });
        Ok(true)
    }

    pub(crate) fn set_provider_refund_id(&mut self, provider_refund_id: String) {
        self.provider_refund_id = Some(provider_refund_id);
    }
}

/// Wire representation, including the redundant `status` and `initiatedAt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundRecord {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    amount: u64,
    reason: String,
    status: RefundStatus,
    timeline: Vec<TimelineEntry>,
    provider_refund_id: Option<String>,
    #[serde(default)]
    initiated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RefundRecordError {
    #[error("refund timeline is empty")]
    EmptyTimeline,

    #[error("refund status {status} does not match last timeline entry {last}")]
    StatusMismatch {
        status: RefundStatus,
        last: RefundStatus,
    },

    #[error("refund timeline is not ordered oldest first")]
    Unordered,
}

impl TryFrom<RefundRecord> for RefundRequest {
    type Error = RefundRecordError;

    fn try_from(record: RefundRecord) -> Result<Self, Self::Error> {
        let last = record
            .timeline
            .last()
            .ok_or(RefundRecordError::EmptyTimeline)?
            .status;

        if last != record.status {
            return Err(RefundRecordError::StatusMismatch {
                status: record.status,
                last,
            });
        }

        if record.timeline.windows(2).any(|w| w[0].date > w[1].date) {
            return Err(RefundRecordError::Unordered);
        }

        Ok(Self {
            id: record.id,
            booking_id: record.booking_id,
            user_id: record.user_id,
            amount: record.amount,
            reason: record.reason,
            timeline: record.timeline,
            provider_refund_id: record.provider_refund_id,
        })
    }
}

impl From<RefundRequest> for RefundRecord {
    fn from(request: RefundRequest) -> Self {
        let status = request.status();
        let initiated_at = Some(request.initiated_at());
        Self {
            id: request.id,
            booking_id: request.booking_id,
            user_id: request.user_id,
            amount: request.amount,
            reason: request.reason,
            status,
            timeline: request.timeline,
            provider_refund_id: request.provider_refund_id,
            initiated_at,
        }
    }
}

/// Body of `POST refunds`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundCreateRequest {
    pub booking_id: Uuid,
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> RefundRequest {
        RefundRequest::initiate(Uuid::new_v4(), Uuid::new_v4(), 500, "Plans changed", Utc::now())
    }

    #[test]
    fn status_tracks_last_timeline_entry() {
        let mut refund = sample();
        assert_eq!(refund.status(), RefundStatus::Initiated);

        let later = Utc::now() + Duration::minutes(5);
        assert!(refund.record_transition(RefundStatus::Processing, later).unwrap());
        assert_eq!(refund.status(), RefundStatus::Processing);
        assert_eq!(refund.timeline().len(), 2);

        assert!(refund.record_transition(RefundStatus::Refunded, later).unwrap());
        assert_eq!(refund.status(), refund.timeline().last().unwrap().status);
    }

    #[test]
    fn replaying_current_status_is_noop() {
        let mut refund = sample();
        assert!(!refund
            .record_transition(RefundStatus::Initiated, Utc::now())
            .unwrap());
        assert_eq!(refund.timeline().len(), 1);
    }

    #[test]
    fn refunded_is_terminal() {
        let mut refund = sample();
        refund
            .record_transition(RefundStatus::Processing, Utc::now())
            .unwrap();
        refund
            .record_transition(RefundStatus::Refunded, Utc::now())
            .unwrap();

        let err = refund
            .record_transition(RefundStatus::Rejected, Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::Terminal(RefundStatus::Refunded));
        assert_eq!(refund.timeline().len(), 3);
    }

    #[test]
    fn cannot_skip_processing() {
        let mut refund = sample();
        let err = refund
            .record_transition(RefundStatus::Refunded, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { .. }));
    }

    #[test]
    fn badge_mapping() {
        assert_eq!(RefundStatus::Initiated.badge().tone, Tone::Amber);
        assert_eq!(RefundStatus::Processing.badge().tone, Tone::Blue);
        assert_eq!(RefundStatus::Refunded.badge().tone, Tone::Green);
        assert_eq!(RefundStatus::Rejected.badge().tone, Tone::Red);
        assert_eq!(RefundStatus::Unknown.badge().tone, Tone::Gray);

        let approved: RefundStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(approved.badge().tone, Tone::Green);
        let odd: RefundStatus = serde_json::from_str("\"on-hold\"").unwrap();
        assert_eq!(odd, RefundStatus::Unknown);
    }

    #[test]
    fn wire_form_includes_status() {
        let refund = sample();
        let json = serde_json::to_value(&refund).unwrap();
        assert_eq!(json["status"], "initiated");
        assert!(json.get("initiatedAt").is_some());

        let back: RefundRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, refund);
    }

    #[test]
    fn rejects_status_timeline_mismatch() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["status"] = serde_json::json!("refunded");
        let err = serde_json::from_value::<RefundRequest>(json).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn rejects_empty_timeline() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["timeline"] = serde_json::json!([]);
        assert!(serde_json::from_value::<RefundRequest>(json).is_err());
    }
}
