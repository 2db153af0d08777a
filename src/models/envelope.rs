// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Uniform `{success, message|error, data}` response envelope.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Envelope wrapping every API response body.
///
/// `code` is a machine-readable error code added alongside the human
/// readable `error`; clients that only read `success`/`error` are unaffected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Successful response carrying data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            error: None,
            code: None,
            data: Some(data),
        }
    }

    /// Successful response carrying data and a message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    /// Human readable failure text, preferring `error` over `message`.
    pub fn failure_text(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Request failed".to_string())
    }
}

impl ApiEnvelope<()> {
    /// Successful response with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            code: None,
            data: None,
        }
    }

    /// Failed response.
    pub fn failure(error: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            code: code.map(str::to_string),
            data: None,
        }
    }
}
