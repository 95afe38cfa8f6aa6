/*
 * Copyright 2023, Sayan Nandan <nandansayan@outlook.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

//! # Errors
//!
//! This module contains error types that the client returns in different cases.
//!
//! Errors raised while *building* a batch ([`Error::Argument`], [`Error::ValueFormat`]) are
//! always returned synchronously and abort the whole batch. Errors that happen while a
//! streaming query is in flight are recorded into the [`MultiResult`](crate::MultiResult)
//! and only surface when the caller synchronizes.

use {crate::status::StatusCode, thiserror::Error};

/// A result type alias for client operations
pub type ClientResult<T> = Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
/// A standard error type for the client
pub enum Error {
    /// Malformed caller input: bad or empty batch containers, lying iterators, missing or
    /// invalid CAS/TTL values
    #[error("argument error: {message}{}", fmt_obj(.obj))]
    Argument {
        message: String,
        obj: Option<String>,
    },
    /// A key or value failed to encode (or a key encoded to nothing)
    #[error("value format error: {message}{}", fmt_obj(.obj))]
    ValueFormat {
        message: String,
        obj: Option<String>,
    },
    /// The native library returned a nonzero status
    #[error("{rc} [{context}]")]
    Status { rc: StatusCode, context: String },
    /// A query completed with an HTTP level failure
    #[error("HTTP request failed with status {http_status} ({rc})")]
    Http {
        rc: StatusCode,
        http_status: u16,
        value: Option<serde_json::Value>,
    },
    /// A row or body sent by the server could not be decoded
    #[error("JSON decode error: {0}")]
    Json(String),
    /// The connection that owns this result was dropped
    #[error("the parent connection has been dropped")]
    Disconnected,
    /// The connection was used from within one of its own callbacks
    #[error("the connection is busy processing I/O")]
    Busy,
}

fn fmt_obj(obj: &Option<String>) -> String {
    match obj {
        Some(o) => format!(" (object: {})", o),
        None => String::new(),
    }
}

impl Error {
    pub fn argument(message: impl Into<String>, obj: Option<String>) -> Self {
        Self::Argument {
            message: message.into(),
            obj,
        }
    }
    pub fn value_format(message: impl Into<String>, obj: Option<String>) -> Self {
        Self::ValueFormat {
            message: message.into(),
            obj,
        }
    }
    pub fn status(rc: StatusCode, context: impl Into<String>) -> Self {
        Self::Status {
            rc,
            context: context.into(),
        }
    }
    /// Returns the native status code carried by this error, if any
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { rc, .. } | Self::Http { rc, .. } => Some(*rc),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

#[test]
fn t_error_display() {
    let e = Error::argument("No items in container", Some("[]".into()));
    assert_eq!(
        e.to_string(),
        "argument error: No items in container (object: [])"
    );
    let e = Error::status(StatusCode::KeyNotFound, "user:1");
    assert_eq!(e.to_string(), "Status: 0x0D (key not found) [user:1]");
    assert_eq!(e.status_code(), Some(StatusCode::KeyNotFound));
}
