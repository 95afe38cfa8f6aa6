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

//! Status codes returned by the native library

use {
    crate::error::{ClientResult, Error},
    core::fmt,
};

/// Status codes returned by native submission calls and carried by native responses
///
/// Codes this crate does not know about are preserved in [`StatusCode::Other`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatusCode {
    /// `0x00`: Success
    Success,
    /// `0x02`: Authentication error
    AuthError,
    /// `0x03`: The counter value is not numeric
    DeltaBadval,
    /// `0x04`: Object too big
    TooBig,
    /// `0x05`: Server busy
    ServerBusy,
    /// `0x06`: Internal library error
    Internal,
    /// `0x07`: Invalid arguments
    InvalidArgs,
    /// `0x08`: Server out of memory
    NoMemory,
    /// `0x09`: Invalid range
    Range,
    /// `0x0A`: Generic error
    Generic,
    /// `0x0B`: Temporary failure, retry later
    TempFail,
    /// `0x0C`: The key already exists (or the CAS did not match)
    KeyExists,
    /// `0x0D`: The key does not exist
    KeyNotFound,
    /// `0x10`: Network error
    Network,
    /// `0x12`: The item was not stored
    NotStored,
    /// `0x13`: Operation not supported
    NotSupported,
    /// `0x17`: Operation timed out
    TimedOut,
    /// `0x1C`: Invalid handle
    BadHandle,
    /// `0x35`: An empty key was passed
    EmptyKey,
    /// `0x3B`: The HTTP request failed; see the HTTP status of the response
    HttpError,
    /// A status that this crate has no name for
    Other(u16),
}

impl StatusCode {
    /// Returns true for [`StatusCode::Success`]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
    /// Translate this status code into a result. Any nonzero status becomes an
    /// [`Error::Status`] with the provided context
    pub fn into_result(self, context: impl Into<String>) -> ClientResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::status(self, context))
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::Success
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        use StatusCode::*;
        match code {
            0x00 => Success,
            0x02 => AuthError,
            0x03 => DeltaBadval,
            0x04 => TooBig,
            0x05 => ServerBusy,
            0x06 => Internal,
            0x07 => InvalidArgs,
            0x08 => NoMemory,
            0x09 => Range,
            0x0A => Generic,
            0x0B => TempFail,
            0x0C => KeyExists,
            0x0D => KeyNotFound,
            0x10 => Network,
            0x12 => NotStored,
            0x13 => NotSupported,
            0x17 => TimedOut,
            0x1C => BadHandle,
            0x35 => EmptyKey,
            0x3B => HttpError,
            other => Other(other),
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(rc: StatusCode) -> u16 {
        use StatusCode::*;
        match rc {
            Success => 0x00,
            AuthError => 0x02,
            DeltaBadval => 0x03,
            TooBig => 0x04,
            ServerBusy => 0x05,
            Internal => 0x06,
            InvalidArgs => 0x07,
            NoMemory => 0x08,
            Range => 0x09,
            Generic => 0x0A,
            TempFail => 0x0B,
            KeyExists => 0x0C,
            KeyNotFound => 0x0D,
            Network => 0x10,
            NotStored => 0x12,
            NotSupported => 0x13,
            TimedOut => 0x17,
            BadHandle => 0x1C,
            EmptyKey => 0x35,
            HttpError => 0x3B,
            Other(code) => code,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use StatusCode::*;
        let code = u16::from(*self);
        match self {
            Success => write!(f, "Status: 0x{:02X} (success)", code),
            AuthError => write!(f, "Status: 0x{:02X} (authentication error)", code),
            DeltaBadval => write!(f, "Status: 0x{:02X} (non-numeric counter value)", code),
            TooBig => write!(f, "Status: 0x{:02X} (object too big)", code),
            ServerBusy => write!(f, "Status: 0x{:02X} (server busy)", code),
            Internal => write!(f, "Status: 0x{:02X} (internal error)", code),
            InvalidArgs => write!(f, "Status: 0x{:02X} (invalid arguments)", code),
            NoMemory => write!(f, "Status: 0x{:02X} (out of memory)", code),
            Range => write!(f, "Status: 0x{:02X} (invalid range)", code),
            Generic => write!(f, "Status: 0x{:02X} (generic error)", code),
            TempFail => write!(f, "Status: 0x{:02X} (temporary failure)", code),
            KeyExists => write!(f, "Status: 0x{:02X} (key exists)", code),
            KeyNotFound => write!(f, "Status: 0x{:02X} (key not found)", code),
            Network => write!(f, "Status: 0x{:02X} (network error)", code),
            NotStored => write!(f, "Status: 0x{:02X} (not stored)", code),
            NotSupported => write!(f, "Status: 0x{:02X} (not supported)", code),
            TimedOut => write!(f, "Status: 0x{:02X} (timed out)", code),
            BadHandle => write!(f, "Status: 0x{:02X} (bad handle)", code),
            EmptyKey => write!(f, "Status: 0x{:02X} (empty key)", code),
            HttpError => write!(f, "Status: 0x{:02X} (HTTP error)", code),
            Other(_) => write!(f, "Status: 0x{:02X}", code),
        }
    }
}

#[test]
fn t_status_roundtrip_known_and_unknown() {
    assert_eq!(StatusCode::from(0x3B), StatusCode::HttpError);
    assert_eq!(u16::from(StatusCode::KeyNotFound), 0x0D);
    assert_eq!(StatusCode::from(0x99), StatusCode::Other(0x99));
    assert_eq!(u16::from(StatusCode::Other(0x99)), 0x99);
    assert!(StatusCode::from(0).is_success());
}

#[test]
fn t_status_into_result() {
    assert_eq!(StatusCode::Success.into_result("x"), Ok(()));
    assert_eq!(
        StatusCode::TempFail.into_result("N1QL"),
        Err(Error::status(StatusCode::TempFail, "N1QL"))
    );
}
