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

//! # Transcoding
//!
//! Keys and values have to be turned into bytes before the native library can use them. This
//! module provides the [`Transcoder`] trait that does this, along with a [`DefaultTranscoder`]
//! that understands the common value formats.
//!
//! ## Implementing a custom transcoder
//!
//! ```
//! use lcbind::{transcoder::{DefaultTranscoder, Format, Key, Transcoder, Value}, ClientResult};
//! use bytes::Bytes;
//!
//! /// Prefixes every key with a namespace
//! struct Namespaced(&'static str);
//!
//! impl Transcoder for Namespaced {
//!     fn encode_key(&self, key: &Key) -> ClientResult<Bytes> {
//!         let mut k = self.0.as_bytes().to_vec();
//!         k.extend_from_slice(key.as_bytes());
//!         Ok(k.into())
//!     }
//!     fn encode_value(&self, value: &Value, format: Format) -> ClientResult<(Bytes, u32)> {
//!         DefaultTranscoder.encode_value(value, format)
//!     }
//!     fn decode_value(&self, bytes: &[u8], flags: u32) -> ClientResult<Value> {
//!         DefaultTranscoder.decode_value(bytes, flags)
//!     }
//! }
//!
//! let tc = Namespaced("app:");
//! assert_eq!(&tc.encode_key(&Key::from("user")).unwrap()[..], b"app:user");
//! ```

use {
    crate::error::{ClientResult, Error},
    bytes::Bytes,
    core::fmt,
};

/// Flags for JSON values
pub const FMT_JSON: u32 = 0x00;
/// Flags for raw binary values
pub const FMT_BYTES: u32 = 0x02;
/// Flags for UTF-8 text values
pub const FMT_UTF8: u32 = 0x04;
/// The bits of the item flags that carry the format
pub const FMT_MASK: u32 = 0x07;

/*
    keys
*/

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// A document key as supplied by the caller
pub enum Key {
    Str(String),
    Bytes(Vec<u8>),
}

impl Key {
    /// Returns the raw bytes of this key
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Str(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl_from_variant!(Key => Str(&str, String, &String), Bytes(&[u8], Vec<u8>));

/*
    values
*/

#[derive(Debug, Clone, PartialEq)]
/// A document value
pub enum Value {
    /// A JSON document
    Json(serde_json::Value),
    /// A UTF-8 string stored verbatim
    Utf8(String),
    /// Opaque bytes stored verbatim
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the value as an unsigned integer if it is a JSON number that fits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Json(v) => v.as_u64(),
            _ => None,
        }
    }
    /// Returns the value as a signed integer if it is a JSON number that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Json(v) => v.as_i64(),
            _ => None,
        }
    }
    fn describe(&self) -> String {
        match self {
            Self::Json(v) => v.to_string(),
            Self::Utf8(s) => format!("{:?}", s),
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl_from_variant!(
    Value =>
        Json(serde_json::Value, u64, i64, u32, i32, bool, f64),
        Utf8(&str, String),
        Bytes(&[u8], Vec<u8>),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The encoding used when storing a value
pub enum Format {
    Json,
    Utf8,
    Bytes,
    /// Pick the format from the kind of value being stored
    Auto,
}

impl Format {
    /// The item flags that mark a value of this format
    pub fn flags(&self) -> u32 {
        match self {
            Self::Json | Self::Auto => FMT_JSON,
            Self::Utf8 => FMT_UTF8,
            Self::Bytes => FMT_BYTES,
        }
    }
}

/*
    transcoder
*/

/// A pluggable key/value codec
///
/// All failures must be reported as [`Error::ValueFormat`]
pub trait Transcoder {
    /// Encode a key into the bytes that are sent over the wire
    fn encode_key(&self, key: &Key) -> ClientResult<Bytes>;
    /// Encode a value using the requested format. Returns the bytes and the item flags
    fn encode_value(&self, value: &Value, format: Format) -> ClientResult<(Bytes, u32)>;
    /// Decode a stored value using its item flags
    fn decode_value(&self, bytes: &[u8], flags: u32) -> ClientResult<Value>;
}

#[derive(Debug, Clone, Copy, Default)]
/// The transcoder used unless the connection is given another one
pub struct DefaultTranscoder;

impl Transcoder for DefaultTranscoder {
    fn encode_key(&self, key: &Key) -> ClientResult<Bytes> {
        Ok(Bytes::copy_from_slice(key.as_bytes()))
    }
    fn encode_value(&self, value: &Value, format: Format) -> ClientResult<(Bytes, u32)> {
        let format = match (format, value) {
            (Format::Auto, Value::Json(_)) => Format::Json,
            (Format::Auto, Value::Utf8(_)) => Format::Utf8,
            (Format::Auto, Value::Bytes(_)) => Format::Bytes,
            (f, _) => f,
        };
        let encoded = match (format, value) {
            (Format::Json, Value::Json(v)) => Bytes::from(
                serde_json::to_vec(v).map_err(|e| Error::value_format(e.to_string(), None))?,
            ),
            (Format::Json, Value::Utf8(s)) => Bytes::from(
                serde_json::to_vec(s).map_err(|e| Error::value_format(e.to_string(), None))?,
            ),
            (Format::Utf8, Value::Utf8(s)) => Bytes::copy_from_slice(s.as_bytes()),
            (Format::Utf8, Value::Json(serde_json::Value::String(s))) => {
                Bytes::copy_from_slice(s.as_bytes())
            }
            (Format::Bytes, Value::Bytes(b)) => Bytes::copy_from_slice(b),
            (format, value) => {
                return Err(Error::value_format(
                    format!("value cannot be encoded as {:?}", format),
                    Some(value.describe()),
                ))
            }
        };
        Ok((encoded, format.flags()))
    }
    fn decode_value(&self, bytes: &[u8], flags: u32) -> ClientResult<Value> {
        match flags & FMT_MASK {
            FMT_JSON => serde_json::from_slice(bytes)
                .map(Value::Json)
                .map_err(|e| Error::value_format(e.to_string(), None)),
            FMT_UTF8 => String::from_utf8(bytes.to_vec())
                .map(Value::Utf8)
                .map_err(|e| Error::value_format(e.to_string(), None)),
            FMT_BYTES => Ok(Value::Bytes(bytes.to_vec())),
            unknown => Err(Error::value_format(
                format!("unknown value format 0x{:02X}", unknown),
                None,
            )),
        }
    }
}

#[test]
fn t_encode_auto_picks_format() {
    let tc = DefaultTranscoder;
    let (b, flags) = tc.encode_value(&Value::from("hi"), Format::Auto).unwrap();
    assert_eq!((&b[..], flags), (&b"hi"[..], FMT_UTF8));
    let (b, flags) = tc
        .encode_value(&Value::from(serde_json::json!({"a": 1})), Format::Auto)
        .unwrap();
    assert_eq!((&b[..], flags), (&br#"{"a":1}"#[..], FMT_JSON));
}

#[test]
fn t_encode_format_mismatch() {
    let tc = DefaultTranscoder;
    let e = tc
        .encode_value(&Value::from(vec![1u8, 2]), Format::Utf8)
        .unwrap_err();
    assert!(matches!(e, Error::ValueFormat { .. }));
}

#[test]
fn t_decode_by_flags() {
    let tc = DefaultTranscoder;
    assert_eq!(
        tc.decode_value(b"[1,2]", FMT_JSON).unwrap(),
        Value::Json(serde_json::json!([1, 2]))
    );
    assert_eq!(
        tc.decode_value(b"abc", FMT_UTF8).unwrap(),
        Value::Utf8("abc".into())
    );
    assert!(tc.decode_value(b"{", FMT_JSON).is_err());
    assert!(tc.decode_value(b"x", 0x07).is_err());
}
