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

//! # Operation results
//!
//! Results of key/value operations, and the [`KeyItem`] type that lets a previous result be
//! passed where a key is expected. This is how a read-modify-write cycle picks up the CAS of
//! the read:
//!
//! ```
//! use lcbind::result::{KeyItem, OperationResult};
//! use lcbind::StatusCode;
//!
//! let prior = OperationResult::new("user:1".into(), 0xdead, StatusCode::Success);
//! let item = KeyItem::from(&prior);
//! assert_eq!(item.cas(), Some(0xdead));
//! ```

use crate::{
    status::StatusCode,
    transcoder::{Key, Value},
};

#[derive(Debug, Clone, PartialEq)]
/// The result of a mutation
pub struct OperationResult {
    pub key: Key,
    pub cas: u64,
    pub rc: StatusCode,
}

impl OperationResult {
    pub fn new(key: Key, cas: u64, rc: StatusCode) -> Self {
        Self { key, cas, rc }
    }
    pub fn success(&self) -> bool {
        self.rc.is_success()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The result of an operation that also returns a document
pub struct ValueResult {
    pub key: Key,
    pub cas: u64,
    pub rc: StatusCode,
    pub flags: u32,
    pub value: Option<Value>,
}

impl ValueResult {
    pub fn new(key: Key, cas: u64, rc: StatusCode, flags: u32, value: Option<Value>) -> Self {
        Self {
            key,
            cas,
            rc,
            flags,
            value,
        }
    }
    pub fn success(&self) -> bool {
        self.rc.is_success()
    }
}

impl From<ValueResult> for OperationResult {
    fn from(v: ValueResult) -> Self {
        Self::new(v.key, v.cas, v.rc)
    }
}

/// One entry of a key sequence: either a plain key or a previous result
#[derive(Debug, Clone, PartialEq)]
pub enum KeyItem {
    /// A plain key
    Key(Key),
    /// A previous result used in place of its key. The CAS, when present, is picked up
    /// automatically
    Prior { key: Key, cas: Option<u64> },
}

impl KeyItem {
    /// A previous result that carries no CAS
    pub fn prior_without_cas(key: impl Into<Key>) -> Self {
        Self::Prior {
            key: key.into(),
            cas: None,
        }
    }
    pub fn key(&self) -> &Key {
        match self {
            Self::Key(k) | Self::Prior { key: k, .. } => k,
        }
    }
    pub fn cas(&self) -> Option<u64> {
        match self {
            Self::Key(_) => None,
            Self::Prior { cas, .. } => *cas,
        }
    }
    pub(crate) fn into_parts(self) -> (Key, Option<u64>) {
        match self {
            Self::Key(k) => (k, None),
            Self::Prior { key, cas } => (key, cas),
        }
    }
}

impl_from_variant!(KeyItem => Key(Key, &str, String, &String, &[u8], Vec<u8>));

impl From<OperationResult> for KeyItem {
    fn from(r: OperationResult) -> Self {
        Self::Prior {
            key: r.key,
            cas: Some(r.cas),
        }
    }
}

impl From<&OperationResult> for KeyItem {
    fn from(r: &OperationResult) -> Self {
        Self::Prior {
            key: r.key.clone(),
            cas: Some(r.cas),
        }
    }
}

impl From<ValueResult> for KeyItem {
    fn from(r: ValueResult) -> Self {
        Self::Prior {
            key: r.key,
            cas: Some(r.cas),
        }
    }
}

impl From<&ValueResult> for KeyItem {
    fn from(r: &ValueResult) -> Self {
        Self::Prior {
            key: r.key.clone(),
            cas: Some(r.cas),
        }
    }
}

#[test]
fn t_keyitem_from_results() {
    let plain = KeyItem::from("a");
    assert_eq!(plain.cas(), None);
    let vr = ValueResult::new("b".into(), 7, StatusCode::Success, 0, None);
    let item = KeyItem::from(&vr);
    assert_eq!(item.key(), &Key::from("b"));
    assert_eq!(item.cas(), Some(7));
    assert_eq!(KeyItem::prior_without_cas("c").cas(), None);
}
