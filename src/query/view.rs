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

//! # View queries
//!
//! A [`ViewQuery`] names a design document and a view, along with the [`ViewOptions`] to send
//! and the native [`ViewFlags`]. Every row arrives as a [`ViewRow`].

use {
    super::{decode_body, QueryProtocol},
    crate::{
        error::{ClientResult, Error},
        native::{
            Instance, QueryHandle, RespGet, RespViewQuery, RowCallback, ViewFlags, ViewQueryCmd,
        },
        result::ValueResult,
        status::StatusCode,
        transcoder::{Key, Transcoder, Value},
    },
    bytes::Bytes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether the index may be stale
pub enum Stale {
    /// Serve whatever the index has
    Ok,
    /// Update the index before serving
    False,
    /// Serve, then update the index
    UpdateAfter,
}

impl Stale {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::False => "false",
            Self::UpdateAfter => "update_after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What the server does when a node fails while serving a view
pub enum OnError {
    Continue,
    Stop,
}

impl OnError {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// View query options
///
/// Unset options are not sent. Key typed options (`key`, `keys`, `startkey`, `endkey`) are JSON
/// values; `keys` travels in the request body instead of the query string.
pub struct ViewOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub descending: Option<bool>,
    pub stale: Option<Stale>,
    pub key: Option<serde_json::Value>,
    pub keys: Option<Vec<serde_json::Value>>,
    pub startkey: Option<serde_json::Value>,
    pub endkey: Option<serde_json::Value>,
    pub startkey_docid: Option<String>,
    pub endkey_docid: Option<String>,
    pub inclusive_end: Option<bool>,
    pub group: Option<bool>,
    pub group_level: Option<u32>,
    pub reduce: Option<bool>,
    pub on_error: Option<OnError>,
    /// Milliseconds
    pub connection_timeout: Option<u64>,
    pub full_set: Option<bool>,
    pub debug: Option<bool>,
    /// Fetch the document of every row (sent as [`ViewFlags::INCLUDE_DOCS`])
    pub include_docs: Option<bool>,
}

impl ViewOptions {
    /// Returns the URL encoded query string and the JSON body (if one needs to be sent)
    pub fn encode(&self) -> ClientResult<(String, Option<String>)> {
        fn json(v: &serde_json::Value) -> ClientResult<String> {
            serde_json::to_string(v).map_err(|e| Error::value_format(e.to_string(), None))
        }
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        let mut push = |name, v: Option<String>| {
            if let Some(v) = v {
                pairs.push((name, v));
            }
        };
        push("limit", self.limit.map(|v| v.to_string()));
        push("skip", self.skip.map(|v| v.to_string()));
        push("descending", self.descending.map(|v| v.to_string()));
        push("stale", self.stale.map(|v| v.as_str().to_owned()));
        push("key", self.key.as_ref().map(json).transpose()?);
        push("startkey", self.startkey.as_ref().map(json).transpose()?);
        push("endkey", self.endkey.as_ref().map(json).transpose()?);
        push("startkey_docid", self.startkey_docid.clone());
        push("endkey_docid", self.endkey_docid.clone());
        push("inclusive_end", self.inclusive_end.map(|v| v.to_string()));
        push("group", self.group.map(|v| v.to_string()));
        push("group_level", self.group_level.map(|v| v.to_string()));
        push("reduce", self.reduce.map(|v| v.to_string()));
        push("on_error", self.on_error.map(|v| v.as_str().to_owned()));
        push("connection_timeout", self.connection_timeout.map(|v| v.to_string()));
        push("full_set", self.full_set.map(|v| v.to_string()));
        push("debug", self.debug.map(|v| v.to_string()));
        let query = serde_urlencoded::to_string(&pairs)
            .map_err(|e| Error::argument(e.to_string(), None))?;
        let post = match &self.keys {
            Some(keys) => Some(json(&serde_json::json!({ "keys": keys }))?),
            None => None,
        };
        Ok((query, post.filter(|p| p != "{}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A view row. Fields missing from the response are `None`
pub struct ViewRow {
    pub key: Option<serde_json::Value>,
    pub value: Option<serde_json::Value>,
    /// The document ID, if the row came from a document
    pub id: Option<String>,
    /// The document itself, if it was requested with [`ViewFlags::INCLUDE_DOCS`]
    pub doc: Option<ValueResult>,
}

#[derive(Debug, Clone)]
pub struct ViewQuery {
    ddoc: String,
    view: String,
    options: ViewOptions,
    flags: ViewFlags,
}

impl ViewQuery {
    pub fn new(ddoc: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            ddoc: ddoc.into(),
            view: view.into(),
            options: ViewOptions::default(),
            flags: ViewFlags::empty(),
        }
    }
    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }
    pub fn with_flags(mut self, flags: ViewFlags) -> Self {
        self.flags = flags;
        self
    }
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }
    /// The flags sent to the native library
    pub fn flags(&self) -> ViewFlags {
        let mut flags = self.flags;
        if self.options.include_docs == Some(true) {
            flags |= ViewFlags::INCLUDE_DOCS;
        }
        flags
    }
}

fn decode_json(field: &str, raw: &[u8]) -> ClientResult<serde_json::Value> {
    serde_json::from_slice(raw).map_err(|e| Error::Json(format!("row {}: {}", field, e)))
}

fn decode_doc(id: &str, doc: &RespGet, tc: &dyn Transcoder) -> ValueResult {
    let value = if doc.rc == StatusCode::Success {
        match tc.decode_value(&doc.value, doc.itmflags) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(id, error = %e, "could not decode view document, keeping raw bytes");
                Some(Value::Bytes(doc.value.to_vec()))
            }
        }
    } else {
        None
    };
    ValueResult::new(Key::from(id), doc.cas, doc.rc, doc.itmflags, value)
}

impl QueryProtocol for ViewQuery {
    type Cmd = ViewQueryCmd;
    type Response = RespViewQuery;
    type Row = ViewRow;
    fn key(&self) -> String {
        format!("VIEW[{}/{}]", self.ddoc, self.view)
    }
    fn init_command(
        &self,
        handle: QueryHandle,
        callback: RowCallback<RespViewQuery>,
    ) -> ClientResult<ViewQueryCmd> {
        let (query, post) = self.options.encode()?;
        Ok(ViewQueryCmd {
            ddoc: Bytes::from(self.ddoc.clone()),
            view: Bytes::from(self.view.clone()),
            optstr: (!query.is_empty()).then(|| Bytes::from(query)),
            postdata: post.map(Bytes::from),
            cmdflags: self.flags(),
            handle,
            callback,
        })
    }
    fn query(instance: &mut dyn Instance, cmd: ViewQueryCmd) -> StatusCode {
        instance.view_query(cmd)
    }
    fn process_resp(
        &self,
        resp: &RespViewQuery,
        tc: &dyn Transcoder,
    ) -> ClientResult<Option<ViewRow>> {
        let key = match resp.key.as_deref() {
            Some(k) if !k.is_empty() => Some(decode_json("key", k)?),
            _ => None,
        };
        let value = match resp.value.as_deref() {
            Some(v) if !v.is_empty() => Some(decode_json("value", v)?),
            _ => None,
        };
        let id = resp
            .docid
            .as_deref()
            .map(|id| String::from_utf8_lossy(id).into_owned());
        let doc = resp
            .docresp
            .as_ref()
            .map(|doc| decode_doc(id.as_deref().unwrap_or_default(), doc, tc));
        Ok(Some(ViewRow { key, value, id, doc }))
    }
    fn handle_resp(&self, resp: &RespViewQuery) -> Option<serde_json::Value> {
        resp.value
            .as_deref()
            .filter(|meta| !meta.is_empty())
            .map(decode_body)
    }
}

#[test]
fn t_view_options_encoding() {
    let opts = ViewOptions {
        limit: Some(10),
        stale: Some(Stale::False),
        startkey: Some(serde_json::json!(["a", 1])),
        keys: Some(vec![serde_json::json!("k1"), serde_json::json!("k2")]),
        ..Default::default()
    };
    let (query, post) = opts.encode().unwrap();
    assert_eq!(query, "limit=10&stale=false&startkey=%5B%22a%22%2C1%5D");
    assert_eq!(post.as_deref(), Some(r#"{"keys":["k1","k2"]}"#));
    let (query, post) = ViewOptions::default().encode().unwrap();
    assert_eq!(query, "");
    assert_eq!(post, None);
}

#[test]
fn t_view_row_mapping() {
    use crate::transcoder::DefaultTranscoder;
    let q = ViewQuery::new("beers", "by_name");
    let row = q
        .process_resp(
            &RespViewQuery::row(&br#""ale""#[..], &b"1"[..], &b"beer:1"[..]),
            &DefaultTranscoder,
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        row,
        ViewRow {
            key: Some(serde_json::json!("ale")),
            value: Some(serde_json::json!(1)),
            id: Some("beer:1".to_owned()),
            doc: None,
        }
    );
}

#[test]
fn t_view_doc_falls_back_to_raw_bytes() {
    use crate::transcoder::{DefaultTranscoder, FMT_JSON};
    let mut resp = RespViewQuery::row(&b"1"[..], &b"null"[..], &b"d"[..]);
    resp.docresp = Some(RespGet {
        rc: StatusCode::Success,
        cas: 7,
        itmflags: FMT_JSON,
        value: Bytes::from_static(b"{not json"),
    });
    let row = ViewQuery::new("a", "b")
        .process_resp(&resp, &DefaultTranscoder)
        .unwrap()
        .unwrap();
    let doc = row.doc.unwrap();
    assert_eq!(doc.cas, 7);
    assert_eq!(doc.key, Key::from("d"));
    assert_eq!(doc.value, Some(Value::Bytes(b"{not json".to_vec())));
}
