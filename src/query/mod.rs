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

//! # Streaming query results
//!
//! View and N1QL queries answer with a stream of row responses followed by one final response.
//! A [`StreamingResult`] registers a row callback with the native library and turns that stream
//! into rows:
//!
//! ```text
//! created --schedule--> submitted --row--> submitted --final--> done
//! ```
//!
//! In sync mode rows are buffered until the caller drains them with
//! [`fetch`](StreamingResult::fetch). In async mode they are flushed to the
//! [`MultiResult`] callback while the event loop runs, in batches controlled by
//! [`rows_per_call`](StreamingResult::rows_per_call):
//!
//! | `rows_per_call` | flushes                                |
//! |-----------------|----------------------------------------|
//! | `0`             | on every row                           |
//! | `n > 0`         | once more than `n` rows are buffered   |
//! | `< 0`           | only on completion                     |
//!
//! Completion always flushes whatever is left.

pub mod n1ql;
pub mod view;

use {
    crate::{
        aggregator::MultiResult,
        error::{ClientResult, Error},
        native::{Instance, QueryHandle, QueryResponse, RowCallback},
        status::StatusCode,
        transcoder::Transcoder,
    },
    core::{cell::RefCell, mem},
    std::{
        collections::VecDeque,
        rc::{Rc, Weak},
    },
};

/// One query protocol
///
/// The streaming state machine is shared; a protocol only says how its request is built and
/// submitted, and how rows and the final body are pulled out of its responses.
pub trait QueryProtocol {
    /// The native request descriptor
    type Cmd;
    /// The native response record
    type Response: QueryResponse + 'static;
    /// The rows produced by this protocol
    type Row: 'static;
    /// A short description used as error context and in logs
    fn key(&self) -> String;
    /// Build the request descriptor
    fn init_command(
        &self,
        handle: QueryHandle,
        callback: RowCallback<Self::Response>,
    ) -> ClientResult<Self::Cmd>;
    /// Submit the request descriptor
    fn query(instance: &mut dyn Instance, cmd: Self::Cmd) -> StatusCode;
    /// Extract zero or one row from a (successful, non-final) response
    fn process_resp(
        &self,
        resp: &Self::Response,
        tc: &dyn Transcoder,
    ) -> ClientResult<Option<Self::Row>>;
    /// Extract the whole-body value from the final response
    fn handle_resp(&self, _resp: &Self::Response) -> Option<serde_json::Value> {
        None
    }
}

/// Decode a response body as JSON, keeping it as a string if it isn't JSON
pub(crate) fn decode_body(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
    })
}

struct State<P, R> {
    proto: P,
    rows: Vec<R>,
    rows_per_call: i64,
    done: bool,
    value: Option<serde_json::Value>,
    http_status: u16,
    handle: Option<QueryHandle>,
    parent: Option<Weak<RefCell<dyn Instance>>>,
    is_async: bool,
}

impl<P, R> State<P, R> {
    fn should_call(&self, is_final: bool) -> bool {
        is_final || (-1 < self.rows_per_call && self.rows_per_call < self.rows.len() as i64)
    }
}

struct Inner<P: QueryProtocol> {
    state: RefCell<State<P, P::Row>>,
    mres: Rc<MultiResult<P::Row>>,
    tc: Rc<dyn Transcoder>,
}

/// The rows of one in-flight (or completed) query
///
/// This is a cheap handle; clones refer to the same result.
pub struct StreamingResult<P: QueryProtocol> {
    inner: Rc<Inner<P>>,
}

impl<P: QueryProtocol> Clone for StreamingResult<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: QueryProtocol> core::fmt::Debug for StreamingResult<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.inner.state.borrow();
        f.debug_struct("StreamingResult")
            .field("key", &st.proto.key())
            .field("buffered", &st.rows.len())
            .field("rows_per_call", &st.rows_per_call)
            .field("done", &st.done)
            .field("http_status", &st.http_status)
            .finish()
    }
}

impl<P: QueryProtocol + 'static> StreamingResult<P> {
    pub(crate) fn new(
        proto: P,
        mres: Rc<MultiResult<P::Row>>,
        tc: Rc<dyn Transcoder>,
        is_async: bool,
        rows_per_call: i64,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State {
                    proto,
                    rows: Vec::new(),
                    rows_per_call,
                    done: false,
                    value: None,
                    http_status: 0,
                    handle: None,
                    parent: None,
                    is_async,
                }),
                mres,
                tc,
            }),
        }
    }
    /// Build the request and submit it to `parent`
    pub(crate) fn schedule(
        &self,
        parent: &Rc<RefCell<dyn Instance>>,
        handle: QueryHandle,
    ) -> ClientResult<()> {
        let inner = self.inner.clone();
        let callback: RowCallback<P::Response> =
            Box::new(move |resp: &P::Response| on_single_row(&inner, resp));
        let (cmd, key, is_async) = {
            let mut st = self.inner.state.borrow_mut();
            let cmd = st.proto.init_command(handle, callback)?;
            st.parent = Some(Rc::downgrade(parent));
            st.handle = Some(handle);
            (cmd, st.proto.key(), st.is_async)
        };
        let rc = match parent.try_borrow_mut() {
            Ok(mut instance) => P::query(&mut *instance, cmd),
            Err(_) => {
                self.inner.state.borrow_mut().handle = None;
                return Err(Error::Busy);
            }
        };
        tracing::debug!(query = %key, is_async, %rc, "scheduled query");
        if !rc.is_success() {
            self.inner.state.borrow_mut().handle = None;
        }
        rc.into_result(key)
    }
    /// Wait for outstanding I/O and return every row buffered so far
    ///
    /// The buffer is cleared before any recorded error is returned, so rows that arrived
    /// together with an error are dropped.
    pub fn fetch(&self) -> ClientResult<Vec<P::Row>> {
        let (parent, done) = {
            let st = self.inner.state.borrow();
            (st.parent.as_ref().and_then(Weak::upgrade), st.done)
        };
        match parent {
            Some(parent) => {
                let mut instance = parent.try_borrow_mut().map_err(|_| Error::Busy)?;
                instance.wait();
            }
            None if done => {}
            None => return Err(Error::Disconnected),
        }
        let rows = mem::take(&mut self.inner.state.borrow_mut().rows);
        tracing::trace!(rows = rows.len(), "fetched rows");
        self.inner.mres.maybe_throw()?;
        Ok(rows)
    }
    /// A blocking iterator over every row of this result
    pub fn iter(&self) -> Rows<P> {
        Rows {
            result: self.clone(),
            buffered: VecDeque::new(),
            finished: false,
        }
    }
    pub fn rows_per_call(&self) -> i64 {
        self.inner.state.borrow().rows_per_call
    }
    pub fn set_rows_per_call(&self, rows_per_call: i64) {
        self.inner.state.borrow_mut().rows_per_call = rows_per_call;
    }
    /// The number of rows currently buffered
    pub fn buffered(&self) -> usize {
        self.inner.state.borrow().rows.len()
    }
    pub fn is_done(&self) -> bool {
        self.inner.state.borrow().done
    }
    /// The whole-body value sent along with the final response
    pub fn value(&self) -> Option<serde_json::Value> {
        self.inner.state.borrow().value.clone()
    }
    /// The HTTP status of the final response (`0` until it arrives)
    pub fn http_status(&self) -> u16 {
        self.inner.state.borrow().http_status
    }
    /// The native handle of the request. Cleared once the query completes
    pub fn handle(&self) -> Option<QueryHandle> {
        self.inner.state.borrow().handle
    }
    pub fn key(&self) -> String {
        self.inner.state.borrow().proto.key()
    }
    /// Returns true while this result holds a reference to its connection
    pub fn has_parent(&self) -> bool {
        self.inner.state.borrow().parent.is_some()
    }
    /// Returns true if rows are delivered to the [`MultiResult`] callback
    pub fn is_async(&self) -> bool {
        self.inner.state.borrow().is_async
    }
    /// Take the buffered rows without waiting
    pub(crate) fn take_buffered(&self) -> Vec<P::Row> {
        mem::take(&mut self.inner.state.borrow_mut().rows)
    }
    pub fn multi_result(&self) -> &Rc<MultiResult<P::Row>> {
        &self.inner.mres
    }
}

impl<'a, P: QueryProtocol + 'static> IntoIterator for &'a StreamingResult<P> {
    type Item = ClientResult<P::Row>;
    type IntoIter = Rows<P>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Blocking row iterator returned by [`StreamingResult::iter`]
pub struct Rows<P: QueryProtocol> {
    result: StreamingResult<P>,
    buffered: VecDeque<P::Row>,
    finished: bool,
}

impl<P: QueryProtocol + 'static> Iterator for Rows<P> {
    type Item = ClientResult<P::Row>;
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(row) = self.buffered.pop_front() {
            return Some(Ok(row));
        }
        if self.finished {
            return None;
        }
        match self.result.fetch() {
            Ok(rows) => {
                // a wait that yields nothing means the event loop has nothing left for us
                self.finished = self.result.is_done() || rows.is_empty();
                self.buffered.extend(rows);
                self.buffered.pop_front().map(Ok)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/*
    row callback
*/

fn on_single_row<P: QueryProtocol>(inner: &Inner<P>, resp: &P::Response) {
    if resp.is_final() {
        handle_done(inner, resp);
        return;
    }
    let rc = resp.rc();
    if !rc.is_success() {
        let key = inner.state.borrow().proto.key();
        inner.mres.add_bad_rc(rc, &key);
        return;
    }
    let (is_async, failed) = {
        let mut st = inner.state.borrow_mut();
        let failed = match st.proto.process_resp(resp, &*inner.tc) {
            Ok(Some(row)) => {
                st.rows.push(row);
                None
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };
        tracing::trace!(buffered = st.rows.len(), "row arrived");
        (st.is_async, failed)
    };
    if let Some(e) = failed {
        inner.mres.add_err(e);
    }
    if is_async {
        invoke_async(inner, false);
    }
}

fn invoke_async<P: QueryProtocol>(inner: &Inner<P>, is_final: bool) {
    let rows = {
        let mut st = inner.state.borrow_mut();
        if !st.should_call(is_final) || !inner.mres.has_callback() {
            return;
        }
        mem::take(&mut st.rows)
    };
    tracing::trace!(rows = rows.len(), is_final, "flushing rows");
    if let Some(rows) = inner.mres.invoke_callback(rows) {
        // the callback went away while we were flushing; keep the rows
        let mut st = inner.state.borrow_mut();
        let later = mem::replace(&mut st.rows, rows);
        st.rows.extend(later);
    }
}

fn handle_done<P: QueryProtocol>(inner: &Inner<P>, resp: &P::Response) {
    let rc = resp.rc();
    let (key, is_async, http_status, value) = {
        let mut st = inner.state.borrow_mut();
        st.handle = None;
        if let Some(v) = st.proto.handle_resp(resp) {
            st.value = Some(v);
        }
        if let Some(htresp) = resp.htresp() {
            if st.value.is_none() && !htresp.body.is_empty() {
                st.value = Some(decode_body(&htresp.body));
            }
            st.http_status = htresp.htstatus;
        }
        (st.proto.key(), st.is_async, st.http_status, st.value.clone())
    };
    if !rc.is_success() {
        if rc == StatusCode::HttpError {
            inner.mres.add_err(Error::Http {
                rc,
                http_status,
                value,
            });
        } else {
            inner.mres.add_bad_rc(rc, &key);
        }
    }
    if is_async {
        invoke_async(inner, true);
    }
    inner.state.borrow_mut().done = true;
    inner.mres.set_done();
    tracing::debug!(query = %key, %rc, http_status, "query completed");
    if is_async {
        match inner.mres.maybe_throw() {
            Ok(()) => invoke_async(inner, true),
            Err(e) => inner.mres.invoke_errback(e),
        }
        inner.state.borrow_mut().parent = None;
    }
}

#[test]
fn t_flush_predicate() {
    let mut st: State<(), i32> = State {
        proto: (),
        rows: vec![1, 2],
        rows_per_call: 0,
        done: false,
        value: None,
        http_status: 0,
        handle: None,
        parent: None,
        is_async: true,
    };
    assert!(st.should_call(false));
    st.rows_per_call = 2;
    assert!(!st.should_call(false));
    st.rows.push(3);
    assert!(st.should_call(false));
    st.rows_per_call = -1;
    assert!(!st.should_call(false));
    assert!(st.should_call(true));
}

#[test]
fn t_decode_body_falls_back_to_string() {
    assert_eq!(decode_body(br#"{"ok":true}"#), serde_json::json!({"ok": true}));
    assert_eq!(decode_body(b"not json"), serde_json::json!("not json"));
}
