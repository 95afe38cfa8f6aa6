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

//! # The native boundary
//!
//! This module describes everything that crosses into and out of the native client library:
//! the fixed-layout command records, the query request descriptors, the response records
//! handed to row callbacks and the [`Instance`] trait through which commands are submitted.
//!
//! Nothing here talks to a server. An [`Instance`] implementation wraps the actual native
//! handle (or, in tests, a scripted fake).

use {
    crate::{
        aggregator::MultiResult, buffer::BufRef, command::CommandBatch, result::ValueResult,
        status::StatusCode,
    },
    bytes::Bytes,
    std::rc::Rc,
};

/// The aggregator handed to the native library along with key/value batches. The native
/// layer reports each per-key result into it
pub type Cookie = Rc<MultiResult<ValueResult>>;

/// A row callback registered with a query submission. The native library invokes it once per
/// response record, from within [`Instance::wait`]
pub type RowCallback<R> = Box<dyn FnMut(&R)>;

/*
    command records
*/

/// Access to the key shared by every command record
pub trait KeyedCmd: Default {
    fn key(&self) -> BufRef;
    fn set_key(&mut self, key: BufRef);
}

macro_rules! keyed_cmd {
    ($($ty:ty),* $(,)?) => {
        $(impl KeyedCmd for $ty {
            fn key(&self) -> BufRef {
                self.key
            }
            fn set_key(&mut self, key: BufRef) {
                self.key = key;
            }
        })*
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How a store command treats an existing document
pub enum StoreMode {
    /// Create or overwrite
    #[default]
    Upsert,
    /// Create only; fail if the key exists
    Insert,
    /// Overwrite only; fail if the key is missing
    Replace,
    /// Append raw bytes to an existing value
    Append,
    /// Prepend raw bytes to an existing value
    Prepend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCmd {
    pub key: BufRef,
    pub value: BufRef,
    pub flags: u32,
    pub cas: u64,
    pub exptime: u32,
    pub operation: StoreMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetCmd {
    pub key: BufRef,
    pub exptime: u32,
    pub lock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveCmd {
    pub key: BufRef,
    pub cas: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterCmd {
    pub key: BufRef,
    pub delta: i64,
    pub initial: u64,
    pub create: bool,
    pub exptime: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnlockCmd {
    pub key: BufRef,
    pub cas: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchCmd {
    pub key: BufRef,
    pub exptime: u32,
}

keyed_cmd!(StoreCmd, GetCmd, RemoveCmd, CounterCmd, UnlockCmd, TouchCmd);

/*
    query requests
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Identifies one in-flight query to the native library
pub struct QueryHandle(pub u64);

native_flags! {
    /// Flags for view query commands
    pub struct ViewFlags(u32) {
        /// Fetch the full document of every row
        const INCLUDE_DOCS = 1 << 16;
        /// Hand rows over unparsed
        const NO_ROW_PARSE = 1 << 17;
        /// Query a spatial view
        const SPATIAL = 1 << 18;
    }
}

native_flags! {
    /// Flags for N1QL query commands
    pub struct N1qlFlags(u32) {
        /// Send the request with credentials for every bucket
        const MULTIAUTH = 1 << 1;
        /// Prepare the statement and cache the plan
        const PREPCACHE = 1 << 16;
    }
}

/// A view query request
pub struct ViewQueryCmd {
    pub ddoc: Bytes,
    pub view: Bytes,
    /// The URL encoded query string, if any
    pub optstr: Option<Bytes>,
    /// The JSON body for options that do not fit into a query string
    pub postdata: Option<Bytes>,
    pub cmdflags: ViewFlags,
    pub handle: QueryHandle,
    pub callback: RowCallback<RespViewQuery>,
}

/// An N1QL query request
pub struct N1qlCmd {
    /// The encoded request body
    pub query: Bytes,
    pub cmdflags: N1qlFlags,
    pub handle: QueryHandle,
    pub callback: RowCallback<RespN1ql>,
}

/*
    responses
*/

native_flags! {
    /// Flags carried by query responses
    pub struct RespFlags(u16) {
        /// This is the last response for the request
        const FINAL = 0x01;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// The HTTP response that a query was served with
pub struct HttpResponse {
    pub htstatus: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(htstatus: u16, body: impl Into<Bytes>) -> Self {
        Self {
            htstatus,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// The document fetched for a view row
pub struct RespGet {
    pub rc: StatusCode,
    pub cas: u64,
    pub itmflags: u32,
    pub value: Bytes,
}

/// Common surface of query responses
pub trait QueryResponse {
    fn rc(&self) -> StatusCode;
    fn rflags(&self) -> RespFlags;
    fn htresp(&self) -> Option<&HttpResponse>;
    fn is_final(&self) -> bool {
        self.rflags().contains(RespFlags::FINAL)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// One response record of a view query
pub struct RespViewQuery {
    pub rc: StatusCode,
    pub rflags: RespFlags,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub docid: Option<Bytes>,
    pub docresp: Option<RespGet>,
    pub htresp: Option<HttpResponse>,
}

impl RespViewQuery {
    /// A row response
    pub fn row(
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        docid: impl Into<Bytes>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            docid: Some(docid.into()),
            ..Default::default()
        }
    }
    /// A failed row response
    pub fn failed(rc: StatusCode) -> Self {
        Self {
            rc,
            ..Default::default()
        }
    }
    /// The final response. `meta` is the JSON metadata that trails the rows
    pub fn last(rc: StatusCode, meta: Option<Bytes>, htresp: Option<HttpResponse>) -> Self {
        Self {
            rc,
            rflags: RespFlags::FINAL,
            value: meta,
            htresp,
            ..Default::default()
        }
    }
}

impl QueryResponse for RespViewQuery {
    fn rc(&self) -> StatusCode {
        self.rc
    }
    fn rflags(&self) -> RespFlags {
        self.rflags
    }
    fn htresp(&self) -> Option<&HttpResponse> {
        self.htresp.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// One response record of an N1QL query
pub struct RespN1ql {
    pub rc: StatusCode,
    pub rflags: RespFlags,
    pub row: Option<Bytes>,
    pub htresp: Option<HttpResponse>,
}

impl RespN1ql {
    /// A row response
    pub fn row(row: impl Into<Bytes>) -> Self {
        Self {
            row: Some(row.into()),
            ..Default::default()
        }
    }
    /// A failed row response
    pub fn failed(rc: StatusCode) -> Self {
        Self {
            rc,
            ..Default::default()
        }
    }
    /// The final response
    pub fn last(rc: StatusCode, htresp: Option<HttpResponse>) -> Self {
        Self {
            rc,
            rflags: RespFlags::FINAL,
            htresp,
            ..Default::default()
        }
    }
}

impl QueryResponse for RespN1ql {
    fn rc(&self) -> StatusCode {
        self.rc
    }
    fn rflags(&self) -> RespFlags {
        self.rflags
    }
    fn htresp(&self) -> Option<&HttpResponse> {
        self.htresp.as_ref()
    }
}

/*
    instance
*/

/// The command submission API of the native library
///
/// Every submission returns a status: [`StatusCode::Success`] means the request was accepted
/// and will be answered from within [`Instance::wait`]. Batches are only borrowed; the
/// implementation must copy whatever it needs before returning.
pub trait Instance {
    fn store(&mut self, cookie: &Cookie, batch: &CommandBatch<StoreCmd>) -> StatusCode;
    fn get(&mut self, cookie: &Cookie, batch: &CommandBatch<GetCmd>) -> StatusCode;
    fn remove(&mut self, cookie: &Cookie, batch: &CommandBatch<RemoveCmd>) -> StatusCode;
    fn counter(&mut self, cookie: &Cookie, batch: &CommandBatch<CounterCmd>) -> StatusCode;
    fn unlock(&mut self, cookie: &Cookie, batch: &CommandBatch<UnlockCmd>) -> StatusCode;
    fn touch(&mut self, cookie: &Cookie, batch: &CommandBatch<TouchCmd>) -> StatusCode;
    /// Submit a view query. The callback stays registered until its final response
    fn view_query(&mut self, cmd: ViewQueryCmd) -> StatusCode;
    /// Submit an N1QL query. The callback stays registered until its final response
    fn n1ql_query(&mut self, cmd: N1qlCmd) -> StatusCode;
    /// Process all outstanding I/O, invoking the registered callbacks
    fn wait(&mut self);
}

#[test]
fn t_final_flag() {
    assert!(RespN1ql::last(StatusCode::Success, None).is_final());
    assert!(!RespN1ql::row(&b"{}"[..]).is_final());
    let flags = RespFlags::from_bits(0x03);
    assert!(flags.contains(RespFlags::FINAL));
    assert_eq!((ViewFlags::INCLUDE_DOCS | ViewFlags::SPATIAL).bits(), (1 << 16) | (1 << 18));
}
