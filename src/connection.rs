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

//! # Connections
//!
//! A [`Connection`] ties a native [`Instance`] to a [`Transcoder`] and a [`Config`]. Every
//! multi-key operation builds one command batch, submits it and returns the aggregator (the
//! [`Cookie`]) that the native library reports per-key results into. Queries return a
//! [`StreamingResult`].
//!
//! A connection is single threaded: submissions and row callbacks all happen on the thread
//! that calls [`Connection::wait`].

use {
    crate::{
        aggregator::MultiResult,
        command::{
            CommandContext, CommandKind, Counter, CounterOptions, Get, GetOptions, IntoBatch, Lock,
            LockOptions, Remove, RemoveOptions, Store, StoreOptions, Touch, TouchOptions, Unlock,
            UnlockOptions,
        },
        config::Config,
        error::{ClientResult, Error},
        native::{Cookie, Instance, QueryHandle, StoreMode},
        query::{n1ql::N1qlQuery, view::ViewQuery, QueryProtocol, StreamingResult},
        transcoder::{DefaultTranscoder, Transcoder},
    },
    core::cell::{Cell, RefCell},
    std::rc::Rc,
};

/// A connection to a native client instance
pub struct Connection {
    instance: Rc<RefCell<dyn Instance>>,
    tc: Rc<dyn Transcoder>,
    config: Config,
    next_handle: Cell<u64>,
}

impl core::fmt::Debug for Connection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("next_handle", &self.next_handle.get())
            .finish()
    }
}

impl Connection {
    /// Create a connection using the [`DefaultTranscoder`]
    pub fn new(instance: impl Instance + 'static, config: Config) -> Self {
        Self::with_transcoder(instance, DefaultTranscoder, config)
    }
    pub fn with_transcoder(
        instance: impl Instance + 'static,
        tc: impl Transcoder + 'static,
        config: Config,
    ) -> Self {
        Self::from_shared(Rc::new(RefCell::new(instance)), Rc::new(tc), config)
    }
    /// Create a connection over an instance that is shared with other owners
    pub fn from_shared(
        instance: Rc<RefCell<dyn Instance>>,
        tc: Rc<dyn Transcoder>,
        config: Config,
    ) -> Self {
        Self {
            instance,
            tc,
            config,
            next_handle: Cell::new(1),
        }
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn transcoder(&self) -> &dyn Transcoder {
        &*self.tc
    }
    /// Process all outstanding I/O. Row callbacks and result reporting happen in here
    pub fn wait(&self) -> ClientResult<()> {
        self.instance
            .try_borrow_mut()
            .map_err(|_| Error::Busy)?
            .wait();
        Ok(())
    }
    fn run<'i, K: CommandKind>(
        &self,
        kind: K,
        quiet: Option<bool>,
        input: impl IntoBatch<'i>,
    ) -> ClientResult<Cookie> {
        let ctx = CommandContext::new(kind, &*self.tc).quiet(quiet.unwrap_or(self.config.quiet()));
        let cookie: Cookie = Rc::new(MultiResult::new());
        let mut instance = self.instance.try_borrow_mut().map_err(|_| Error::Busy)?;
        // the batch only has to outlive the submission call
        ctx.submit(&mut *instance, &cookie, input)?;
        Ok(cookie)
    }
    fn query<P: QueryProtocol + 'static>(&self, proto: P) -> ClientResult<StreamingResult<P>> {
        let result = StreamingResult::new(
            proto,
            Rc::new(MultiResult::new()),
            self.tc.clone(),
            self.config.is_async(),
            self.config.rows_per_call(),
        );
        let handle = QueryHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        result.schedule(&self.instance, handle)?;
        Ok(result)
    }
    /// Run a view query
    pub fn query_view(&self, query: ViewQuery) -> ClientResult<StreamingResult<ViewQuery>> {
        self.query(query)
    }
    /// Run an N1QL query
    pub fn n1ql_query(&self, query: N1qlQuery) -> ClientResult<StreamingResult<N1qlQuery>> {
        self.query(query)
    }
}

macro_rules! kv_actions {
    (
        $(
            $(#[$attr:meta])*
            fn $name:ident($opts:ty) => |$o:ident, $cfg:ident| $kind:expr;
        )*
    ) => {
        impl Connection {
            $(
                $(#[$attr])*
                pub fn $name<'i>(&self, input: impl IntoBatch<'i>, $o: $opts) -> ClientResult<Cookie> {
                    let quiet = $o.quiet;
                    #[allow(unused_variables)]
                    let $cfg = &self.config;
                    self.run($kind, quiet, input)
                }
            )*
        }
    };
}

kv_actions! {
    /// Create or overwrite documents
    fn upsert_multi(StoreOptions) => |opts, cfg| Store::new(StoreMode::Upsert, opts, cfg.default_format());
    /// Create documents, failing for keys that already exist
    fn insert_multi(StoreOptions) => |opts, cfg| Store::new(StoreMode::Insert, opts, cfg.default_format());
    /// Overwrite documents, failing for keys that don't exist
    fn replace_multi(StoreOptions) => |opts, cfg| Store::new(StoreMode::Replace, opts, cfg.default_format());
    /// Append to existing values
    fn append_multi(StoreOptions) => |opts, cfg| Store::new(StoreMode::Append, opts, cfg.default_format());
    /// Prepend to existing values
    fn prepend_multi(StoreOptions) => |opts, cfg| Store::new(StoreMode::Prepend, opts, cfg.default_format());
    /// Fetch documents
    fn get_multi(GetOptions) => |opts, cfg| Get::new(opts);
    /// Fetch and lock documents
    fn lock_multi(LockOptions) => |opts, cfg| Lock::new(opts);
    /// Remove documents
    fn remove_multi(RemoveOptions) => |opts, cfg| Remove::new(opts);
    /// Increment counters
    fn incr_multi(CounterOptions) => |opts, cfg| Counter::incr(opts);
    /// Decrement counters
    fn decr_multi(CounterOptions) => |opts, cfg| Counter::decr(opts);
    /// Unlock documents locked with [`Connection::lock_multi`]. Every key needs the CAS
    /// returned by the lock
    fn unlock_multi(UnlockOptions) => |opts, cfg| Unlock::new(opts);
    /// Update the expiry of documents
    fn touch_multi(TouchOptions) => |opts, cfg| Touch::new(opts);
}
