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

//! # Command batches
//!
//! A [`CommandContext`] turns bulk caller input into a [`CommandBatch`]: a fixed array of
//! command records, one per input item, that the native library reads during a single
//! submission call. Every operation kind (store, get, lock, remove, counter, unlock, touch)
//! is a [`CommandKind`] that fills in its own fields.
//!
//! ## Example
//! ```
//! use lcbind::command::{CommandContext, Items, Store, StoreOptions};
//! use lcbind::native::StoreMode;
//! use lcbind::{DefaultTranscoder, Format};
//!
//! let kind = Store::new(StoreMode::Upsert, StoreOptions::default(), Format::Json);
//! let ctx = CommandContext::new(kind, &DefaultTranscoder);
//! let batch = ctx
//!     .build(Items(vec![("a", 1u64), ("b", 2u64)]))
//!     .unwrap();
//! assert_eq!(batch.len(), 2);
//! let first = batch.iter().next().unwrap();
//! assert_eq!(batch.key(first), b"a");
//! assert_eq!(batch.value(first), b"1");
//! ```

mod input;
mod kinds;
mod options;

pub use self::{
    input::{Batch, Entry, IntoBatch, ItemSpec, Items, SizedIter},
    kinds::{
        Counter, CounterOptions, Get, GetOptions, Lock, LockOptions, Remove, RemoveOptions, Store,
        StoreOptions, Touch, TouchOptions, Unlock, UnlockOptions,
    },
    options::Options,
};

use crate::{
    buffer::{BufManager, BufRef},
    error::{ClientResult, Error},
    native::{Cookie, Instance, KeyedCmd, StoreCmd},
    status::StatusCode,
    transcoder::{Transcoder, Value},
};

/// One kind of key/value operation
///
/// A kind knows its record type, its defaults, how to read a bare mapping value, how to fill in
/// one record and which native entry point takes its batches.
pub trait CommandKind {
    /// The native record built for every item
    type Cmd: KeyedCmd;
    /// A short name used in logs
    const NAME: &'static str;
    /// The operation level defaults, merged under every item's options
    fn defaults(&self) -> &Options;
    /// Turn a bare (non-options) mapping value into options
    fn convert_to_koptions(&self, v: Value) -> ClientResult<Options> {
        Err(Error::argument("Options expected", Some(format!("{:?}", v))))
    }
    /// Fill in the kind specific fields of `cmd` from the merged options
    fn process_single_command(
        &self,
        cmd: &mut Self::Cmd,
        options: &Options,
        tc: &dyn Transcoder,
        bufs: &mut BufManager,
    ) -> ClientResult<()>;
    /// Skip value decoding for results of this batch
    fn no_format(&self) -> bool {
        false
    }
    /// Hand a built batch to the native library
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<Self::Cmd>,
    ) -> StatusCode;
}

/*
    batch
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// The "address" of a record: its index in the batch's record arena
pub struct CmdIndex(pub usize);

#[derive(Debug)]
/// A built batch of command records
///
/// The record arena and the address array are allocated once with exactly as many entries as
/// there are items and are never resized. Every encoded key and value is owned by the batch,
/// so everything a record refers to stays valid for as long as the batch is alive.
pub struct CommandBatch<C> {
    records: Box<[C]>,
    addrs: Box<[CmdIndex]>,
    bufs: BufManager,
    quiet: bool,
    no_format: bool,
}

impl<C: KeyedCmd> CommandBatch<C> {
    /// The number of records
    pub fn len(&self) -> usize {
        self.addrs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
    /// The records, in input order
    pub fn iter(&self) -> impl Iterator<Item = &C> + '_ {
        self.addrs.iter().map(move |ix| &self.records[ix.0])
    }
    /// The address array, in input order
    pub fn addresses(&self) -> &[CmdIndex] {
        &self.addrs
    }
    /// Resolve an address
    pub fn record(&self, ix: CmdIndex) -> &C {
        &self.records[ix.0]
    }
    /// The encoded key of a record of this batch
    pub fn key(&self, cmd: &C) -> &[u8] {
        self.bufs.get(cmd.key())
    }
    /// Resolve any buffer handle held by a record of this batch
    pub fn bytes(&self, r: BufRef) -> &[u8] {
        self.bufs.get(r)
    }
    /// Not-found errors should be suppressed for this batch
    pub fn quiet(&self) -> bool {
        self.quiet
    }
    /// Values fetched by this batch should be returned undecoded
    pub fn no_format(&self) -> bool {
        self.no_format
    }
}

impl CommandBatch<StoreCmd> {
    /// The encoded value of a store record of this batch
    pub fn value(&self, cmd: &StoreCmd) -> &[u8] {
        self.bufs.get(cmd.value)
    }
}

/*
    context
*/

/// Builds command batches of one kind
pub struct CommandContext<'t, K> {
    kind: K,
    tc: &'t dyn Transcoder,
    quiet: bool,
}

impl<'t, K: CommandKind> CommandContext<'t, K> {
    pub fn new(kind: K, tc: &'t dyn Transcoder) -> Self {
        Self {
            kind,
            tc,
            quiet: false,
        }
    }
    /// Mark batches built by this context as quiet
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
    pub fn kind(&self) -> &K {
        &self.kind
    }
    /// Build a batch from `input`
    ///
    /// Any malformed item aborts the whole build; no partial batch is ever returned.
    pub fn build<'i>(&self, input: impl IntoBatch<'i>) -> ClientResult<CommandBatch<K::Cmd>> {
        let Batch { len, entries } = input.into_batch()?;
        if len == 0 {
            return Err(Error::argument("No items in container", None));
        }
        let mut records: Box<[K::Cmd]> = (0..len).map(|_| K::Cmd::default()).collect();
        let mut addrs = vec![CmdIndex::default(); len].into_boxed_slice();
        let mut bufs = BufManager::with_capacity(len * 2);
        let mut curix = 0;
        for entry in entries {
            if curix == len {
                // the iterator has more items than it claimed
                return Err(Error::argument(
                    "Bad iterator",
                    Some(format!("declared length {}", len)),
                ));
            }
            self.build_single(entry?, &mut records[curix], &mut bufs)?;
            addrs[curix] = CmdIndex(curix);
            curix += 1;
        }
        if curix != len {
            return Err(Error::argument(
                "Bad iterator",
                Some(format!("declared length {}, got {}", len, curix)),
            ));
        }
        tracing::debug!(kind = K::NAME, items = len, "built command batch");
        Ok(CommandBatch {
            records,
            addrs,
            bufs,
            quiet: self.quiet,
            no_format: self.kind.no_format(),
        })
    }
    fn build_single(
        &self,
        entry: Entry,
        cmd: &mut K::Cmd,
        bufs: &mut BufManager,
    ) -> ClientResult<()> {
        let (item, spec) = match entry {
            Entry::Key(item) => (item, None),
            Entry::Pair(item, spec) => (item, Some(spec)),
        };
        let (key, prior_cas) = item.into_parts();
        let mut koptions = match spec {
            None => Options::default(),
            Some(ItemSpec::Options(o)) => o,
            Some(ItemSpec::Prior(cas)) => Options::default().with_cas(cas),
            Some(ItemSpec::Scalar(v)) => self.kind.convert_to_koptions(v)?,
        };
        if let Some(cas) = prior_cas {
            koptions.cas = Some(cas);
        }
        let options = self.kind.defaults().merged(koptions);
        let k_enc = self.tc.encode_key(&key)?;
        if k_enc.is_empty() {
            return Err(Error::value_format("Key is empty", Some(key.to_string())));
        }
        cmd.set_key(bufs.new_buf(k_enc)?);
        self.kind.process_single_command(cmd, &options, self.tc, bufs)
    }
    /// Build a batch from `input` and hand it to the native library. A nonzero submission
    /// status is returned as an error
    pub fn submit<'i>(
        &self,
        instance: &mut dyn Instance,
        cookie: &Cookie,
        input: impl IntoBatch<'i>,
    ) -> ClientResult<CommandBatch<K::Cmd>> {
        let batch = self.build(input)?;
        let rc = K::submit(instance, cookie, &batch);
        tracing::debug!(kind = K::NAME, items = batch.len(), %rc, "submitted command batch");
        rc.into_result(K::NAME)?;
        Ok(batch)
    }
}

/*
    shared option extractors
*/

pub(crate) fn extract_cas(options: &Options) -> u64 {
    options.cas.unwrap_or(0)
}

pub(crate) fn extract_ttl(options: &Options) -> ClientResult<u32> {
    let ttl = options.ttl.unwrap_or(0);
    if ttl < 0 {
        return Err(Error::argument("TTL cannot be negative", Some(ttl.to_string())));
    }
    u32::try_from(ttl).map_err(|_| Error::argument("Invalid TTL", Some(ttl.to_string())))
}

#[test]
fn t_extract_ttl() {
    assert_eq!(extract_ttl(&Options::default()), Ok(0));
    assert_eq!(extract_ttl(&Options::default().with_ttl(30)), Ok(30));
    assert!(extract_ttl(&Options::default().with_ttl(-1)).is_err());
    assert!(extract_ttl(&Options::default().with_ttl(i64::MAX)).is_err());
}
