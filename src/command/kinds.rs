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

use {
    super::{extract_cas, extract_ttl, CommandBatch, CommandKind, Options},
    crate::{
        buffer::BufManager,
        error::{ClientResult, Error},
        native::{
            Cookie, CounterCmd, GetCmd, Instance, RemoveCmd, StoreCmd, StoreMode, TouchCmd,
            UnlockCmd,
        },
        status::StatusCode,
        transcoder::{Format, Transcoder, Value},
    },
};

fn integer_cas(v: Value) -> ClientResult<Options> {
    match v.as_u64() {
        Some(cas) => Ok(Options::default().with_cas(cas)),
        None => Err(Error::argument("Invalid CAS", Some(format!("{:?}", v)))),
    }
}

/*
    construction options
*/

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreOptions {
    /// `0` means "don't check"
    pub cas: u64,
    pub ttl: i64,
    /// Defaults to the connection's format (UTF-8 for append and prepend)
    pub format: Option<Format>,
    pub quiet: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    pub ttl: i64,
    /// Return fetched values undecoded
    pub no_format: bool,
    pub quiet: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockOptions {
    /// Required; a lock cannot be held forever
    pub ttl: i64,
    pub quiet: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveOptions {
    pub cas: u64,
    pub quiet: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterOptions {
    /// The step, applied as is for increments and negated for decrements
    pub amount: i64,
    /// Create the counter with this value if it does not exist
    pub initial: Option<u64>,
    pub ttl: i64,
    pub quiet: Option<bool>,
}

impl Default for CounterOptions {
    fn default() -> Self {
        Self {
            amount: 1,
            initial: None,
            ttl: 0,
            quiet: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnlockOptions {
    pub cas: u64,
    pub quiet: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchOptions {
    pub ttl: i64,
    pub quiet: Option<bool>,
}

/*
    store
*/

#[derive(Debug, Clone)]
/// Upsert, insert, replace, append and prepend
pub struct Store {
    mode: StoreMode,
    defaults: Options,
}

impl Store {
    pub fn new(mode: StoreMode, opts: StoreOptions, default_format: Format) -> Self {
        let format = opts.format.unwrap_or(match mode {
            StoreMode::Append | StoreMode::Prepend => Format::Utf8,
            _ => default_format,
        });
        Self {
            mode,
            defaults: Options::default()
                .with_cas(opts.cas)
                .with_ttl(opts.ttl)
                .with_format(format),
        }
    }
    pub fn mode(&self) -> StoreMode {
        self.mode
    }
}

impl CommandKind for Store {
    type Cmd = StoreCmd;
    const NAME: &'static str = "store";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn convert_to_koptions(&self, v: Value) -> ClientResult<Options> {
        Ok(Options::default().with_value(v))
    }
    fn process_single_command(
        &self,
        cmd: &mut StoreCmd,
        options: &Options,
        tc: &dyn Transcoder,
        bufs: &mut BufManager,
    ) -> ClientResult<()> {
        let value = options
            .value
            .as_ref()
            .ok_or_else(|| Error::value_format("No value to store", None))?;
        let (encoded, flags) = tc.encode_value(value, options.format.unwrap_or(Format::Json))?;
        cmd.value = bufs.new_buf(encoded)?;
        cmd.flags = flags;
        cmd.cas = extract_cas(options);
        cmd.exptime = extract_ttl(options)?;
        cmd.operation = self.mode;
        Ok(())
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<StoreCmd>,
    ) -> StatusCode {
        instance.store(cookie, batch)
    }
}

/*
    get and lock
*/

#[derive(Debug, Clone)]
pub struct Get {
    lock: bool,
    no_format: bool,
    defaults: Options,
}

impl Get {
    pub fn new(opts: GetOptions) -> Self {
        Self {
            lock: false,
            no_format: opts.no_format,
            defaults: Options::default().with_ttl(opts.ttl),
        }
    }
}

impl CommandKind for Get {
    type Cmd = GetCmd;
    const NAME: &'static str = "get";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn process_single_command(
        &self,
        cmd: &mut GetCmd,
        options: &Options,
        _: &dyn Transcoder,
        _: &mut BufManager,
    ) -> ClientResult<()> {
        let exptime = extract_ttl(options)?;
        if self.lock && exptime == 0 {
            return Err(Error::argument("Lock must have TTL", None));
        }
        cmd.exptime = exptime;
        cmd.lock = self.lock;
        Ok(())
    }
    fn no_format(&self) -> bool {
        self.no_format
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<GetCmd>,
    ) -> StatusCode {
        instance.get(cookie, batch)
    }
}

#[derive(Debug, Clone)]
/// A get that also locks the document for `ttl` seconds
pub struct Lock(Get);

impl Lock {
    pub fn new(opts: LockOptions) -> Self {
        Self(Get {
            lock: true,
            no_format: false,
            defaults: Options::default().with_ttl(opts.ttl),
        })
    }
}

impl CommandKind for Lock {
    type Cmd = GetCmd;
    const NAME: &'static str = "lock";
    fn defaults(&self) -> &Options {
        self.0.defaults()
    }
    fn process_single_command(
        &self,
        cmd: &mut GetCmd,
        options: &Options,
        tc: &dyn Transcoder,
        bufs: &mut BufManager,
    ) -> ClientResult<()> {
        self.0.process_single_command(cmd, options, tc, bufs)
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<GetCmd>,
    ) -> StatusCode {
        instance.get(cookie, batch)
    }
}

/*
    remove
*/

#[derive(Debug, Clone)]
pub struct Remove {
    defaults: Options,
}

impl Remove {
    pub fn new(opts: RemoveOptions) -> Self {
        Self {
            defaults: Options::default().with_cas(opts.cas),
        }
    }
}

impl CommandKind for Remove {
    type Cmd = RemoveCmd;
    const NAME: &'static str = "remove";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn convert_to_koptions(&self, v: Value) -> ClientResult<Options> {
        integer_cas(v)
    }
    fn process_single_command(
        &self,
        cmd: &mut RemoveCmd,
        options: &Options,
        _: &dyn Transcoder,
        _: &mut BufManager,
    ) -> ClientResult<()> {
        cmd.cas = extract_cas(options);
        Ok(())
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<RemoveCmd>,
    ) -> StatusCode {
        instance.remove(cookie, batch)
    }
}

/*
    counter
*/

#[derive(Debug, Clone)]
/// Increment or decrement
pub struct Counter {
    incr: bool,
    defaults: Options,
}

impl Counter {
    fn new(incr: bool, opts: CounterOptions) -> Self {
        let mut defaults = Options::default()
            .with_amount(opts.amount)
            .with_ttl(opts.ttl);
        defaults.initial = opts.initial;
        Self { incr, defaults }
    }
    pub fn incr(opts: CounterOptions) -> Self {
        Self::new(true, opts)
    }
    pub fn decr(opts: CounterOptions) -> Self {
        Self::new(false, opts)
    }
}

impl CommandKind for Counter {
    type Cmd = CounterCmd;
    const NAME: &'static str = "counter";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn process_single_command(
        &self,
        cmd: &mut CounterCmd,
        options: &Options,
        _: &dyn Transcoder,
        _: &mut BufManager,
    ) -> ClientResult<()> {
        let amount = options.amount.unwrap_or(1);
        cmd.delta = if self.incr {
            amount
        } else {
            amount
                .checked_neg()
                .ok_or_else(|| Error::argument("Invalid amount", Some(amount.to_string())))?
        };
        if let Some(initial) = options.initial {
            cmd.initial = initial;
            cmd.create = true;
        }
        cmd.exptime = extract_ttl(options)?;
        Ok(())
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<CounterCmd>,
    ) -> StatusCode {
        instance.counter(cookie, batch)
    }
}

/*
    unlock
*/

#[derive(Debug, Clone)]
pub struct Unlock {
    defaults: Options,
}

impl Unlock {
    pub fn new(opts: UnlockOptions) -> Self {
        Self {
            defaults: Options::default().with_cas(opts.cas),
        }
    }
}

impl CommandKind for Unlock {
    type Cmd = UnlockCmd;
    const NAME: &'static str = "unlock";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn convert_to_koptions(&self, v: Value) -> ClientResult<Options> {
        integer_cas(v)
    }
    fn process_single_command(
        &self,
        cmd: &mut UnlockCmd,
        options: &Options,
        _: &dyn Transcoder,
        _: &mut BufManager,
    ) -> ClientResult<()> {
        let cas = extract_cas(options);
        if cas == 0 {
            return Err(Error::argument("Must have CAS for unlock", None));
        }
        cmd.cas = cas;
        Ok(())
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<UnlockCmd>,
    ) -> StatusCode {
        instance.unlock(cookie, batch)
    }
}

/*
    touch
*/

#[derive(Debug, Clone)]
pub struct Touch {
    defaults: Options,
}

impl Touch {
    pub fn new(opts: TouchOptions) -> Self {
        Self {
            defaults: Options::default().with_ttl(opts.ttl),
        }
    }
}

impl CommandKind for Touch {
    type Cmd = TouchCmd;
    const NAME: &'static str = "touch";
    fn defaults(&self) -> &Options {
        &self.defaults
    }
    fn convert_to_koptions(&self, v: Value) -> ClientResult<Options> {
        match v.as_i64() {
            Some(ttl) => Ok(Options::default().with_ttl(ttl)),
            None => Err(Error::argument("Invalid TTL", Some(format!("{:?}", v)))),
        }
    }
    fn process_single_command(
        &self,
        cmd: &mut TouchCmd,
        options: &Options,
        _: &dyn Transcoder,
        _: &mut BufManager,
    ) -> ClientResult<()> {
        cmd.exptime = extract_ttl(options)?;
        Ok(())
    }
    fn submit(
        instance: &mut dyn Instance,
        cookie: &Cookie,
        batch: &CommandBatch<TouchCmd>,
    ) -> StatusCode {
        instance.touch(cookie, batch)
    }
}

#[cfg(test)]
use {
    super::{CommandContext, Items},
    crate::transcoder::DefaultTranscoder,
};

#[test]
fn t_append_defaults_to_utf8() {
    let ctx = CommandContext::new(
        Store::new(StoreMode::Append, StoreOptions::default(), Format::Json),
        &DefaultTranscoder,
    );
    let batch = ctx.build(Items(vec![("k", "tail")])).unwrap();
    let cmd = batch.iter().next().unwrap();
    assert_eq!(batch.value(cmd), b"tail");
    assert_eq!(cmd.flags, Format::Utf8.flags());
    assert_eq!(cmd.operation, StoreMode::Append);
}

#[test]
fn t_store_without_value_fails() {
    let ctx = CommandContext::new(
        Store::new(StoreMode::Upsert, StoreOptions::default(), Format::Json),
        &DefaultTranscoder,
    );
    assert!(matches!(ctx.build(vec!["a"]), Err(Error::ValueFormat { .. })));
}

#[test]
fn t_get_rejects_scalar_options() {
    let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
    match ctx.build(Items(vec![("a", 10u64)])) {
        Err(Error::Argument { message, .. }) => assert_eq!(message, "Options expected"),
        other => panic!("unexpected: {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn t_touch_and_unlock_scalars() {
    let touch = CommandContext::new(Touch::new(TouchOptions::default()), &DefaultTranscoder);
    let batch = touch.build(Items(vec![("a", 30u64)])).unwrap();
    assert_eq!(batch.iter().next().unwrap().exptime, 30);
    assert!(touch.build(Items(vec![("a", "soon")])).is_err());
    let unlock = CommandContext::new(Unlock::new(UnlockOptions::default()), &DefaultTranscoder);
    let batch = unlock.build(Items(vec![("a", 42u64)])).unwrap();
    assert_eq!(batch.iter().next().unwrap().cas, 42);
    match unlock.build(Items(vec![("a", "x")])) {
        Err(Error::Argument { message, .. }) => assert_eq!(message, "Invalid CAS"),
        other => panic!("unexpected: {:?}", other.map(|b| b.len())),
    }
}
