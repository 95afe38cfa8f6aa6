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

//! # lcbind
//!
//! Marshalling for a native key/value and query client library. This crate turns bulk caller
//! input into fixed-layout command batches that a native client can consume, and drives the
//! streaming row protocol of view and N1QL queries on top of the native row callbacks.
//!
//! The native library itself is abstracted behind the [`Instance`](native::Instance) trait and
//! value encoding behind the [`Transcoder`](transcoder::Transcoder) trait.
//!
//! ## Example
//! ```no_run
//! use lcbind::{command::GetOptions, native::Instance, Config, Connection};
//!
//! fn fetch_users(instance: impl Instance + 'static) -> lcbind::ClientResult<()> {
//!     let con = Connection::new(instance, Config::default());
//!     let mres = con.get_multi(vec!["user:1", "user:2"], GetOptions::default())?;
//!     con.wait()?;
//!     mres.maybe_throw()
//! }
//! ```
//!

// internal modules
#[macro_use]
mod macros;
mod buffer;
// public modules
cfg_aio! {
    pub mod aio;
}
pub mod aggregator;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod native;
pub mod query;
pub mod result;
pub mod status;
pub mod transcoder;
// re-exports
pub use {
    aggregator::MultiResult,
    buffer::{BufManager, BufRef},
    config::{Config, Mode},
    connection::Connection,
    error::{ClientResult, Error},
    query::{
        n1ql::{N1qlParams, N1qlQuery},
        view::{ViewOptions, ViewQuery},
        StreamingResult,
    },
    status::StatusCode,
    transcoder::{DefaultTranscoder, Format, Key, Transcoder, Value},
};
