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

use crate::transcoder::Format;

/// The default number of rows to buffer before an async flush
///
/// `0` flushes on every row
pub const DEFAULT_ROWS_PER_CALL: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How streaming results deliver their rows
pub enum Mode {
    /// Rows are buffered and drained by the caller with `fetch`
    Sync,
    /// Rows are pushed to the aggregator callback while the event loop runs
    Async,
}

#[derive(Debug, Clone, PartialEq)]
/// Configuration for a [`Connection`](crate::Connection)
pub struct Config {
    default_format: Format,
    mode: Mode,
    rows_per_call: i64,
    quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Format::Json, Mode::Sync)
    }
}

impl Config {
    /// Create a new [`Config`] using the given value format and dispatch mode
    pub fn new(default_format: Format, mode: Mode) -> Self {
        Self {
            default_format,
            mode,
            rows_per_call: DEFAULT_ROWS_PER_CALL,
            quiet: false,
        }
    }
    /// Create a new [`Config`] for async row delivery, with everything else defaulted
    pub fn new_async() -> Self {
        Self::new(Format::Json, Mode::Async)
    }
    /// Set the row threshold new streaming results start out with
    pub fn with_rows_per_call(mut self, rows_per_call: i64) -> Self {
        self.rows_per_call = rows_per_call;
        self
    }
    /// Set the default `quiet` flag for multi-key operations
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
    pub(crate) fn default_format(&self) -> Format {
        self.default_format
    }
    pub(crate) fn rows_per_call(&self) -> i64 {
        self.rows_per_call
    }
    pub(crate) fn quiet(&self) -> bool {
        self.quiet
    }
    pub(crate) fn is_async(&self) -> bool {
        self.mode == Mode::Async
    }
}
