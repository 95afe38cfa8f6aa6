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

use crate::transcoder::{Format, Value};

#[derive(Debug, Clone, Default, PartialEq)]
/// Per-item options
///
/// Unset fields fall through to the operation level defaults (see [`Options::merged`])
pub struct Options {
    pub cas: Option<u64>,
    pub ttl: Option<i64>,
    pub value: Option<Value>,
    pub format: Option<Format>,
    pub amount: Option<i64>,
    pub initial: Option<u64>,
}

impl Options {
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = Some(cas);
        self
    }
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn with_initial(mut self, initial: u64) -> Self {
        self.initial = Some(initial);
        self
    }
    /// Layer `over` on top of `self`. Fields set in `over` win
    pub fn merged(&self, over: Options) -> Options {
        Options {
            cas: over.cas.or(self.cas),
            ttl: over.ttl.or(self.ttl),
            value: over.value.or_else(|| self.value.clone()),
            format: over.format.or(self.format),
            amount: over.amount.or(self.amount),
            initial: over.initial.or(self.initial),
        }
    }
}

#[test]
fn t_merge_later_wins() {
    let defaults = Options::default().with_cas(0).with_ttl(10).with_format(Format::Json);
    let merged = defaults.merged(Options::default().with_ttl(20).with_value("x"));
    assert_eq!(merged.cas, Some(0));
    assert_eq!(merged.ttl, Some(20));
    assert_eq!(merged.format, Some(Format::Json));
    assert_eq!(merged.value, Some(Value::from("x")));
}
