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

//! # Multi-results
//!
//! A [`MultiResult`] collects everything that happens to one batch or one query: the results
//! reported by the native library, the errors recorded along the way, and (for async
//! connections) the callbacks that receive data as it arrives.
//!
//! Errors recorded here are deferred. They only surface when the caller asks for them with
//! [`MultiResult::maybe_throw`] (or implicitly, through a synchronous `fetch`), so that partial
//! results gathered so far are never thrown away.

use {
    crate::{
        error::{ClientResult, Error},
        status::StatusCode,
    },
    core::{
        cell::{Cell, RefCell},
        fmt,
    },
};

/// Receives delivered items (rows or results) along with the aggregator
pub type Callback<T> = Box<dyn FnMut(&MultiResult<T>, Vec<T>)>;
/// Receives the error that stopped an async delivery
pub type Errback<T> = Box<dyn FnMut(&MultiResult<T>, Error)>;

/// Collects results and errors across a batch or a query
pub struct MultiResult<T> {
    results: RefCell<Vec<T>>,
    errors: RefCell<Vec<Error>>,
    callback: RefCell<Option<Callback<T>>>,
    errback: RefCell<Option<Errback<T>>>,
    done: Cell<bool>,
}

impl<T> Default for MultiResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MultiResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiResult")
            .field("results", &self.results.borrow().len())
            .field("errors", &self.errors.borrow())
            .field("has_callback", &self.has_callback())
            .field("done", &self.done.get())
            .finish()
    }
}

impl<T> MultiResult<T> {
    pub fn new() -> Self {
        Self {
            results: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
            callback: RefCell::new(None),
            errback: RefCell::new(None),
            done: Cell::new(false),
        }
    }
    /// Register the callback used for async delivery
    pub fn set_callback(&self, cb: impl FnMut(&MultiResult<T>, Vec<T>) + 'static) {
        *self.callback.borrow_mut() = Some(Box::new(cb));
    }
    /// Register the callback that receives async delivery errors
    pub fn set_errback(&self, eb: impl FnMut(&MultiResult<T>, Error) + 'static) {
        *self.errback.borrow_mut() = Some(Box::new(eb));
    }
    pub fn has_callback(&self) -> bool {
        // a callback that is currently running has been taken out of its slot
        self.callback
            .try_borrow()
            .map(|cb| cb.is_some())
            .unwrap_or(false)
    }
    /// Record an error without raising it
    pub fn add_err(&self, e: Error) {
        tracing::warn!(error = %e, "recorded error");
        self.errors.borrow_mut().push(e);
    }
    /// Record a nonzero native status reported for `source`
    pub fn add_bad_rc(&self, rc: StatusCode, source: &str) {
        self.add_err(Error::status(rc, source));
    }
    /// Returns the first recorded error, if any. Recorded errors are kept
    pub fn maybe_throw(&self) -> ClientResult<()> {
        match self.errors.borrow().first() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
    /// Returns every error recorded so far
    pub fn errors(&self) -> Vec<Error> {
        self.errors.borrow().clone()
    }
    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }
    /// Report a result. This is called by the native layer for key/value operations
    pub fn push_result(&self, r: T) {
        self.results.borrow_mut().push(r);
    }
    /// Take every result reported so far
    pub fn take_results(&self) -> Vec<T> {
        core::mem::take(&mut *self.results.borrow_mut())
    }
    pub fn result_count(&self) -> usize {
        self.results.borrow().len()
    }
    /// Returns true once the operation this aggregator tracks has completed
    pub fn is_done(&self) -> bool {
        self.done.get()
    }
    /// Mark the tracked operation as complete. The native layer calls this once every result
    /// of a key/value batch has been reported
    pub fn set_done(&self) {
        self.done.set(true)
    }
    /// Hand `items` to the registered callback. If there is none, the items are given back
    pub(crate) fn invoke_callback(&self, items: Vec<T>) -> Option<Vec<T>> {
        let cb = self.callback.borrow_mut().take();
        match cb {
            Some(mut cb) => {
                cb(self, items);
                let mut slot = self.callback.borrow_mut();
                if slot.is_none() {
                    *slot = Some(cb);
                }
                None
            }
            None => Some(items),
        }
    }
    /// Hand `e` to the registered errback, or record it if there is none
    pub(crate) fn invoke_errback(&self, e: Error) {
        let eb = self.errback.borrow_mut().take();
        match eb {
            Some(mut eb) => {
                eb(self, e);
                let mut slot = self.errback.borrow_mut();
                if slot.is_none() {
                    *slot = Some(eb);
                }
            }
            None => {
                tracing::warn!(error = %e, "async delivery failed with no errback registered");
            }
        }
    }
}

#[test]
fn t_maybe_throw_returns_first_error() {
    let mres: MultiResult<()> = MultiResult::new();
    assert_eq!(mres.maybe_throw(), Ok(()));
    mres.add_bad_rc(StatusCode::KeyNotFound, "a");
    mres.add_bad_rc(StatusCode::TempFail, "b");
    assert_eq!(
        mres.maybe_throw(),
        Err(Error::status(StatusCode::KeyNotFound, "a"))
    );
    assert_eq!(mres.errors().len(), 2);
}

#[test]
fn t_invoke_callback_without_callback_gives_items_back() {
    let mres: MultiResult<u8> = MultiResult::new();
    assert_eq!(mres.invoke_callback(vec![1, 2]), Some(vec![1, 2]));
    let seen = std::rc::Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    mres.set_callback(move |_, items| s.borrow_mut().extend(items));
    assert!(mres.has_callback());
    assert_eq!(mres.invoke_callback(vec![3]), None);
    assert_eq!(mres.invoke_callback(vec![4]), None);
    assert_eq!(*seen.borrow(), vec![3, 4]);
}
