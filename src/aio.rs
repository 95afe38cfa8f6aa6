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

//! # Async row delivery
//!
//! On an async connection rows are pushed to the [`MultiResult`] callback from inside the event
//! loop. [`channel`] installs a callback (and errback) that forwards those flushes to a tokio
//! channel, so that the rows can be awaited from a task.
//!
//! ```no_run
//! # async fn run(con: lcbind::Connection) -> lcbind::ClientResult<()> {
//! use lcbind::{aio, query::n1ql::{N1qlParams, N1qlQuery}};
//!
//! let q = N1qlQuery::new(N1qlParams::with_statement("SELECT 1")?);
//! let result = con.n1ql_query(q)?;
//! let rows = aio::channel(&result);
//! con.wait()?;
//! let rows = rows.collect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! A channel opened on a result that has already completed delivers whatever rows are still
//! buffered, then the recorded error (if any), and closes. Results of a sync connection are
//! drained with `fetch`; a channel opened on one of them is closed from the start.
//!
//! [`MultiResult`]: crate::MultiResult

use {
    crate::{
        error::{ClientResult, Error},
        query::{QueryProtocol, StreamingResult},
    },
    tokio::sync::mpsc,
};

enum Delivery<R> {
    Rows(Vec<R>),
    Failed(Error),
    Done,
}

/// The receiving half created by [`channel`]
pub struct RowReceiver<R> {
    rx: mpsc::UnboundedReceiver<Delivery<R>>,
    finished: bool,
}

/// Forward every flush of `result` to the returned receiver
///
/// This replaces any callback and errback registered on the result's
/// [`MultiResult`](crate::MultiResult).
pub fn channel<P: QueryProtocol + 'static>(result: &StreamingResult<P>) -> RowReceiver<P::Row> {
    let (tx, rx) = mpsc::unbounded_channel();
    if !result.is_async() {
        return RowReceiver { rx, finished: true };
    }
    let mres = result.multi_result();
    if mres.is_done() {
        // nothing will be flushed anymore
        let rows = result.take_buffered();
        if !rows.is_empty() {
            let _ = tx.send(Delivery::Rows(rows));
        }
        if let Err(e) = mres.maybe_throw() {
            let _ = tx.send(Delivery::Failed(e));
        }
        let _ = tx.send(Delivery::Done);
        return RowReceiver {
            rx,
            finished: false,
        };
    }
    let etx = tx.clone();
    mres.set_callback(move |mres, rows| {
        // a send only fails once the receiver is gone, and then nobody is listening
        if !rows.is_empty() {
            let _ = tx.send(Delivery::Rows(rows));
        }
        if mres.is_done() {
            let _ = tx.send(Delivery::Done);
        }
    });
    mres.set_errback(move |_, e| {
        let _ = etx.send(Delivery::Failed(e));
        let _ = etx.send(Delivery::Done);
    });
    RowReceiver {
        rx,
        finished: false,
    }
}

impl<R> RowReceiver<R> {
    /// Receive the next batch of rows. Returns `None` once the result has completed
    pub async fn recv(&mut self) -> Option<ClientResult<Vec<R>>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Delivery::Rows(rows)) => Some(Ok(rows)),
            Some(Delivery::Failed(e)) => Some(Err(e)),
            Some(Delivery::Done) | None => {
                self.finished = true;
                None
            }
        }
    }
    /// Receive every remaining row
    pub async fn collect(mut self) -> ClientResult<Vec<R>> {
        let mut all = Vec::new();
        while let Some(rows) = self.recv().await {
            all.extend(rows?);
        }
        Ok(all)
    }
}
