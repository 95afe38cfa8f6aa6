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

/*
    Encoded buffers handed to the native library must stay alive until the native call that
    reads them returns. Everything encoded while building a batch is parked here and the
    manager is owned by the batch, so the buffers live exactly as long as the batch does.
*/

use {
    crate::error::{ClientResult, Error},
    bytes::Bytes,
};

fn fit_u32(n: usize, what: &str) -> ClientResult<u32> {
    u32::try_from(n).map_err(|_| Error::value_format(what, Some(n.to_string())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// A handle to a buffer owned by a [`BufManager`]
///
/// This is an index into the manager, not a pointer. The default handle refers to the empty
/// buffer
pub struct BufRef {
    idx: u32,
    len: u32,
}

impl BufRef {
    /// The length of the referenced buffer in bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Default)]
/// Owns transient encoded buffers for the duration of a native call
pub struct BufManager {
    // slot 0 is always the empty buffer
    bufs: Vec<Bytes>,
}

impl BufManager {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }
    /// Create a manager that expects to hold `cap` buffers
    pub fn with_capacity(cap: usize) -> Self {
        let mut bufs = Vec::with_capacity(cap + 1);
        bufs.push(Bytes::new());
        Self { bufs }
    }
    /// Take ownership of `buf` and return a handle to it
    ///
    /// Native records carry 32-bit lengths, so larger buffers are refused
    pub fn new_buf(&mut self, buf: impl Into<Bytes>) -> ClientResult<BufRef> {
        let buf = buf.into();
        if buf.is_empty() {
            return Ok(BufRef::default());
        }
        let r = BufRef {
            idx: fit_u32(self.bufs.len(), "too many buffers")?,
            len: fit_u32(buf.len(), "buffer too large")?,
        };
        self.bufs.push(buf);
        Ok(r)
    }
    /// Resolve a handle issued by this manager
    ///
    /// ## Panics
    /// Panics if the handle was issued by another manager and is out of range
    pub fn get(&self, r: BufRef) -> &[u8] {
        &self.bufs[r.idx as usize][..r.len as usize]
    }
    /// The number of non-empty buffers held
    pub fn count(&self) -> usize {
        self.bufs.len() - 1
    }
}

#[test]
fn t_bufmanager_handles_stay_valid() {
    let mut bm = BufManager::with_capacity(2);
    let a = bm.new_buf(&b"hello"[..]).unwrap();
    let empty = bm.new_buf(Vec::new()).unwrap();
    let b = bm.new_buf(String::from("world")).unwrap();
    assert_eq!(bm.get(a), b"hello");
    assert_eq!(bm.get(b), b"world");
    assert!(empty.is_empty());
    assert_eq!(bm.get(empty), b"");
    assert_eq!(bm.count(), 2);
}

#[test]
#[cfg(target_pointer_width = "64")]
fn t_oversized_lengths_are_refused() {
    assert_eq!(fit_u32(u32::MAX as usize, "buffer too large"), Ok(u32::MAX));
    match fit_u32(u32::MAX as usize + 1, "buffer too large") {
        Err(Error::ValueFormat { message, .. }) => assert_eq!(message, "buffer too large"),
        other => panic!("unexpected: {:?}", other),
    }
}
