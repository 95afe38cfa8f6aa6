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
    Bulk input comes in two shapes: a sequence of keys (where every entry may also be a previous
    result) and a mapping of key to per-item spec. Both are turned into a `Batch`, which pairs a
    self-reported length with a lazy iterator over the entries. The length is trusted for
    allocation and checked against the iterator once it runs dry.
*/

use {
    super::options::Options,
    crate::{
        error::{ClientResult, Error},
        result::{KeyItem, OperationResult, ValueResult},
        transcoder::{Key, Value},
    },
    std::collections::{BTreeMap, HashMap},
};

/// The right hand side of a mapping entry
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSpec {
    /// Explicit options for this item
    Options(Options),
    /// A previous result; only its CAS is used
    Prior(u64),
    /// A bare value whose meaning depends on the operation (the value of a store, the CAS of
    /// an unlock, the TTL of a touch, ...)
    Scalar(Value),
}

impl From<Options> for ItemSpec {
    fn from(o: Options) -> Self {
        Self::Options(o)
    }
}

impl From<&OperationResult> for ItemSpec {
    fn from(r: &OperationResult) -> Self {
        Self::Prior(r.cas)
    }
}

impl From<OperationResult> for ItemSpec {
    fn from(r: OperationResult) -> Self {
        Self::Prior(r.cas)
    }
}

impl From<&ValueResult> for ItemSpec {
    fn from(r: &ValueResult) -> Self {
        Self::Prior(r.cas)
    }
}

impl_from_variant!(
    ItemSpec =>
        Scalar(Value, serde_json::Value, u64, i64, u32, i32, bool, f64, &str, String, Vec<u8>)
);

/// One input entry
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// An entry of a key sequence
    Key(KeyItem),
    /// An entry of a mapping
    Pair(KeyItem, ItemSpec),
}

/// Validated bulk input, ready to be built
pub struct Batch<'a> {
    /// The number of entries the input claims to have
    pub len: usize,
    pub entries: Box<dyn Iterator<Item = ClientResult<Entry>> + 'a>,
}

impl<'a> Batch<'a> {
    fn keys<T: Into<KeyItem>>(len: usize, iter: impl Iterator<Item = T> + 'a) -> Self {
        Self {
            len,
            entries: Box::new(iter.map(|k| Ok(Entry::Key(k.into())))),
        }
    }
    fn pairs<K: Into<KeyItem>, V: Into<ItemSpec>>(
        len: usize,
        iter: impl Iterator<Item = (K, V)> + 'a,
    ) -> Self {
        Self {
            len,
            entries: Box::new(iter.map(|(k, v)| Ok(Entry::Pair(k.into(), v.into())))),
        }
    }
}

/// Anything that can be used as the input of a multi-key operation
///
/// This is implemented for key sequences (`Vec`, slices and arrays of anything that converts
/// into a [`KeyItem`]), for mappings ([`HashMap`], [`BTreeMap`] and the order preserving
/// [`Items`]), for [`SizedIter`], and for dynamic [`serde_json::Value`] input.
pub trait IntoBatch<'a> {
    fn into_batch(self) -> ClientResult<Batch<'a>>;
}

impl<'a, T: Into<KeyItem> + 'a> IntoBatch<'a> for Vec<T> {
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::keys(self.len(), self.into_iter()))
    }
}

impl<'a, T: Clone + Into<KeyItem> + 'a> IntoBatch<'a> for &'a [T] {
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::keys(self.len(), self.iter().cloned()))
    }
}

impl<'a, T: Into<KeyItem> + 'a, const N: usize> IntoBatch<'a> for [T; N] {
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::keys(N, IntoIterator::into_iter(self)))
    }
}

impl<'a, K, V, S> IntoBatch<'a> for HashMap<K, V, S>
where
    K: Into<KeyItem> + 'a,
    V: Into<ItemSpec> + 'a,
    S: 'a,
{
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::pairs(self.len(), self.into_iter()))
    }
}

impl<'a, K, V> IntoBatch<'a> for BTreeMap<K, V>
where
    K: Into<KeyItem> + 'a,
    V: Into<ItemSpec> + 'a,
{
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::pairs(self.len(), self.into_iter()))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An ordered mapping of key to item spec
pub struct Items<K, V>(pub Vec<(K, V)>);

impl<'a, K, V> IntoBatch<'a> for Items<K, V>
where
    K: Into<KeyItem> + 'a,
    V: Into<ItemSpec> + 'a,
{
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::pairs(self.0.len(), self.0.into_iter()))
    }
}

/// A key iterator paired with the length it claims to have
///
/// The length is used to size the batch up front. If the iterator turns out to yield a
/// different number of keys, the build fails.
pub struct SizedIter<I> {
    len: usize,
    iter: I,
}

impl<I> SizedIter<I> {
    pub fn new(len: usize, iter: I) -> Self {
        Self { len, iter }
    }
}

impl<'a, I> IntoBatch<'a> for SizedIter<I>
where
    I: Iterator + 'a,
    I::Item: Into<KeyItem>,
{
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        Ok(Batch::keys(self.len, self.iter))
    }
}

impl<'a> IntoBatch<'a> for serde_json::Value {
    fn into_batch(self) -> ClientResult<Batch<'a>> {
        use serde_json::Value as Json;
        match self {
            Json::Array(items) => Ok(Batch {
                len: items.len(),
                entries: Box::new(items.into_iter().map(|item| match item {
                    Json::String(k) => Ok(Entry::Key(KeyItem::Key(Key::Str(k)))),
                    other => Err(Error::value_format(
                        "Key must be a string",
                        Some(other.to_string()),
                    )),
                })),
            }),
            Json::Object(map) => Ok(Batch {
                len: map.len(),
                entries: Box::new(map.into_iter().map(|(k, v)| {
                    Ok(Entry::Pair(
                        KeyItem::Key(Key::Str(k)),
                        ItemSpec::Scalar(Value::Json(v)),
                    ))
                })),
            }),
            other => Err(Error::argument("Bad sequence type", Some(other.to_string()))),
        }
    }
}

#[test]
fn t_json_scalars_are_rejected() {
    use serde_json::json;
    for bad in [json!(null), json!(true), json!(1), json!(1.5), json!("key")] {
        match bad.into_batch() {
            Err(Error::Argument { message, .. }) => assert_eq!(message, "Bad sequence type"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("scalar input accepted"),
        }
    }
}

#[test]
fn t_sized_iter_reports_declared_len() {
    let b = SizedIter::new(5, vec!["a", "b"].into_iter()).into_batch().unwrap();
    assert_eq!(b.len, 5);
    assert_eq!(b.entries.count(), 2);
}
