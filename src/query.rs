// Copyright 2024 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Composable predicate/sort builder (spec §4.4). States: building
//! (`where_`/`sort_by`/`sort_by_descending` return `Self`) → compiled →
//! exhausted (both folded into [`Query::execute`], which consumes the
//! builder). Rust's ownership rules do the enforcing here rather than a
//! runtime state flag: once `execute` has taken `self` by value, there is
//! no way to call `where_` again — a stronger guarantee than spec.md asks
//! for, not a weaker one.

use std::marker::PhantomData;

use crate::backend::{Filter, Sort, StoredDocument};
use crate::datasource::DataSource;
use crate::error::Result;
use crate::record::{Record, RecordEnvelope};
use crate::record_id::RecordId;

/// A query over the collection backing `T`'s root type, restricted to the
/// dataset lookup list expanded from `load_from` (spec §4.3.5). Callers
/// cannot disable the lookup-list restriction or the temporal tie-breaker —
/// `execute` always injects them.
pub struct Query<'a, T: Record> {
    data_source: &'a DataSource,
    load_from: RecordId,
    filter: Filter,
    sort: Sort,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Record> Query<'a, T> {
    pub(crate) fn new(data_source: &'a DataSource, load_from: RecordId) -> Self {
        Query {
            data_source,
            load_from,
            filter: Filter::all(),
            sort: Sort::new(),
            _marker: PhantomData,
        }
    }

    /// Conjunctive predicate over the typed payload. Compiled down to a
    /// backend predicate over the raw document by deserializing each
    /// candidate as `T` — a document that fails to deserialize as `T` (e.g.
    /// belongs to an unrelated subtype) is treated as non-matching rather
    /// than propagating the deserialization error, since the type-chain
    /// filter in [`Self::execute`] is what's responsible for excluding
    /// foreign types, not this predicate.
    pub fn where_(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.filter = self.filter.and(Filter::new(move |doc: &StoredDocument| {
            serde_json::from_value::<T>(doc.payload.clone())
                .map(|payload| predicate(&payload))
                .unwrap_or(false)
        }));
        self
    }

    /// Stable ascending sort, composed in call order (earlier calls are the
    /// more significant sort key, ties broken by later calls).
    pub fn sort_by<K: Ord>(self, key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        self.add_sort(key_fn, false)
    }

    pub fn sort_by_descending<K: Ord>(self, key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        self.add_sort(key_fn, true)
    }

    fn add_sort<K: Ord>(mut self, key_fn: impl Fn(&T) -> K + Send + Sync + 'static, descending: bool) -> Self {
        self.sort = self.sort.then(move |a: &StoredDocument, b: &StoredDocument| {
            let ka = serde_json::from_value::<T>(a.payload.clone()).ok().map(|p| key_fn(&p));
            let kb = serde_json::from_value::<T>(b.payload.clone()).ok().map(|p| key_fn(&p));
            if descending {
                kb.cmp(&ka)
            } else {
                ka.cmp(&kb)
            }
        });
        self
    }

    /// Compiles and runs the query (spec §4.3.5 steps 1–4): restricts to
    /// the lookup list and cutoff, appends `(DataSet desc, Id desc)` after
    /// the caller's sort, then single-pass de-duplicates by key, masking
    /// tombstones and foreign types.
    pub async fn execute(self) -> Result<Vec<RecordEnvelope<T>>> {
        self.data_source.execute_query::<T>(self.filter, self.sort, self.load_from).await
    }
}
