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

//! The backend collection contract (spec §6): the only surface through
//! which [`crate::datasource::DataSource`] reaches physical storage.
//! [`MemoryBackend`] is a reference/test implementation, grounded on the
//! `BTreeMap` behind a `parking_lot::RwLock` in
//! `examples/RisingwaveLabs-risingwave/src/storage/src/memory.rs`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::IndexDeclaration;
use crate::record_id::RecordId;

/// A persisted document, carrying the fields spec §6 names at minimum:
/// `_id`, `_dataset`, `_key`, `_t`, plus payload fields flattened alongside
/// them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "_dataset")]
    pub dataset: RecordId,
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_t")]
    pub type_chain: Vec<String>,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// A compiled predicate over [`StoredDocument`]s — what `where` clauses in
/// [`crate::query::Query`] become once the builder is iterated.
pub struct Filter(Box<dyn Fn(&StoredDocument) -> bool + Send + Sync>);

impl Filter {
    pub fn new(f: impl Fn(&StoredDocument) -> bool + Send + Sync + 'static) -> Self {
        Filter(Box::new(f))
    }

    pub fn all() -> Self {
        Filter::new(|_| true)
    }

    pub fn matches(&self, doc: &StoredDocument) -> bool {
        (self.0)(doc)
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter::new(move |doc| self.matches(doc) && other.matches(doc))
    }
}

/// A compiled, composed sort order. Comparators are tried in the order they
/// were added — the first non-`Equal` result wins.
#[derive(Default)]
pub struct Sort(Vec<Box<dyn Fn(&StoredDocument, &StoredDocument) -> Ordering + Send + Sync>>);

impl Sort {
    pub fn new() -> Self {
        Sort(Vec::new())
    }

    pub fn then(mut self, cmp: impl Fn(&StoredDocument, &StoredDocument) -> Ordering + Send + Sync + 'static) -> Self {
        self.0.push(Box::new(cmp));
        self
    }

    pub fn compare(&self, a: &StoredDocument, b: &StoredDocument) -> Ordering {
        for cmp in &self.0 {
            let ord = cmp(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// One collection, shared by a root type and all its subtypes (spec §6/§9).
#[async_trait]
pub trait Collection: Send + Sync {
    async fn ensure_index(&self, decl: &IndexDeclaration) -> Result<()>;

    /// Atomic on the single document (spec §6).
    async fn insert_one(&self, doc: StoredDocument) -> Result<()>;

    async fn find_one(&self, filter: &Filter, sort: &Sort) -> Result<Option<StoredDocument>>;

    /// A finite, single-pass cursor; restartable only by calling again.
    async fn find(&self, filter: Filter, sort: Sort) -> Result<BoxStream<'static, Result<StoredDocument>>>;

    async fn drop(&self) -> Result<()>;
}

/// The storage driver collaborator: selects/creates collections by root
/// type name and supports an irreversible full drop.
#[async_trait]
pub trait Backend: Send + Sync {
    fn collection(&self, root_type: &str) -> Arc<dyn Collection>;

    async fn drop_all(&self) -> Result<()>;
}

struct MemoryCollection {
    docs: RwLock<BTreeMap<RecordId, StoredDocument>>,
    indexes: RwLock<HashSet<String>>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(HashSet::new()),
        }
    }

    fn snapshot(&self) -> Vec<StoredDocument> {
        self.docs.read().values().cloned().collect()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn ensure_index(&self, decl: &IndexDeclaration) -> Result<()> {
        let name = decl.name.clone().unwrap_or_else(|| {
            decl.fields
                .iter()
                .map(|(f, _)| f.as_str())
                .collect::<Vec<_>>()
                .join("_")
        });
        // Idempotent: a repeat declaration of the same name is a no-op, the
        // in-memory backend has no physical index to (re)build.
        self.indexes.write().insert(name);
        Ok(())
    }

    async fn insert_one(&self, doc: StoredDocument) -> Result<()> {
        self.docs.write().insert(doc.id, doc);
        Ok(())
    }

    async fn find_one(&self, filter: &Filter, sort: &Sort) -> Result<Option<StoredDocument>> {
        let mut matched: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect();
        matched.sort_by(|a, b| sort.compare(a, b));
        Ok(matched.into_iter().next())
    }

    async fn find(&self, filter: Filter, sort: Sort) -> Result<BoxStream<'static, Result<StoredDocument>>> {
        let mut matched: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect();
        matched.sort_by(|a, b| sort.compare(a, b));
        Ok(stream::iter(matched.into_iter().map(Ok)).boxed())
    }

    async fn drop(&self) -> Result<()> {
        self.docs.write().clear();
        self.indexes.write().clear();
        Ok(())
    }
}

/// In-process reference backend: one `BTreeMap<RecordId, StoredDocument>`
/// per root type, each behind its own `parking_lot::RwLock`. Used by the
/// test suite and as a runnable example of the [`Backend`] contract.
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn collection(&self, root_type: &str) -> Arc<dyn Collection> {
        if let Some(existing) = self.collections.read().get(root_type) {
            return existing.clone();
        }
        let mut collections = self.collections.write();
        collections
            .entry(root_type.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new()))
            .clone()
    }

    async fn drop_all(&self) -> Result<()> {
        self.collections.write().clear();
        Ok(())
    }
}
