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

//! The temporal engine (spec §4.3): save, load-by-id, load-by-key, query,
//! delete, drop. Everything else in this crate exists to support this one
//! component — it is the ~45% of the core's budget spec.md sets aside for
//! it.
//!
//! Grounded on the relationship between `risingwave_meta`'s
//! `MetaSrvEnv`/`MetaStore` and the storage-layer `StateStore` trait: a
//! single, long-lived owner of backend access plus the caches that make
//! repeated calls cheap, with every mutating path gated by a read-only
//! check the way `risingwave_meta`'s catalog manager gates on cluster state.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::backend::{Backend, Collection, Filter, Sort, StoredDocument};
use crate::config::{DataSourceConfig, InstanceType};
use crate::dataset::DataSet;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::query::Query;
use crate::record::{is_tombstone, IndexDeclaration, Record, RecordEnvelope, RootType, SortDirection};
use crate::record_id::{OrderedIdGenerator, RecordId};
use crate::registry::DatasetRegistry;

/// A process-wide scoped resource with `{name, backend handle, readOnly
/// flag, as-of cutoff, caches}` (spec §4.3.1). Initialized once per
/// configuration; there is no explicit teardown beyond dropping it, since
/// the only owned resource is the shared `Arc<dyn Backend>` handle.
pub struct DataSource {
    name: String,
    backend: Arc<dyn Backend>,
    read_only: bool,
    instance_type: InstanceType,
    cutoff: Option<RecordId>,
    id_gen: OrderedIdGenerator,
    registry: DatasetRegistry,
    ensured_indexes: RwLock<HashSet<String>>,
}

impl DataSource {
    pub fn new(config: DataSourceConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        let cutoff = config.cutoff()?;
        let read_only = config.is_read_only();
        Ok(DataSource {
            name: config.name,
            backend,
            read_only,
            instance_type: config.instance_type,
            cutoff,
            id_gen: OrderedIdGenerator::new(),
            registry: DatasetRegistry::new(cutoff),
            ensured_indexes: RwLock::new(HashSet::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `isReadOnly()` (spec §4.3.1): true iff explicitly read-only or an
    /// as-of cutoff is in force.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn cutoff(&self) -> Option<RecordId> {
        self.cutoff
    }

    /// Clears the `DatasetRegistry` caches (spec §4.2 `clearCache`).
    pub fn clear_cache(&self) {
        self.registry.clear_cache();
    }

    /// `getLookupList(D)` (spec §4.2), with the dataset-imports fetch wired
    /// to this DataSource's own backend.
    pub async fn lookup_list(&self, load_from: RecordId) -> Result<Vec<RecordId>> {
        self.registry.lookup_list(load_from, |id| self.fetch_dataset_imports(id)).await
    }

    /// `getOrEmpty(name, loadFrom)` (spec §4.2): cached id for `name`, or a
    /// single load from storage, or `Empty` if the dataset doesn't exist
    /// anywhere visible from `load_from`.
    pub async fn dataset_id(&self, name: &str, load_from: RecordId) -> Result<RecordId> {
        if let Some(id) = self.registry.cached_id_for_name(name) {
            return Ok(id);
        }
        let id = match self.winning_document::<DataSet>(name, load_from).await? {
            Some(doc) if !is_tombstone(&doc.type_chain) => doc.id,
            _ => RecordId::EMPTY,
        };
        if !id.is_empty() {
            self.registry.remember_name(name, id);
        }
        Ok(id)
    }

    async fn fetch_dataset_imports(&self, id: RecordId) -> Result<Option<Vec<RecordId>>> {
        if id.is_empty() {
            return Ok(None);
        }
        let collection = self.backend.collection(DataSet::root_type_name());
        let filter = Filter::new(move |doc: &StoredDocument| doc.id == id);
        match collection.find_one(&filter, &Sort::new()).await? {
            None => Ok(None),
            Some(doc) => {
                let ds: DataSet = serde_json::from_value(doc.payload).map_err(|e| Error::BackendError(e.into()))?;
                Ok(Some(ds.imports))
            }
        }
    }

    /// `saveDataSet(ds, saveTo)` (spec §4.2/§3): unlike generic [`Self::save`],
    /// validates that `ds` would not appear in its own transitive imports
    /// before writing (spec §3's DataSet invariant) and remembers the new
    /// name→id mapping on success.
    pub async fn save_dataset(&self, ds: DataSet, save_to: RecordId) -> Result<RecordEnvelope<DataSet>> {
        if self.is_read_only() {
            return Err(Error::ReadOnlyViolation);
        }
        let id = self.id_gen.next();
        self.registry
            .check_no_self_cycle(id, &ds.imports, |target| self.fetch_dataset_imports(target))
            .await?;
        let envelope = self.write_record(id, save_to, ds).await?;
        self.registry.remember_name(&envelope.payload.name, id);
        tracing::info!(%id, dataset = %save_to, name = %envelope.payload.name, "saved dataset");
        Ok(envelope)
    }

    /// `save(record, saveTo)` (spec §4.3.2).
    pub async fn save<T: Record>(&self, payload: T, save_to: RecordId) -> Result<RecordEnvelope<T>> {
        if self.is_read_only() {
            return Err(Error::ReadOnlyViolation);
        }
        let id = self.id_gen.next();
        self.write_record(id, save_to, payload).await
    }

    /// Sequential sugar over repeated [`Self::save`] (SPEC_FULL §4.3
    /// supplemental): strictly increasing ids in slice order, not a
    /// transaction.
    pub async fn save_many<T: Record>(&self, payloads: Vec<T>, save_to: RecordId) -> Result<Vec<RecordEnvelope<T>>> {
        let mut out = Vec::with_capacity(payloads.len());
        for payload in payloads {
            out.push(self.save(payload, save_to).await?);
        }
        Ok(out)
    }

    async fn write_record<T: Record>(&self, id: RecordId, save_to: RecordId, payload: T) -> Result<RecordEnvelope<T>> {
        let key = payload.canonical_key()?;
        let collection = self.collection_for::<T>().await?;
        let type_chain: Vec<String> = T::type_chain().into_iter().map(str::to_string).collect();
        let value: Value = serde_json::to_value(&payload).map_err(|e| Error::BackendError(e.into()))?;
        let doc = StoredDocument {
            id,
            dataset: save_to,
            key: key.clone(),
            type_chain,
            payload: value,
        };
        collection.insert_one(doc).await?;
        tracing::debug!(%id, dataset = %save_to, key, type_name = T::type_name(), "saved record");
        Ok(RecordEnvelope {
            id,
            dataset: save_to,
            key,
            payload,
        })
    }

    /// `loadOrNull(id)` (spec §4.3.3): returns a tombstone unchanged if `T`
    /// is requested as `DeletedRecord`, fails with `TypeMismatch` if the
    /// stored type is not a subtype of `T` otherwise.
    pub async fn load_or_null_by_id<T: Record>(&self, id: RecordId) -> Result<Option<RecordEnvelope<T>>> {
        let collection = self.collection_for::<T>().await?;
        let filter = Filter::new(move |doc: &StoredDocument| doc.id == id);
        match collection.find_one(&filter, &Sort::new()).await? {
            None => Ok(None),
            Some(doc) => {
                if !crate::record::chain_contains(&doc.type_chain, T::type_name()) {
                    return Err(Error::TypeMismatch { requested: T::type_name() });
                }
                Ok(Some(self.decode(doc)?))
            }
        }
    }

    /// Non-`OrNull` point load: fails with `NotFound` instead of returning
    /// `None` (spec §7).
    pub async fn load_by_id<T: Record>(&self, id: RecordId) -> Result<RecordEnvelope<T>> {
        self.load_or_null_by_id(id).await?.ok_or(Error::NotFound(id))
    }

    /// `loadOrNull(key, loadFrom)` (spec §4.3.4): dataset precedence then
    /// version precedence, masking tombstones and foreign types.
    pub async fn load_or_null<T: Record>(&self, key: &str, load_from: RecordId) -> Result<Option<RecordEnvelope<T>>> {
        match self.winning_document::<T>(key, load_from).await? {
            None => Ok(None),
            Some(doc) => {
                if is_tombstone(&doc.type_chain) || !crate::record::chain_contains(&doc.type_chain, T::type_name()) {
                    return Ok(None);
                }
                Ok(Some(self.decode(doc)?))
            }
        }
    }

    /// SPEC_FULL §4.3 supplemental: same lookup as [`Self::load_or_null`]
    /// without deserializing the payload.
    pub async fn exists<T: Record>(&self, key: &str, load_from: RecordId) -> Result<bool> {
        match self.winning_document::<T>(key, load_from).await? {
            None => Ok(false),
            Some(doc) => Ok(!is_tombstone(&doc.type_chain) && crate::record::chain_contains(&doc.type_chain, T::type_name())),
        }
    }

    /// Steps 1–4 of spec §4.3.4: restrict to the lookup list and cutoff,
    /// sort by `(DataSet desc, Id desc)`, take the first match. Returns the
    /// raw document — callers decide how to mask tombstones/foreign types.
    async fn winning_document<T: Record>(&self, key: &str, load_from: RecordId) -> Result<Option<StoredDocument>> {
        let collection = self.collection_for::<T>().await?;
        let allowed: HashSet<RecordId> = self.lookup_list(load_from).await?.into_iter().collect();
        let cutoff = self.cutoff;
        let key_owned = key.to_string();
        let filter = Filter::new(move |doc: &StoredDocument| {
            doc.key == key_owned && allowed.contains(&doc.dataset) && cutoff.map_or(true, |c| doc.id <= c)
        });
        let sort = Sort::new()
            .then(|a: &StoredDocument, b: &StoredDocument| b.dataset.cmp(&a.dataset))
            .then(|a: &StoredDocument, b: &StoredDocument| b.id.cmp(&a.id));
        collection.find_one(&filter, &sort).await
    }

    /// `query(T, loadFrom)` (spec §4.3.5): returns a builder; see
    /// [`crate::query::Query`].
    pub fn query<T: Record>(&self, load_from: RecordId) -> Query<'_, T> {
        Query::new(self, load_from)
    }

    /// Compiles and runs a [`Query`]: restricts to the lookup list and
    /// cutoff, applies the caller's sort with the `(DataSet desc, Id desc)`
    /// tie-breaker appended, then single-pass de-duplicates by key,
    /// masking tombstones and foreign types (spec §4.3.5).
    pub(crate) async fn execute_query<T: Record>(
        &self,
        filter: Filter,
        caller_sort: Sort,
        load_from: RecordId,
    ) -> Result<Vec<RecordEnvelope<T>>> {
        use futures::StreamExt;

        let collection = self.collection_for::<T>().await?;
        let allowed: HashSet<RecordId> = self.lookup_list(load_from).await?.into_iter().collect();
        let cutoff = self.cutoff;
        let restricted = Filter::new(move |doc: &StoredDocument| {
            allowed.contains(&doc.dataset) && cutoff.map_or(true, |c| doc.id <= c)
        })
        .and(filter);
        let full_sort = caller_sort
            .then(|a: &StoredDocument, b: &StoredDocument| b.dataset.cmp(&a.dataset))
            .then(|a: &StoredDocument, b: &StoredDocument| b.id.cmp(&a.id));

        let mut stream = collection.find(restricted, full_sort).await?;
        let mut emitted: HashSet<String> = HashSet::new();
        let mut results = Vec::new();
        while let Some(doc) = stream.next().await {
            let doc = doc?;
            if emitted.contains(&doc.key) {
                continue;
            }
            emitted.insert(doc.key.clone());
            if is_tombstone(&doc.type_chain) {
                continue;
            }
            if !crate::record::chain_contains(&doc.type_chain, T::type_name()) {
                continue;
            }
            results.push(self.decode::<T>(doc)?);
        }
        Ok(results)
    }

    /// `delete(key, deleteIn)` (spec §4.3.6): writes a tombstone
    /// unconditionally, no pre-check that a visible record exists.
    pub async fn delete<T: Record>(&self, key: &str, delete_in: RecordId) -> Result<RecordId> {
        if self.is_read_only() {
            return Err(Error::ReadOnlyViolation);
        }
        let id = self.id_gen.next();
        let collection = self.collection_for::<T>().await?;
        let doc = StoredDocument {
            id,
            dataset: delete_in,
            key: key.to_string(),
            type_chain: vec![crate::record::TOMBSTONE_TYPE_NAME.to_string()],
            payload: serde_json::json!({}),
        };
        collection.insert_one(doc).await?;
        tracing::debug!(%id, dataset = %delete_in, key, "wrote tombstone");
        Ok(id)
    }

    /// `dropDatabase()` (spec §4.3.7): irreversible, fails with
    /// `ReadOnlyViolation` when read-only, `PolicyViolation` on PROD/UAT.
    pub async fn drop_database(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnlyViolation);
        }
        if self.instance_type.forbids_drop() {
            return Err(Error::PolicyViolation {
                instance_type: self.instance_type,
            });
        }
        self.backend.drop_all().await?;
        self.registry.clear_cache();
        self.ensured_indexes.write().clear();
        tracing::warn!(name = %self.name, "dropped database");
        Ok(())
    }

    /// Ensures the system index `(Key asc, DataSet desc, Id desc)` plus any
    /// `T`-declared indexes exist on `T`'s collection, once per collection
    /// per `DataSource` instance (spec §4.3.8). The check is read-then-act
    /// rather than holding a write lock across the `ensure_index` awaits,
    /// so a race just means two redundant (idempotent) ensure calls.
    async fn collection_for<T: Record>(&self) -> Result<Arc<dyn Collection>> {
        let root = T::root_type_name();
        let collection = self.backend.collection(root);
        if self.ensured_indexes.read().contains(root) {
            return Ok(collection);
        }
        collection
            .ensure_index(&IndexDeclaration {
                name: Some("system_key_dataset_id".to_string()),
                fields: vec![
                    ("_key".to_string(), SortDirection::Asc),
                    ("_dataset".to_string(), SortDirection::Desc),
                    ("_id".to_string(), SortDirection::Desc),
                ],
            })
            .await?;
        for decl in T::declared_indexes() {
            collection.ensure_index(&decl).await?;
        }
        self.ensured_indexes.write().insert(root.to_string());
        Ok(collection)
    }

    fn decode<T: Record>(&self, doc: StoredDocument) -> Result<RecordEnvelope<T>> {
        let payload: T = serde_json::from_value(doc.payload).map_err(|e| Error::BackendError(e.into()))?;
        Ok(RecordEnvelope {
            id: doc.id,
            dataset: doc.dataset,
            key: doc.key,
            payload,
        })
    }
}

/// Convenience accepting an already-parsed [`Key`] instead of its canonical
/// string, for callers that built the key programmatically rather than
/// receiving it as text.
impl DataSource {
    pub async fn load_or_null_by_parts<T: Record>(&self, key: &Key, load_from: RecordId) -> Result<Option<RecordEnvelope<T>>> {
        self.load_or_null(&key.canonical_string()?, load_from).await
    }
}
