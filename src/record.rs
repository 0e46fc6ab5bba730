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

//! Record reflection and envelope types. A record has `{Id, DataSet, Key,
//! payload}` (spec §3); the runtime type of the payload is part of what's
//! persisted (`_t`, spec §6) and is what makes one collection hold a root
//! type and all its subtypes (spec §9 "Polymorphic records in one
//! collection").
//!
//! This mirrors the split the teacher's `MetadataModel` trait makes between
//! the typed model and its wire encoding
//! (`examples/RisingwaveLabs-risingwave/rust/meta/src/model/mod.rs`), with
//! protobuf replaced by `serde` since the backend contract here is a
//! generic document, not an RPC message.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::key::{Key, KeyToken, KeyTokenShape};
use crate::record_id::RecordId;

/// Reserved `_t` leaf for tombstone records (spec §6).
pub const TOMBSTONE_TYPE_NAME: &str = "DeletedRecord";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDeclaration {
    pub name: Option<String>,
    pub fields: Vec<(String, SortDirection)>,
}

/// Reflection: identifies a concrete payload type's place in its type
/// hierarchy, used to select a shared collection (by root type) and to
/// filter polymorphically on load/query (spec §4.3.3–§4.3.5).
pub trait RootType: Send + Sync + 'static {
    /// This type's own name.
    fn type_name() -> &'static str;

    /// The class directly derived from the generic record base; all
    /// subtypes of it share one collection (spec §6).
    fn root_type_name() -> &'static str;

    /// Ordered type names from this type (leaf) to the root, inclusive.
    fn type_chain() -> Vec<&'static str>;
}

/// Reflection: the ordered key-field list of a record type, plus how to
/// read those fields off an instance.
pub trait KeyFields {
    fn key_shape() -> Vec<KeyTokenShape>;
    fn key_tokens(&self) -> Vec<KeyToken>;

    fn key(&self) -> Key {
        Key::new(self.key_tokens())
    }

    fn canonical_key(&self) -> Result<String> {
        self.key().canonical_string()
    }
}

/// Reflection: the declared index attributes of a record type (spec
/// §4.3.8). Defaults to none; most payload types only need the system
/// index the `DataSource` ensures on every collection.
pub trait IndexSpec {
    fn declared_indexes() -> Vec<IndexDeclaration> {
        Vec::new()
    }
}

/// A persistable payload type: reflected for collection/key purposes and
/// (de)serializable to the document format a [`crate::backend::Backend`]
/// stores.
pub trait Record:
    RootType + KeyFields + IndexSpec + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
}

impl<T> Record for T where
    T: RootType + KeyFields + IndexSpec + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
}

/// Returns true if `requested_type_name` appears anywhere in a stored
/// document's type chain — i.e. the stored type is `requested_type_name`
/// or one of its subtypes (spec §4.3.4/§4.3.5: "payload is not a subtype of
/// the caller-requested root type").
pub fn chain_contains(stored_chain: &[String], requested_type_name: &str) -> bool {
    stored_chain.iter().any(|t| t == requested_type_name)
}

/// A stored document's type chain identifies it as a tombstone iff its leaf
/// (first element) is the reserved [`TOMBSTONE_TYPE_NAME`] (spec §4.3.4/§6).
pub fn is_tombstone(stored_chain: &[String]) -> bool {
    stored_chain.first().map(String::as_str) == Some(TOMBSTONE_TYPE_NAME)
}

/// An in-memory, fully typed record: `{Id, DataSet, Key, payload}` (spec
/// §3). Returned by [`crate::datasource::DataSource`] loads/queries and
/// passed back in to `save`/`delete`.
#[derive(Clone, Debug)]
pub struct RecordEnvelope<T> {
    pub id: RecordId,
    pub dataset: RecordId,
    pub key: String,
    pub payload: T,
}

impl<T: RootType + KeyFields> RecordEnvelope<T> {
    /// A freshly constructed record, not yet assigned an id or homed in a
    /// dataset — both are set by `DataSource::save` (spec §4.3.2), which
    /// ignores whatever `dataset` was set here.
    pub fn new(payload: T) -> Self {
        let key = payload.canonical_key().unwrap_or_default();
        RecordEnvelope {
            id: RecordId::EMPTY,
            dataset: RecordId::EMPTY,
            key,
            payload,
        }
    }

    pub fn type_chain(&self) -> Vec<&'static str> {
        T::type_chain()
    }
}
