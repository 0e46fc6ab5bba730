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

//! The two record types the core itself owns: [`DataSet`] (forms the
//! dataset DAG, spec §3) and [`DeletedRecord`] (the tombstone marker).

use serde::{Deserialize, Serialize};

use crate::key::{KeyToken, KeyTokenShape};
use crate::record::{IndexSpec, KeyFields, RootType, TOMBSTONE_TYPE_NAME};
use crate::record_id::RecordId;

/// A record whose payload is a name plus an ordered set of imported dataset
/// ids. Stored in the root dataset (`DataSet == Empty`, spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSet {
    pub name: String,
    pub imports: Vec<RecordId>,
}

impl DataSet {
    pub fn new(name: impl Into<String>) -> Self {
        DataSet {
            name: name.into(),
            imports: Vec::new(),
        }
    }

    pub fn importing(mut self, imports: impl IntoIterator<Item = RecordId>) -> Self {
        self.imports = imports.into_iter().collect();
        self
    }
}

impl RootType for DataSet {
    fn type_name() -> &'static str {
        "DataSet"
    }

    fn root_type_name() -> &'static str {
        "DataSet"
    }

    fn type_chain() -> Vec<&'static str> {
        vec!["DataSet"]
    }
}

impl KeyFields for DataSet {
    fn key_shape() -> Vec<KeyTokenShape> {
        vec![KeyTokenShape::String]
    }

    fn key_tokens(&self) -> Vec<KeyToken> {
        vec![KeyToken::String(self.name.clone())]
    }
}

impl IndexSpec for DataSet {}

/// The tombstone marker (spec §3 "Tombstone (DeletedRecord)"). Carries no
/// fields of its own — its presence at a key, not its payload, is the
/// signal. `DataSource::delete` writes one directly rather than through
/// `KeyFields`, since a tombstone borrows the key of whatever it shadows
/// instead of deriving one from its own fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord;

impl RootType for DeletedRecord {
    fn type_name() -> &'static str {
        TOMBSTONE_TYPE_NAME
    }

    fn root_type_name() -> &'static str {
        TOMBSTONE_TYPE_NAME
    }

    fn type_chain() -> Vec<&'static str> {
        vec![TOMBSTONE_TYPE_NAME]
    }
}

impl KeyFields for DeletedRecord {
    fn key_shape() -> Vec<KeyTokenShape> {
        Vec::new()
    }

    fn key_tokens(&self) -> Vec<KeyToken> {
        Vec::new()
    }
}

impl IndexSpec for DeletedRecord {}
