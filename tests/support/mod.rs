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

//! Shared record types for the integration test suite: one root type
//! (`Base`) and two sibling subtypes (`Derived1`, `Derived2`) that are not
//! subtypes of one another, the shape spec.md §8 scenario S4 needs.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use versioned_store::backend::{Backend, MemoryBackend};
use versioned_store::key::{KeyToken, KeyTokenShape};
use versioned_store::record::{IndexSpec, KeyFields, RootType};
use versioned_store::{DataSource, DataSourceConfig, InstanceType};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub key: String,
    pub value: i64,
}

impl RootType for Base {
    fn type_name() -> &'static str {
        "Base"
    }
    fn root_type_name() -> &'static str {
        "Base"
    }
    fn type_chain() -> Vec<&'static str> {
        vec!["Base"]
    }
}

impl KeyFields for Base {
    fn key_shape() -> Vec<KeyTokenShape> {
        vec![KeyTokenShape::String]
    }
    fn key_tokens(&self) -> Vec<KeyToken> {
        vec![KeyToken::String(self.key.clone())]
    }
}

impl IndexSpec for Base {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Derived1 {
    pub key: String,
    pub value: i64,
}

impl RootType for Derived1 {
    fn type_name() -> &'static str {
        "Derived1"
    }
    fn root_type_name() -> &'static str {
        "Base"
    }
    fn type_chain() -> Vec<&'static str> {
        vec!["Derived1", "Base"]
    }
}

impl KeyFields for Derived1 {
    fn key_shape() -> Vec<KeyTokenShape> {
        vec![KeyTokenShape::String]
    }
    fn key_tokens(&self) -> Vec<KeyToken> {
        vec![KeyToken::String(self.key.clone())]
    }
}

impl IndexSpec for Derived1 {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Derived2 {
    pub key: String,
    pub value: i64,
}

impl RootType for Derived2 {
    fn type_name() -> &'static str {
        "Derived2"
    }
    fn root_type_name() -> &'static str {
        "Base"
    }
    fn type_chain() -> Vec<&'static str> {
        vec!["Derived2", "Base"]
    }
}

impl KeyFields for Derived2 {
    fn key_shape() -> Vec<KeyTokenShape> {
        vec![KeyTokenShape::String]
    }
    fn key_tokens(&self) -> Vec<KeyToken> {
        vec![KeyToken::String(self.key.clone())]
    }
}

impl IndexSpec for Derived2 {}

pub fn data_source() -> DataSource {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    DataSource::new(DataSourceConfig::new("test", InstanceType::Test), backend).unwrap()
}

pub fn data_source_with_config(config: DataSourceConfig) -> DataSource {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    DataSource::new(config, backend).unwrap()
}
