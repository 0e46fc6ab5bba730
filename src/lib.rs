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

//! Core of a temporal, hierarchical document store.
//!
//! A [`DataSource`](datasource::DataSource) persists versioned, polymorphic
//! [`Record`](record::Record)s across a DAG of [`DataSet`](dataset::DataSet)s
//! and resolves point lookups and queries against that DAG using a single
//! consistent ordering rule: dataset precedence, then version precedence.
//! Backend storage, record (de)serialization to a concrete document format,
//! and domain schemas are external collaborators, reached only through the
//! traits in [`backend`].

pub mod backend;
pub mod config;
pub mod context;
pub mod dataset;
pub mod datasource;
pub mod error;
pub mod key;
pub mod query;
pub mod record;
pub mod record_id;
pub mod registry;

#[cfg(test)]
pub mod logging;

pub use config::{DataSourceConfig, InstanceType};
pub use context::Context;
pub use dataset::DataSet;
pub use datasource::DataSource;
pub use error::{Error, Result};
pub use key::{Key, KeyToken};
pub use query::Query;
pub use record::{Record, RecordEnvelope, RootType};
pub use record_id::{OrderedIdGenerator, RecordId};
