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

//! A scoped container holding `{dataSource, currentDataSet, log}` (spec
//! §4.5). Convenience methods delegate to [`DataSource`] using
//! `currentDataSet` as the default `loadFrom`/`saveTo`, the way the
//! teacher's `MetaSrvEnv` bundles a cluster manager with a span scoping its
//! lifetime (`src/meta/src/manager/env.rs`).

use tracing::span::EnteredSpan;

use crate::datasource::DataSource;
use crate::error::Result;
use crate::query::Query;
use crate::record::{Record, RecordEnvelope};
use crate::record_id::RecordId;

/// Creating a `Context` acquires a [`tracing::Span`] entered for the scope's
/// lifetime; it is exited on every exit path, including panics, because
/// `tracing::span::EnteredSpan` exits the span from its own `Drop`. That
/// guarantee does not extend to [`Self::close`]'s backend drop, since
/// `Drop` cannot run async code -- see its doc comment.
pub struct Context<'a> {
    data_source: &'a DataSource,
    current_data_set: RecordId,
    span: EnteredSpan,
    test_owned: bool,
}

impl<'a> Context<'a> {
    pub fn new(data_source: &'a DataSource, current_data_set: RecordId) -> Self {
        let span = tracing::info_span!("context", dataset = %current_data_set).entered();
        Context {
            data_source,
            current_data_set,
            span,
            test_owned: false,
        }
    }

    /// A scope understood to own `current_data_set` for the duration of a
    /// test. [`Self::close`] drops the entire backend for scopes created
    /// this way. There is no per-dataset delete in this model (spec §3 is
    /// append-only even for `DataSet` records themselves), so the backend
    /// drop is the only thing a test scope can reasonably discard.
    pub fn new_test_scope(data_source: &'a DataSource, current_data_set: RecordId) -> Self {
        let mut ctx = Self::new(data_source, current_data_set);
        ctx.test_owned = true;
        ctx
    }

    pub fn data_source(&self) -> &'a DataSource {
        self.data_source
    }

    pub fn current_data_set(&self) -> RecordId {
        self.current_data_set
    }

    /// Returns a handle to the scope's span rather than a bespoke logger
    /// trait -- logging here is an ambient `tracing` facade, not an
    /// injectable collaborator (SPEC_FULL §4.5).
    pub fn log(&self) -> &tracing::Span {
        &self.span
    }

    /// Async teardown. For a non-test scope this is a no-op; for a
    /// [`Self::new_test_scope`] scope it drops the whole backend. Callers
    /// that need the test-owned backend actually cleared must call this
    /// explicitly -- it cannot run implicitly from `Drop`.
    pub async fn close(self) -> Result<()> {
        if self.test_owned {
            self.data_source.drop_database().await?;
        }
        Ok(())
    }

    pub async fn save<T: Record>(&self, payload: T) -> Result<RecordEnvelope<T>> {
        self.data_source.save(payload, self.current_data_set).await
    }

    pub async fn save_many<T: Record>(&self, payloads: Vec<T>) -> Result<Vec<RecordEnvelope<T>>> {
        self.data_source.save_many(payloads, self.current_data_set).await
    }

    pub async fn load_or_null<T: Record>(&self, key: &str) -> Result<Option<RecordEnvelope<T>>> {
        self.data_source.load_or_null(key, self.current_data_set).await
    }

    pub async fn load_by_id<T: Record>(&self, id: RecordId) -> Result<RecordEnvelope<T>> {
        self.data_source.load_by_id(id).await
    }

    pub async fn exists<T: Record>(&self, key: &str) -> Result<bool> {
        self.data_source.exists::<T>(key, self.current_data_set).await
    }

    pub async fn delete<T: Record>(&self, key: &str) -> Result<RecordId> {
        self.data_source.delete::<T>(key, self.current_data_set).await
    }

    pub fn query<T: Record>(&self) -> Query<'_, T> {
        self.data_source.query(self.current_data_set)
    }
}
