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

use thiserror::Error;

use crate::record_id::RecordId;

pub type Result<T> = std::result::Result<T, Error>;

/// The core's error taxonomy. Every variant here is a distinct reportable
/// kind; none of them are swallowed silently by the core. The `OrNull`
/// point-lookup entry points convert [`Error::NotFound`] and the
/// visibility-masking cases (tombstone, foreign type) into `Ok(None)`
/// themselves rather than raising.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed input: {0}")]
    ParseError(String),

    #[error("key violation: {0}")]
    KeyViolation(String),

    #[error("dataset {0} is part of a cycle in its own transitive imports")]
    CycleDetected(RecordId),

    #[error("no record with id {0}")]
    NotFound(RecordId),

    #[error("stored type is not a subtype of the requested root type {requested}")]
    TypeMismatch { requested: &'static str },

    #[error("data source is read-only")]
    ReadOnlyViolation,

    #[error("operation forbidden on a {instance_type:?} instance")]
    PolicyViolation { instance_type: crate::config::InstanceType },

    #[error("backend operation timed out")]
    Timeout,

    #[error(transparent)]
    BackendError(#[from] anyhow::Error),
}

/// Not an [`Error`] variant: spec §4.1/§7 requires monotonicity repairs in
/// [`crate::record_id::OrderedIdGenerator`] to be logged, never raised. This
/// type exists only as the structured payload passed to the `tracing::warn!`
/// call site.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicityWarning {
    pub previous: RecordId,
    pub repaired: RecordId,
}

impl std::fmt::Display for MonotonicityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "generated id {} was not greater than previous {previous}; repaired to next successor",
            self.repaired,
            previous = self.previous
        )
    }
}
