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

//! Configuration for a [`crate::datasource::DataSource`] instance (ambient
//! stack, SPEC_FULL §7). Loadable from any `serde`-supported format the
//! same way `risingwave_common`'s config types are (see
//! `examples/RisingwaveLabs-risingwave/src/common/src/system_param.rs`) —
//! no bespoke parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record_id::RecordId;

/// Drives the `PolicyViolation` check in `DataSource::drop_database` (spec
/// §4.3.7): dropping is forbidden on `Prod` and `Uat` instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Dev,
    Test,
    Uat,
    Prod,
}

impl InstanceType {
    pub fn forbids_drop(self) -> bool {
        matches!(self, InstanceType::Prod | InstanceType::Uat)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub name: String,
    #[serde(default)]
    pub read_only: bool,
    pub instance_type: InstanceType,
    #[serde(default)]
    pub saved_by_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub saved_by_id: Option<RecordId>,
}

impl DataSourceConfig {
    pub fn new(name: impl Into<String>, instance_type: InstanceType) -> Self {
        DataSourceConfig {
            name: name.into(),
            read_only: false,
            instance_type,
            saved_by_time: None,
            saved_by_id: None,
        }
    }

    /// `isReadOnly()` per spec §4.3.1: true iff explicitly read-only, or an
    /// as-of cutoff is in force.
    pub fn is_read_only(&self) -> bool {
        self.read_only || self.saved_by_time.is_some() || self.saved_by_id.is_some()
    }

    /// The as-of cutoff RecordId, or `None` if reads see the latest state.
    /// `savedByTime` maps to the *least* RecordId of that second (all-zero
    /// suffix), making the cutoff exclusive of same-second writes — see
    /// DESIGN.md for why this was chosen over the greatest id.
    pub fn cutoff(&self) -> Result<Option<RecordId>> {
        match (self.saved_by_time, self.saved_by_id) {
            (Some(_), Some(_)) => Err(Error::ParseError(
                "at most one of saved_by_time/saved_by_id may be set".to_string(),
            )),
            (Some(t), None) => Ok(Some(RecordId::least_at(t))),
            (None, Some(id)) => Ok(Some(id)),
            (None, None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_follows_cutoff() {
        let mut cfg = DataSourceConfig::new("test", InstanceType::Dev);
        assert!(!cfg.is_read_only());
        cfg.saved_by_id = Some(RecordId::generate());
        assert!(cfg.is_read_only());
    }

    #[test]
    fn both_cutoffs_set_is_a_config_error() {
        let mut cfg = DataSourceConfig::new("test", InstanceType::Dev);
        cfg.saved_by_time = Some(Utc::now());
        cfg.saved_by_id = Some(RecordId::generate());
        assert!(cfg.cutoff().is_err());
    }

    #[test]
    fn prod_and_uat_forbid_drop() {
        assert!(InstanceType::Prod.forbids_drop());
        assert!(InstanceType::Uat.forbids_drop());
        assert!(!InstanceType::Dev.forbids_drop());
        assert!(!InstanceType::Test.forbids_drop());
    }
}
