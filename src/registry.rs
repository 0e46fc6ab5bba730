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

//! In-memory cache of dataset records and their transitively expanded
//! import sets, with cycle detection and as-of cutoff filtering (spec
//! §4.2). The registry never does I/O itself — [`crate::datasource::DataSource`]
//! supplies an import-lookup callback, so the BFS/cache logic here is
//! testable without a backend.
//!
//! Lock discipline follows `examples/RisingwaveLabs-risingwave/src/storage/src/memory.rs`:
//! one `parking_lot::RwLock` guarding both caches, read-heavy, writers only
//! on a cache miss or `saveDataSet`.

use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::record_id::RecordId;

#[derive(Default)]
struct RegistryState {
    name_to_id: HashMap<String, RecordId>,
    lookup_lists: HashMap<RecordId, Vec<RecordId>>,
}

/// Caches are per-`DataSource` instance and may be stale with respect to
/// writes from other processes; an explicit [`DatasetRegistry::clear_cache`]
/// forces a reload. This trades global freshness for speed, by design
/// (spec §4.2).
pub struct DatasetRegistry {
    /// Baked in at construction: the as-of cutoff is fixed for the lifetime
    /// of the owning `DataSource` (spec §4.3.1), so it's safe to key the
    /// lookup-list cache on dataset id alone.
    cutoff: Option<RecordId>,
    state: RwLock<RegistryState>,
}

impl DatasetRegistry {
    pub fn new(cutoff: Option<RecordId>) -> Self {
        Self {
            cutoff,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn clear_cache(&self) {
        *self.state.write() = RegistryState::default();
    }

    /// Cached id for `name`, or `None` if it isn't cached yet — callers
    /// (`DataSource::getOrEmpty`) issue the single load from storage and
    /// call [`remember_name`](Self::remember_name) themselves.
    pub fn cached_id_for_name(&self, name: &str) -> Option<RecordId> {
        self.state.read().name_to_id.get(name).copied()
    }

    pub fn remember_name(&self, name: &str, id: RecordId) {
        self.state.write().name_to_id.insert(name.to_string(), id);
    }

    /// `getLookupList(D)`: the transitive import expansion of `D`, always
    /// including `D` and `Empty`. Order is descending `RecordId` except
    /// that `Empty` is always last.
    ///
    /// `fetch_imports` is async because the real callback
    /// (`DataSource::fetch_dataset_imports`) goes through the `Backend`
    /// trait; the BFS below awaits it one dataset at a time rather than
    /// fanning out, since traversal order only matters for termination, not
    /// throughput.
    pub async fn lookup_list<F, Fut>(&self, d: RecordId, fetch_imports: F) -> Result<Vec<RecordId>>
    where
        F: Fn(RecordId) -> Fut,
        Fut: std::future::Future<Output = Result<Option<Vec<RecordId>>>>,
    {
        if let Some(cached) = self.state.read().lookup_lists.get(&d) {
            return Ok(cached.clone());
        }
        let built = self.build(d, &fetch_imports).await?;
        self.state.write().lookup_lists.insert(d, built.clone());
        Ok(built)
    }

    /// Breadth-first traversal from `D` over `Imports`. Cycles through
    /// intermediate datasets are pruned by set membership and otherwise
    /// tolerated (termination is guaranteed by the visited set); a dataset
    /// that lists itself directly as an import fails the call. If the
    /// cutoff excludes `D` itself, the whole traversal halts immediately —
    /// nothing but the root is reachable. An excluded import is never
    /// enqueued, so imports reachable only through it are never considered,
    /// even if their own ids are within the cutoff.
    async fn build<F, Fut>(&self, d: RecordId, fetch_imports: &F) -> Result<Vec<RecordId>>
    where
        F: Fn(RecordId) -> Fut,
        Fut: std::future::Future<Output = Result<Option<Vec<RecordId>>>>,
    {
        let mut visited: HashSet<RecordId> = HashSet::new();
        let mut queue: VecDeque<RecordId> = VecDeque::new();

        if !d.is_empty() {
            if let Some(cutoff) = self.cutoff {
                if d > cutoff {
                    return Ok(vec![RecordId::EMPTY]);
                }
            }
            visited.insert(d);
            queue.push_back(d);
        }

        while let Some(current) = queue.pop_front() {
            let imports = fetch_imports(current).await?.unwrap_or_default();
            for imp in imports {
                if imp == current {
                    return Err(Error::CycleDetected(current));
                }
                if imp.is_empty() || visited.contains(&imp) {
                    continue;
                }
                if let Some(cutoff) = self.cutoff {
                    if imp > cutoff {
                        continue;
                    }
                }
                visited.insert(imp);
                queue.push_back(imp);
            }
        }

        let ordered = visited
            .into_iter()
            .sorted_by(|a, b| b.cmp(a))
            .chain(std::iter::once(RecordId::EMPTY))
            .collect();
        Ok(ordered)
    }

    /// Validates that saving a dataset with the given (not-yet-assigned) id
    /// and import list would not make it appear in its own transitive
    /// imports (spec §3 DataSet invariant). Unlike [`Self::build`], this
    /// check is strict and transitive — it runs once at save time, before
    /// bad data can ever reach storage, which is why `build` itself can
    /// afford to just tolerate cycles it finds in already-persisted data.
    pub async fn check_no_self_cycle<F, Fut>(&self, new_id: RecordId, imports: &[RecordId], fetch_imports: F) -> Result<()>
    where
        F: Fn(RecordId) -> Fut,
        Fut: std::future::Future<Output = Result<Option<Vec<RecordId>>>>,
    {
        let mut visited: HashSet<RecordId> = HashSet::new();
        let mut queue: VecDeque<RecordId> = imports.iter().copied().filter(|i| !i.is_empty()).collect();
        for i in &queue {
            visited.insert(*i);
        }
        while let Some(current) = queue.pop_front() {
            if current == new_id {
                return Err(Error::CycleDetected(new_id));
            }
            let next_imports = fetch_imports(current).await?.unwrap_or_default();
            for imp in next_imports {
                if imp.is_empty() || visited.contains(&imp) {
                    continue;
                }
                visited.insert(imp);
                queue.push_back(imp);
            }
        }
        Ok(())
    }
}
