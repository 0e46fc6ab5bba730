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

//! Test-only `tracing` wiring. The crate itself owns no logging runtime
//! (out of scope per spec.md §1) -- this exists purely so `cargo test`
//! output shows the `tracing::debug!`/`warn!`/`info!` events emitted by
//! [`crate::record_id`], [`crate::registry`] and [`crate::datasource`],
//! at a scale appropriate to a library rather than the teacher's full
//! `risingwave_rt` runtime crate (`src/utils/runtime/src/lib.rs`).

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing-subscriber` `fmt` layer with an `EnvFilter`
/// (`RUST_LOG`, default `warn`) as the global default, once per test
/// binary. Safe to call from every test that wants log output -- repeat
/// calls are no-ops.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
            .with_test_writer()
            .init();
    });
}
