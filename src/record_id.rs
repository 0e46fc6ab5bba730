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

//! Portable 12-byte ordered identifier: a 32-bit Unix-seconds timestamp
//! prefix plus a 64-bit randomized suffix. See spec §3/§4.1.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, MonotonicityWarning, Result};

/// 12 bytes: `[0..4)` big-endian Unix seconds, `[4..7)` machine hash,
/// `[7..9)` pid, `[9..12)` per-process increment. Total order is the
/// unsigned lexicographic order over the 12 bytes, which `derive(Ord)` on
/// the inner `[u8; 12]` gives us directly (each field is itself stored
/// big-endian, so byte-wise comparison matches numeric comparison of the
/// three 32-bit words spec §3 describes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordId([u8; 12]);

impl RecordId {
    pub const EMPTY: RecordId = RecordId([0u8; 12]);

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        RecordId(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordId::EMPTY
    }

    /// UTC instant this id was created at, at one-second resolution.
    pub fn creation_time(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes(self.0[0..4].try_into().unwrap());
        Utc.timestamp_opt(secs as i64, 0)
            .single()
            .expect("Unix seconds prefix is always representable")
    }

    /// The least RecordId whose timestamp equals `instant` (all-zero
    /// suffix). Used to turn `savedByTime` into an as-of cutoff id (spec
    /// §4.3.1; see DESIGN.md for why "least" was chosen over "greatest").
    pub fn least_at(instant: DateTime<Utc>) -> Self {
        let secs = instant.timestamp().clamp(0, u32::MAX as i64) as u32;
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        RecordId(bytes)
    }

    /// Increment the 12 bytes as a big-endian 96-bit unsigned integer.
    /// Used by [`OrderedIdGenerator`] to repair a non-increasing id.
    pub fn successor(&self) -> RecordId {
        let mut padded = [0u8; 16];
        padded[4..16].copy_from_slice(&self.0);
        let next = u128::from_be_bytes(padded).wrapping_add(1);
        let next_bytes = next.to_be_bytes();
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&next_bytes[4..16]);
        RecordId(bytes)
    }

    /// Produces a RecordId from the current wall clock, a stable per-host
    /// hash, the process id, and an atomically incremented counter. Ids
    /// generated by distinct calls in the same process never collide
    /// because the counter never resets; see [`OrderedIdGenerator`] for the
    /// stronger strictly-increasing guarantee.
    pub fn generate() -> Self {
        static MACHINE_HASH: OnceLock<u32> = OnceLock::new();
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as u32;
        let machine_hash = *MACHINE_HASH.get_or_init(compute_machine_hash) & 0x00FF_FFFF;
        let pid = (std::process::id() & 0xFFFF) as u16;
        let incr = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&machine_hash.to_be_bytes()[1..4]);
        bytes[7..9].copy_from_slice(&pid.to_be_bytes());
        bytes[9..12].copy_from_slice(&incr.to_be_bytes()[1..4]);
        RecordId(bytes)
    }

    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

/// Derives from a stable host identifier, salted with a per-process random
/// value so two processes sharing a hostname (common in containers) still
/// get distinct machine hashes rather than relying on the pid/counter alone
/// to separate them.
fn compute_machine_hash() -> u32 {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    host.hash(&mut hasher);
    hasher.finish() as u32 ^ rand::random::<u32>()
}

const CANONICAL_LEN: usize = 40;
const INSTANT_LEN: usize = 24;

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != CANONICAL_LEN {
            return Err(Error::ParseError(format!(
                "RecordId must be {CANONICAL_LEN} chars, got {} in {s:?}",
                s.len()
            )));
        }
        let (instant_part, hex_part) = s.split_at(INSTANT_LEN);
        let naive = chrono::NaiveDateTime::parse_from_str(instant_part, "%Y-%m-%dT%H:%M:%S%.3fZ")
            .map_err(|e| Error::ParseError(format!("invalid RecordId instant {instant_part:?}: {e}")))?;
        let secs = naive.and_utc().timestamp();
        if !(0..=u32::MAX as i64).contains(&secs) {
            return Err(Error::ParseError(format!("RecordId instant {instant_part:?} out of range")));
        }
        let suffix = hex::decode(hex_part)
            .map_err(|e| Error::ParseError(format!("invalid RecordId suffix {hex_part:?}: {e}")))?;
        if suffix.len() != 8 {
            return Err(Error::ParseError(format!(
                "RecordId suffix must decode to 8 bytes, got {}",
                suffix.len()
            )));
        }
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&(secs as u32).to_be_bytes());
        bytes[4..12].copy_from_slice(&suffix);
        Ok(RecordId(bytes))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.creation_time().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            hex::encode(&self.0[4..12])
        )
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({self})")
    }
}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wraps [`RecordId::generate`] and enforces strict local monotonicity: if
/// the newly generated id is not strictly greater than the last one emitted
/// by this instance, it is replaced by `last.successor()` and a
/// [`MonotonicityWarning`] is logged (never raised — spec §7).
pub struct OrderedIdGenerator {
    last: Mutex<RecordId>,
}

impl OrderedIdGenerator {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(RecordId::EMPTY),
        }
    }

    pub fn next(&self) -> RecordId {
        let candidate = RecordId::generate();
        let mut last = self.last.lock();
        let id = if candidate > *last {
            candidate
        } else {
            let repaired = last.successor();
            let warning = MonotonicityWarning {
                previous: *last,
                repaired,
            };
            tracing::warn!(previous = %warning.previous, repaired = %warning.repaired, "{warning}");
            repaired
        };
        *last = id;
        id
    }
}

impl Default for OrderedIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_all_zero_and_canonical() {
        assert_eq!(RecordId::EMPTY.bytes(), [0u8; 12]);
        assert_eq!(
            RecordId::EMPTY.to_string(),
            "1970-01-01T00:00:00.000Z0000000000000000"
        );
    }

    #[test]
    fn empty_is_smaller_than_generated() {
        assert!(RecordId::EMPTY < RecordId::generate());
    }

    #[test]
    fn roundtrip_parse_serialize() {
        let id = RecordId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), CANONICAL_LEN);
        let parsed = RecordId::parse(&text).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn bytes_len_is_twelve_and_order_matches_lexicographic() {
        let a = RecordId::from_bytes([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        let b = RecordId::from_bytes([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(a.bytes().len(), 12);
        assert!(a < b);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(RecordId::try_parse("not-a-record-id").is_none());
        assert!(RecordId::try_parse("1970-01-01T00:00:00.000Z00000000000000").is_none());
    }

    #[test]
    fn ordered_generator_is_strictly_increasing() {
        let gen = OrderedIdGenerator::new();
        let mut last = RecordId::EMPTY;
        for _ in 0..10_000 {
            let id = gen.next();
            assert!(id > last, "ids must be strictly increasing");
            last = id;
        }
    }

    #[test]
    fn successor_increments_low_order_bytes() {
        let id = RecordId::from_bytes([1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0]);
        let next = id.successor();
        assert!(next > id);
        assert_eq!(&next.bytes()[0..4], &[1, 2, 3, 4]);
        assert_eq!(&next.bytes()[9..12], &[0, 0, 1]);
    }
}
