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

//! The seven universal properties (spec.md §8), run against `MemoryBackend`.

mod support;

use support::{data_source, Base};
use versioned_store::key::{Key, KeyToken, KeyTokenShape};
use versioned_store::record_id::OrderedIdGenerator;
use versioned_store::{DataSet, RecordId};

/// P1. Ids generated in sequence by one generator are strictly increasing.
#[test]
fn p1_generator_output_is_strictly_ordered() {
    let gen = OrderedIdGenerator::new();
    let ids: Vec<RecordId> = (0..500).map(|_| gen.next()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

/// P2. `parse(serialize(k)) == k` for keys of a permitted shape.
#[test]
fn p2_key_round_trips_through_its_canonical_string() {
    let cases: Vec<(Vec<KeyToken>, Vec<KeyTokenShape>)> = vec![
        (vec![KeyToken::String("A;0".to_string())], vec![KeyTokenShape::String]),
        (
            vec![KeyToken::String("A".to_string()), KeyToken::Int32(7)],
            vec![KeyTokenShape::String, KeyTokenShape::Int32],
        ),
        (
            vec![
                KeyToken::String("region".to_string()),
                KeyToken::LocalDate(chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            ],
            vec![KeyTokenShape::String, KeyTokenShape::LocalDate],
        ),
    ];
    for (tokens, shape) in cases {
        let key = Key::new(tokens);
        let canonical = key.canonical_string().unwrap();
        let parsed = Key::parse_with_shape(&canonical, &shape).unwrap();
        assert_eq!(parsed, key, "round trip failed for {canonical:?}");
    }
}

/// P3. RecordId round-trips through its canonical text form, is always 12
/// bytes, and unsigned lexicographic byte order matches `<`.
#[test]
fn p3_record_id_round_trips_and_orders_by_bytes() {
    for _ in 0..50 {
        let id = RecordId::generate();
        let text = id.to_string();
        let parsed = RecordId::parse(&text).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.bytes().len(), 12);
    }
    let a = RecordId::from_bytes([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 5]);
    let b = RecordId::from_bytes([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 200]);
    assert!(a < b);
    assert!(a.bytes() < b.bytes());
}

/// P4. `lookupList(D)` contains `D` iff `D.Id <= cutoff`, always contains
/// `Empty`, never exceeds the cutoff, has no duplicates, and tolerates
/// cycles in already-persisted import data.
#[tokio::test]
async fn p4_lookup_list_invariants_hold_under_a_cutoff() {
    let backend: std::sync::Arc<dyn versioned_store::backend::Backend> =
        std::sync::Arc::new(versioned_store::backend::MemoryBackend::new());
    let writer = versioned_store::DataSource::new(
        versioned_store::DataSourceConfig::new("writer", versioned_store::InstanceType::Test),
        backend.clone(),
    )
    .unwrap();

    let d0 = writer.save_dataset(DataSet::new("D0"), RecordId::EMPTY).await.unwrap();
    let d1 = writer
        .save_dataset(DataSet::new("D1").importing([d0.id]), RecordId::EMPTY)
        .await
        .unwrap();

    // No cutoff: both datasets and Empty are reachable, no duplicates.
    let full = writer.lookup_list(d1.id).await.unwrap();
    assert!(full.contains(&d0.id));
    assert!(full.contains(&d1.id));
    assert!(full.contains(&RecordId::EMPTY));
    let mut dedup = full.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), full.len());

    // A cutoff at d0 excludes d1 (D1.Id > cutoff) but still includes D0 and
    // Empty; a cutoff at d1 includes both.
    let mut cut_at_d0 = versioned_store::DataSourceConfig::new("cut0", versioned_store::InstanceType::Test);
    cut_at_d0.saved_by_id = Some(d0.id);
    let reader_at_d0 = versioned_store::DataSource::new(cut_at_d0, backend.clone()).unwrap();
    let restricted = reader_at_d0.lookup_list(d1.id).await.unwrap();
    assert_eq!(restricted, vec![RecordId::EMPTY]);

    let mut cut_at_d1 = versioned_store::DataSourceConfig::new("cut1", versioned_store::InstanceType::Test);
    cut_at_d1.saved_by_id = Some(d1.id);
    let reader_at_d1 = versioned_store::DataSource::new(cut_at_d1, backend).unwrap();
    let unrestricted = reader_at_d1.lookup_list(d1.id).await.unwrap();
    assert!(unrestricted.contains(&d0.id));
    assert!(unrestricted.contains(&d1.id));
}

/// P5. After `save(r, S)` on a writable DataSource, `loadOrNull(r.key, S)`
/// returns `r`, unless a later write masks it.
#[tokio::test]
async fn p5_save_then_load_returns_what_was_saved_unless_masked() {
    let ds = data_source();
    let record = Base { key: "K".to_string(), value: 42 };
    let saved = ds.save(record.clone(), RecordId::EMPTY).await.unwrap();
    let loaded = ds.load_or_null::<Base>(&saved.key, RecordId::EMPTY).await.unwrap().unwrap();
    assert_eq!(loaded.payload, record);

    // A later save to the same key in the same dataset masks the first.
    let newer = Base { key: "K".to_string(), value: 43 };
    ds.save(newer.clone(), RecordId::EMPTY).await.unwrap();
    let loaded_again = ds.load_or_null::<Base>("K", RecordId::EMPTY).await.unwrap().unwrap();
    assert_eq!(loaded_again.payload, newer);
}

/// P6. `delete(k, D)` followed by `loadOrNull(k, D')` for any `D'` from
/// which the tombstone is visible returns null.
#[tokio::test]
async fn p6_delete_then_load_returns_none() {
    let ds = data_source();
    ds.save(Base { key: "K".to_string(), value: 1 }, RecordId::EMPTY).await.unwrap();
    ds.delete::<Base>("K", RecordId::EMPTY).await.unwrap();
    assert!(ds.load_or_null::<Base>("K", RecordId::EMPTY).await.unwrap().is_none());
}

/// P7. In `query(T, D)`, each key appears at most once, and the emitted
/// record for a key matches what `loadOrNull(k, D)` would return for it.
#[tokio::test]
async fn p7_query_rows_agree_with_point_lookups_and_are_deduplicated() {
    let ds = data_source();
    let d0 = ds.save_dataset(DataSet::new("D0"), RecordId::EMPTY).await.unwrap();
    let d1 = ds
        .save_dataset(DataSet::new("D1").importing([d0.id]), RecordId::EMPTY)
        .await
        .unwrap();

    for i in 0..5 {
        ds.save(Base { key: format!("K{i}"), value: i }, d0.id).await.unwrap();
    }
    // Overwrite one key in the importing dataset.
    ds.save(Base { key: "K2".to_string(), value: 99 }, d1.id).await.unwrap();

    let rows = ds.query::<Base>(d1.id).execute().await.unwrap();

    let mut seen = std::collections::HashSet::new();
    for row in &rows {
        assert!(seen.insert(row.key.clone()), "key {} appeared more than once", row.key);
        let point = ds.load_or_null::<Base>(&row.key, d1.id).await.unwrap().unwrap();
        assert_eq!(point.payload, row.payload);
    }
    assert_eq!(rows.len(), 5);
}
