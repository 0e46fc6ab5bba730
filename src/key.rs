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

//! An ordered tuple of primitive tokens, canonically serialized to a
//! semicolon-delimited string. See spec §3/§6.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

/// Hour/minute only, distinct from [`NaiveTime`] so a key token can't
/// accidentally carry seconds. Compact form `hhmm`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalMinute {
    pub hour: u32,
    pub minute: u32,
}

impl LocalMinute {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::KeyViolation(format!(
                "invalid LocalMinute {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

/// One token in a [`Key`]. `double`/`f64` has deliberately no variant here:
/// spec §3 forbids floats in keys, and closing the enum over the permitted
/// shapes makes that a compile-time guarantee rather than only a runtime
/// check.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyToken {
    String(String),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    LocalDate(NaiveDate),
    LocalTime(NaiveTime),
    LocalMinute(LocalMinute),
    LocalDateTime(NaiveDateTime),
    Enum { type_name: String, member: String },
    Nested(Key),
}

/// The shape of a [`Key`], used to parse a canonical string back into typed
/// tokens (serialization alone is schema-free; parsing an ambiguous flat
/// string back into e.g. `Bool` vs `String` needs to know what was meant —
/// spec §9 "Key serialization with type ambiguity").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyTokenShape {
    String,
    Bool,
    Int32,
    Int64,
    LocalDate,
    LocalTime,
    LocalMinute,
    LocalDateTime,
    Enum { type_name: String },
    Nested(Vec<KeyTokenShape>),
}

/// An ordered tuple of [`KeyToken`]s. A singleton key has zero tokens and
/// serializes to the empty string.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Key(pub Vec<KeyToken>);

impl Key {
    pub fn new(tokens: Vec<KeyToken>) -> Self {
        Key(tokens)
    }

    pub fn singleton() -> Self {
        Key(Vec::new())
    }

    /// Canonical semicolon-delimited serialization. A nested key's own
    /// tokens are spliced in inline, so the encoded form never reveals
    /// nesting structure by itself (see [`KeyTokenShape`] for the schema
    /// needed to parse it back).
    pub fn canonical_string(&self) -> Result<String> {
        let mut flat = Vec::new();
        flatten(&self.0, &mut flat)?;
        Ok(flat.join(";"))
    }

    /// Parse a canonical string back into typed tokens, given the shape the
    /// key was built from. `parse_with_shape(k.canonical_string(), shape) ==
    /// k` for any `k` of that shape (spec §8 property 2).
    pub fn parse_with_shape(s: &str, shape: &[KeyTokenShape]) -> Result<Key> {
        let flat: Vec<&str> = if s.is_empty() {
            Vec::new()
        } else {
            s.split(';').collect()
        };
        let (tokens, consumed) = parse_tokens(&flat, shape)?;
        if consumed != flat.len() {
            return Err(Error::KeyViolation(format!(
                "key arity mismatch: expected {consumed} tokens, string has {}",
                flat.len()
            )));
        }
        Ok(Key(tokens))
    }
}

fn flatten(tokens: &[KeyToken], out: &mut Vec<String>) -> Result<()> {
    for token in tokens {
        match token {
            KeyToken::Nested(inner) => flatten(&inner.0, out)?,
            other => out.push(encode_token(other)?),
        }
    }
    Ok(())
}

fn encode_token(token: &KeyToken) -> Result<String> {
    Ok(match token {
        KeyToken::String(s) => {
            if s.is_empty() {
                return Err(Error::KeyViolation("string key tokens must be non-empty".into()));
            }
            if s.contains(';') {
                return Err(Error::KeyViolation(format!(
                    "string key token {s:?} must not contain ';'"
                )));
            }
            s.clone()
        }
        KeyToken::Bool(b) => b.to_string(),
        KeyToken::Int32(i) => i.to_string(),
        KeyToken::Int64(i) => i.to_string(),
        KeyToken::LocalDate(d) => format!("{:04}{:02}{:02}", d.format("%Y"), d.format("%m"), d.format("%d")),
        KeyToken::LocalTime(t) => format!(
            "{:02}{:02}{:02}{:03}",
            t.format("%H"),
            t.format("%M"),
            t.format("%S"),
            t.format("%3f")
        ),
        KeyToken::LocalMinute(m) => format!("{:02}{:02}", m.hour, m.minute),
        KeyToken::LocalDateTime(dt) => format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}{:03}",
            dt.format("%Y"),
            dt.format("%m"),
            dt.format("%d"),
            dt.format("%H"),
            dt.format("%M"),
            dt.format("%S"),
            dt.format("%3f")
        ),
        KeyToken::Enum { member, .. } => member.clone(),
        KeyToken::Nested(_) => unreachable!("flatten recurses before calling encode_token"),
    })
}

fn parse_tokens(flat: &[&str], shape: &[KeyTokenShape]) -> Result<(Vec<KeyToken>, usize)> {
    let mut tokens = Vec::with_capacity(shape.len());
    let mut consumed = 0;
    for kind in shape {
        match kind {
            KeyTokenShape::Nested(sub) => {
                let (nested, n) = parse_tokens(&flat[consumed..], sub)?;
                tokens.push(KeyToken::Nested(Key(nested)));
                consumed += n;
            }
            _ => {
                let raw = flat.get(consumed).ok_or_else(|| {
                    Error::KeyViolation(format!("missing token for {kind:?} at position {consumed}"))
                })?;
                tokens.push(decode_token(kind, raw)?);
                consumed += 1;
            }
        }
    }
    Ok((tokens, consumed))
}

fn decode_token(kind: &KeyTokenShape, raw: &str) -> Result<KeyToken> {
    Ok(match kind {
        KeyTokenShape::String => {
            if raw.is_empty() {
                return Err(Error::KeyViolation("string key tokens must be non-empty".into()));
            }
            KeyToken::String(raw.to_string())
        }
        KeyTokenShape::Bool => KeyToken::Bool(raw.parse().map_err(|_| {
            Error::KeyViolation(format!("{raw:?} is not a valid bool key token"))
        })?),
        KeyTokenShape::Int32 => KeyToken::Int32(raw.parse().map_err(|_| {
            Error::KeyViolation(format!("{raw:?} is not a valid int32 key token"))
        })?),
        KeyTokenShape::Int64 => KeyToken::Int64(raw.parse().map_err(|_| {
            Error::KeyViolation(format!("{raw:?} is not a valid int64 key token"))
        })?),
        KeyTokenShape::LocalDate => {
            if raw.len() != 8 {
                return Err(Error::KeyViolation(format!("{raw:?} is not a yyyymmdd date token")));
            }
            let (y, rest) = raw.split_at(4);
            let (m, d) = rest.split_at(2);
            KeyToken::LocalDate(
                NaiveDate::from_ymd_opt(parse_int(y)?, parse_uint(m)?, parse_uint(d)?)
                    .ok_or_else(|| Error::KeyViolation(format!("{raw:?} is not a valid date")))?,
            )
        }
        KeyTokenShape::LocalTime => {
            if raw.len() != 9 {
                return Err(Error::KeyViolation(format!("{raw:?} is not an hhmmssfff time token")));
            }
            let (h, rest) = raw.split_at(2);
            let (mi, rest) = rest.split_at(2);
            let (s, ms) = rest.split_at(2);
            KeyToken::LocalTime(
                NaiveTime::from_hms_milli_opt(
                    parse_uint(h)?,
                    parse_uint(mi)?,
                    parse_uint(s)?,
                    parse_uint(ms)?,
                )
                .ok_or_else(|| Error::KeyViolation(format!("{raw:?} is not a valid time")))?,
            )
        }
        KeyTokenShape::LocalMinute => {
            if raw.len() != 4 {
                return Err(Error::KeyViolation(format!("{raw:?} is not an hhmm token")));
            }
            let (h, m) = raw.split_at(2);
            KeyToken::LocalMinute(LocalMinute::new(parse_uint(h)?, parse_uint(m)?)?)
        }
        KeyTokenShape::LocalDateTime => {
            if raw.len() != 17 {
                return Err(Error::KeyViolation(format!(
                    "{raw:?} is not a yyyymmddhhmmssfff datetime token"
                )));
            }
            let (date_part, time_part) = raw.split_at(8);
            let date_token = decode_token(&KeyTokenShape::LocalDate, date_part)?;
            let time_token = decode_token(&KeyTokenShape::LocalTime, time_part)?;
            let (KeyToken::LocalDate(d), KeyToken::LocalTime(t)) = (date_token, time_token) else {
                unreachable!()
            };
            KeyToken::LocalDateTime(NaiveDateTime::new(d, t))
        }
        KeyTokenShape::Enum { type_name } => KeyToken::Enum {
            type_name: type_name.clone(),
            member: raw.to_string(),
        },
        KeyTokenShape::Nested(_) => unreachable!("handled in parse_tokens"),
    })
}

fn parse_int(s: &str) -> Result<i32> {
    s.parse()
        .map_err(|_| Error::KeyViolation(format!("{s:?} is not an integer")))
}

fn parse_uint(s: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| Error::KeyViolation(format!("{s:?} is not an integer")))
}

/// Optional caching wrapper around a [`Key`] plus the record it resolved
/// to, so a key referenced multiple times in the same scope doesn't repeat
/// a storage lookup. Deliberately kept outside [`crate::datasource::DataSource`]
/// — spec §9 calls this a client-side optimization that must not entangle
/// the core's invariants.
pub struct CachedKey<R> {
    key: Key,
    cached: OnceLock<R>,
}

impl<R> CachedKey<R> {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            cached: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn get_or_load(&self, load: impl FnOnce(&Key) -> R) -> &R {
        self.cached.get_or_init(|| load(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_shape() -> Vec<KeyTokenShape> {
        vec![
            KeyTokenShape::String,
            KeyTokenShape::Int32,
            KeyTokenShape::Nested(vec![KeyTokenShape::Bool, KeyTokenShape::Int64]),
            KeyTokenShape::LocalDate,
        ]
    }

    fn sample_key() -> Key {
        Key(vec![
            KeyToken::String("A".to_string()),
            KeyToken::Int32(7),
            KeyToken::Nested(Key(vec![KeyToken::Bool(true), KeyToken::Int64(42)])),
            KeyToken::LocalDate(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
        ])
    }

    #[test]
    fn roundtrip_with_nested_key() {
        let k = sample_key();
        let s = k.canonical_string().unwrap();
        assert_eq!(s, "A;7;true;42;20240102");
        let parsed = Key::parse_with_shape(&s, &sample_shape()).unwrap();
        assert_eq!(parsed, k);
    }

    #[test]
    fn singleton_key_is_empty_string() {
        assert_eq!(Key::singleton().canonical_string().unwrap(), "");
        assert_eq!(Key::parse_with_shape("", &[]).unwrap(), Key::singleton());
    }

    #[test]
    fn rejects_empty_string_token() {
        let k = Key(vec![KeyToken::String(String::new())]);
        assert!(k.canonical_string().is_err());
    }

    #[test]
    fn rejects_semicolon_in_string_token() {
        let k = Key(vec![KeyToken::String("a;b".to_string())]);
        assert!(k.canonical_string().is_err());
    }

    #[test]
    fn time_and_minute_and_datetime_compact_forms() {
        let t = KeyToken::LocalTime(NaiveTime::from_hms_milli_opt(1, 2, 3, 4).unwrap());
        assert_eq!(encode_token(&t).unwrap(), "010203004");
        let m = KeyToken::LocalMinute(LocalMinute::new(23, 59).unwrap());
        assert_eq!(encode_token(&m).unwrap(), "2359");
        let dt = KeyToken::LocalDateTime(NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap(),
        ));
        assert_eq!(encode_token(&dt).unwrap(), "20201231235959999");
    }

    #[test]
    fn arity_mismatch_is_key_violation() {
        let err = Key::parse_with_shape("A;7", &sample_shape()).unwrap_err();
        assert!(matches!(err, Error::KeyViolation(_)));
    }
}
