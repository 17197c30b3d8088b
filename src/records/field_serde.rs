//! Lenient (de)serializers for flow-log document fields.
//!
//! Indexed documents do not agree on encodings: ports show up as numbers,
//! numeric strings or floats, rule ids as numbers or strings, and timestamps
//! in several textual layouts or as epoch milliseconds. These helpers are used
//! through `#[serde(with = "...")]` on [`LogRecord`](super::types::LogRecord).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses the textual timestamp layouts found in flow-log documents.
///
/// RFC 3339 is tried first; naive layouts are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
}

pub mod port {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u64),
        Float(f64),
        Text(String),
    }

    pub fn serialize<S>(port: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(*port)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawPort::deserialize(deserializer)? {
            RawPort::Number(n) => {
                u16::try_from(n).map_err(|_| D::Error::custom(format!("port {} out of range", n)))
            }
            RawPort::Float(f) => {
                if f.fract() == 0.0 && (0.0..=65535.0).contains(&f) {
                    Ok(f as u16)
                } else {
                    Err(D::Error::custom(format!("port {} is not a valid port", f)))
                }
            }
            RawPort::Text(s) => s
                .trim()
                .parse::<u16>()
                .map_err(|e| D::Error::custom(format!("port {:?}: {}", s, e))),
        }
    }
}

pub mod text {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawText {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawText::deserialize(deserializer)? {
            RawText::Text(s) => s,
            RawText::Signed(n) => n.to_string(),
            RawText::Unsigned(n) => n.to_string(),
            RawText::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
            RawText::Float(f) => f.to_string(),
        })
    }
}

pub mod timestamp {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp {} out of range", ms))),
            RawTimestamp::Text(s) => parse_timestamp(&s)
                .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp {:?}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:30:05+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:05"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_parse_timestamp_keeps_fraction() {
        let ts = parse_timestamp("2024-03-01 12:30:05.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }
}
