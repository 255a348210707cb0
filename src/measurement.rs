use anyhow::Context;
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE: &str = "application/json";

/// One reading as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub device_id: u32,
    pub measurement_value: f64,
}

impl Measurement {
    pub fn new(timestamp: NaiveDateTime, device_id: u32, measurement_value: f64) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            device_id,
            measurement_value,
        }
    }

    pub fn to_json(&self) -> Result<String, anyhow::Error> {
        serde_json::to_string(self).context("Failed to serialize measurement")
    }
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&timestamp.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 14)
            .unwrap()
            .and_hms_milli_opt(18, 5, 9, 731)
            .unwrap()
    }

    #[test]
    fn test_wire_format() {
        let m = Measurement::new(timestamp(), 3, 0.4217);
        assert_eq!(
            m.to_json().unwrap(),
            r#"{"timestamp":"2025-01-14T18:05:09","device_id":3,"measurement_value":0.4217}"#
        );
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let m = Measurement::new(timestamp(), 42, 1.0583);
        let decoded: Measurement = serde_json::from_str(&m.to_json().unwrap()).unwrap();

        assert_eq!(decoded.device_id, 42);
        assert_eq!(decoded.timestamp, m.timestamp);
        assert_eq!(decoded.measurement_value, 1.0583);
        assert_eq!(decoded, m);
    }

    #[test]
    fn test_subsecond_precision_dropped() {
        let m = Measurement::new(timestamp(), 1, 0.0);
        assert_eq!(m.timestamp.and_utc().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_rejects_offset_timestamp() {
        let body = r#"{"timestamp":"2025-01-14T18:05:09+02:00","device_id":1,"measurement_value":0.5}"#;
        assert!(serde_json::from_str::<Measurement>(body).is_err());
    }
}
