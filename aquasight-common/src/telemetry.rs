use chrono::Local;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single named measurement within one polling cycle.
///
/// `value` is `None` when the underlying register read failed; the record
/// serializes such fields as JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Field name as it appears in the published payload.
    pub name: String,

    /// The measured value, rounded for output, or `None` if unavailable.
    pub value: Option<f64>,
}

impl Measurement {
    /// Create a measurement carrying a value.
    pub fn available(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }

    /// Create a measurement whose read failed.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// The measurements captured in one polling cycle, plus the capture time.
///
/// Serializes to a JSON object with one key per measurement, in capture
/// order, followed by a `timestamp` string (local time, second precision).
/// Unavailable measurements serialize as `null` rather than being omitted,
/// so downstream consumers always see the full field set of the site.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Measurements in site-profile order.
    pub measurements: Vec<Measurement>,

    /// Capture time formatted `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: String,
}

impl TelemetryRecord {
    /// Build a record stamped with the current local time.
    pub fn new(measurements: Vec<Measurement>) -> Self {
        Self::with_timestamp(measurements, local_timestamp())
    }

    /// Build a record with an explicit timestamp.
    pub fn with_timestamp(measurements: Vec<Measurement>, timestamp: String) -> Self {
        Self {
            measurements,
            timestamp,
        }
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.measurements.len() + 1))?;
        for measurement in &self.measurements {
            map.serialize_entry(&measurement.name, &measurement.value)?;
        }
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.end()
    }
}

/// Round a value to 2 decimal places for output.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current local time formatted `YYYY-MM-DDTHH:MM:SS`.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_in_capture_order() {
        let record = TelemetryRecord::with_timestamp(
            vec![
                Measurement::available("cod", 45.3),
                Measurement::available("tss", 12.75),
            ],
            "2024-06-01T10:15:00".to_string(),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"cod":45.3,"tss":12.75,"timestamp":"2024-06-01T10:15:00"}"#
        );
    }

    #[test]
    fn test_unavailable_measurement_serializes_as_null() {
        let record = TelemetryRecord::with_timestamp(
            vec![
                Measurement::unavailable("cod"),
                Measurement::available("tss", 8.1),
            ],
            "2024-06-01T10:15:00".to_string(),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"cod":null,"tss":8.1,"timestamp":"2024-06-01T10:15:00"}"#
        );
    }

    #[test]
    fn test_timestamp_is_last_key() {
        let record = TelemetryRecord::with_timestamp(
            vec![Measurement::available("ph", 7.2)],
            "2024-06-01T10:15:00".to_string(),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.ends_with(r#""timestamp":"2024-06-01T10:15:00"}"#));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(45.29999923706055), 45.3);
        assert_eq!(round2(12.75), 12.75);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(-3.456), -3.46);
    }

    #[test]
    fn test_round2_is_idempotent() {
        for value in [45.3, 12.75, 0.0, -0.01, 1234.56] {
            assert_eq!(round2(round2(value)), round2(value));
        }
    }

    #[test]
    fn test_local_timestamp_format() {
        let ts = local_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%dT%H:%M:%S").is_ok());
    }
}
