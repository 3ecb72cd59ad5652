//! Historical series request/response models
//!
//! Models for the GET /api/cryptocurrencies/{id}/historical endpoint and the
//! downsampler's range/interval vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported time-range tokens for historical queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Hour1,
    Day1,
    Day7,
    Day30,
    Day90,
    Day365,
}

impl TimeRange {
    /// Parse a token. Anything unrecognized falls back to 7d; the default is
    /// deliberate, not an error.
    pub fn parse(s: &str) -> Self {
        match s {
            "1h" => TimeRange::Hour1,
            "1d" => TimeRange::Day1,
            "7d" => TimeRange::Day7,
            "30d" => TimeRange::Day30,
            "90d" => TimeRange::Day90,
            "365d" => TimeRange::Day365,
            _ => TimeRange::Day7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hour1 => "1h",
            TimeRange::Day1 => "1d",
            TimeRange::Day7 => "7d",
            TimeRange::Day30 => "30d",
            TimeRange::Day90 => "90d",
            TimeRange::Day365 => "365d",
        }
    }

    /// Query window in days; 1h is 1/24 of a day. Non-positive would mean an
    /// open-ended (all-time) query.
    pub fn window_days(&self) -> f64 {
        match self {
            TimeRange::Hour1 => 1.0 / 24.0,
            TimeRange::Day1 => 1.0,
            TimeRange::Day7 => 7.0,
            TimeRange::Day30 => 30.0,
            TimeRange::Day90 => 90.0,
            TimeRange::Day365 => 365.0,
        }
    }

    /// Bucket granularity used when downsampling this range
    pub fn interval(&self) -> Interval {
        match self {
            TimeRange::Hour1 => Interval::Minute,
            TimeRange::Day1 => Interval::Hour,
            TimeRange::Day7 | TimeRange::Day30 | TimeRange::Day90 | TimeRange::Day365 => {
                Interval::Day
            }
        }
    }

    /// Intended sampling density for the window. Response metadata only; the
    /// aggregator never pads or truncates to this count.
    pub fn expected_points(&self) -> usize {
        match self {
            TimeRange::Hour1 => 60,
            TimeRange::Day1 => 24,
            TimeRange::Day7 => 7,
            TimeRange::Day30 => 30,
            TimeRange::Day90 => 90,
            TimeRange::Day365 => 365,
        }
    }
}

/// Bucket granularity for the downsampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Minute,
    Hour,
    Day,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
        }
    }

    /// Bucket width in seconds
    pub fn bucket_secs(&self) -> i64 {
        match self {
            Interval::Minute => 60,
            Interval::Hour => 3_600,
            Interval::Day => 86_400,
        }
    }

    /// Integer bucket key: epoch seconds divided by the bucket width.
    /// Two timestamps share a bucket iff they share a key, and key order is
    /// chronological order.
    pub fn bucket_index(&self, timestamp: DateTime<Utc>) -> i64 {
        timestamp.timestamp().div_euclid(self.bucket_secs())
    }
}

/// Query parameters for the historical data endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalDataQuery {
    /// Time range token: 1h, 1d, 7d, 30d, 90d, 365d (defaults to 7d)
    #[serde(rename = "timeRange", default = "default_time_range")]
    pub time_range: String,
    /// Currency code to convert prices to (defaults to USD)
    #[serde(default = "default_convert")]
    pub convert: String,
}

fn default_time_range() -> String {
    "7d".to_string()
}

fn default_convert() -> String {
    "USD".to_string()
}

/// One downsampled output point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Second-precision ISO-8601 UTC with trailing Z
    pub timestamp: String,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Whether a series came from stored observations or the synthetic fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesSource {
    Stored,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    /// Asset id the series belongs to
    pub id: i64,
    #[serde(rename = "timeRange")]
    pub time_range: String,
    /// Bucket granularity: minute, hour or day
    pub interval: String,
    /// Currency the prices are quoted in
    pub convert: String,
    pub source: SeriesSource,
    pub expected_points: usize,
    pub actual_points: usize,
}

/// Response for the historical data endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResult {
    pub data: Vec<SeriesPoint>,
    pub metadata: SeriesMetadata,
}

/// Generic error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Format an instant as the wire timestamp format (second precision, Z suffix)
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_parse_all_tokens() {
        assert_eq!(TimeRange::parse("1h"), TimeRange::Hour1);
        assert_eq!(TimeRange::parse("1d"), TimeRange::Day1);
        assert_eq!(TimeRange::parse("7d"), TimeRange::Day7);
        assert_eq!(TimeRange::parse("30d"), TimeRange::Day30);
        assert_eq!(TimeRange::parse("90d"), TimeRange::Day90);
        assert_eq!(TimeRange::parse("365d"), TimeRange::Day365);
    }

    #[test]
    fn test_time_range_unknown_token_defaults_to_7d() {
        for token in ["", "2w", "all", "1H", "999d"] {
            assert_eq!(TimeRange::parse(token), TimeRange::Day7);
        }
    }

    #[test]
    fn test_range_table() {
        let cases = [
            (TimeRange::Hour1, 1.0 / 24.0, Interval::Minute, 60),
            (TimeRange::Day1, 1.0, Interval::Hour, 24),
            (TimeRange::Day7, 7.0, Interval::Day, 7),
            (TimeRange::Day30, 30.0, Interval::Day, 30),
            (TimeRange::Day90, 90.0, Interval::Day, 90),
            (TimeRange::Day365, 365.0, Interval::Day, 365),
        ];
        for (range, days, interval, points) in cases {
            assert_eq!(range.window_days(), days);
            assert_eq!(range.interval(), interval);
            assert_eq!(range.expected_points(), points);
        }
    }

    #[test]
    fn test_bucket_index_minute() {
        let a = "2026-01-01T00:00:10Z".parse::<DateTime<Utc>>().unwrap();
        let b = "2026-01-01T00:00:40Z".parse::<DateTime<Utc>>().unwrap();
        let c = "2026-01-01T00:01:05Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(Interval::Minute.bucket_index(a), Interval::Minute.bucket_index(b));
        assert_ne!(Interval::Minute.bucket_index(b), Interval::Minute.bucket_index(c));
        assert!(Interval::Minute.bucket_index(b) < Interval::Minute.bucket_index(c));
    }

    #[test]
    fn test_bucket_index_day_boundary() {
        let before = "2026-03-01T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        let after = "2026-03-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_ne!(Interval::Day.bucket_index(before), Interval::Day.bucket_index(after));
    }

    #[test]
    fn test_format_timestamp() {
        let ts = "2026-01-02T03:04:05.678Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(format_timestamp(ts), "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_series_source_serialization() {
        assert_eq!(serde_json::to_string(&SeriesSource::Stored).unwrap(), "\"stored\"");
        assert_eq!(
            serde_json::to_string(&SeriesSource::Synthetic).unwrap(),
            "\"synthetic\""
        );
    }
}
