// Copyright 2025 Chris Custine
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

//! Fixed-width time buckets used to key weather requests.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Default bucket width in minutes.
pub const DEFAULT_BUCKET_MINUTES: u32 = 5;

/// Wire format for bucket keys (ISO-8601 with millisecond precision).
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A timestamp floored to a bucket boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket {
    start: DateTime<Utc>,
    width_minutes: u32,
}

impl TimeBucket {
    /// Floor `time` to the default 5 minute boundary.
    #[must_use]
    pub fn floor(time: DateTime<Utc>) -> Self {
        Self::floor_to(time, DEFAULT_BUCKET_MINUTES)
    }

    /// Floor `time` to a boundary of `width_minutes` (minimum 1).
    #[must_use]
    pub fn floor_to(time: DateTime<Utc>, width_minutes: u32) -> Self {
        let width_minutes = width_minutes.max(1);
        let width_secs = i64::from(width_minutes) * 60;
        let floored = time.timestamp().div_euclid(width_secs) * width_secs;
        let start = Utc
            .timestamp_opt(floored, 0)
            .single()
            .unwrap_or(time);
        Self {
            start,
            width_minutes,
        }
    }

    /// First instant inside the bucket.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// First instant of the following bucket.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.width_minutes))
    }

    /// Whether `time` falls inside this bucket.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end()
    }

    /// Key sent to the weather service.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format(WIRE_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_to_five_minutes() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 7, 42).unwrap();
        let bucket = TimeBucket::floor(t);
        assert_eq!(bucket.start(), Utc.with_ymd_and_hms(2024, 6, 15, 12, 5, 0).unwrap());
        assert_eq!(bucket.key(), "2024-06-15T12:05:00.000Z");
        assert_eq!(bucket.to_string(), bucket.key());
    }

    #[test]
    fn test_bucket_is_stable_across_its_interval() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 3, 10).unwrap();
        let bucket = TimeBucket::floor(t);
        let mut probe = bucket.start();
        while probe < bucket.end() {
            assert_eq!(TimeBucket::floor(probe), bucket);
            probe += Duration::seconds(17);
        }
        assert_ne!(TimeBucket::floor(bucket.end()), bucket);
        assert_eq!(TimeBucket::floor(bucket.start()), bucket);
    }

    #[test]
    fn test_subsecond_time_floors_to_boundary() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 9, 59).unwrap() + Duration::milliseconds(999);
        assert_eq!(TimeBucket::floor(t).key(), "2024-06-15T12:05:00.000Z");
    }

    #[test]
    fn test_custom_width_and_contains() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 44, 0).unwrap();
        let bucket = TimeBucket::floor_to(t, 15);
        assert_eq!(bucket.key(), "2024-06-15T12:30:00.000Z");
        assert!(bucket.contains(t));
        assert!(!bucket.contains(bucket.end()));
    }
}
