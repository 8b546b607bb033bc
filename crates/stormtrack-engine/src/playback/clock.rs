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

//! Simulation clock.

use chrono::{DateTime, Duration, Utc};

/// What happens when the clock reaches its stop time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockRange {
    /// Hold at the stop time.
    #[default]
    Clamped,
    /// Wrap back to the start time.
    Loop,
}

/// Simulated time bounded by `[start, stop]`.
///
/// `start <= current <= stop` holds after every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    start: DateTime<Utc>,
    current: DateTime<Utc>,
    stop: DateTime<Utc>,
    multiplier: f64,
    range: ClockRange,
    running: bool,
}

impl PlaybackClock {
    /// Create a paused clock positioned at `start`.
    ///
    /// Bounds given in the wrong order are swapped.
    #[must_use]
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>, multiplier: f64, range: ClockRange) -> Self {
        let (start, stop) = if stop < start { (stop, start) } else { (start, stop) };
        Self {
            start,
            current: start,
            stop,
            multiplier: sanitize_multiplier(multiplier),
            range,
            running: false,
        }
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn current(&self) -> DateTime<Utc> {
        self.current
    }

    #[must_use]
    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    #[must_use]
    pub fn range(&self) -> ClockRange {
        self.range
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// A clamped clock that has reached its stop time.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.range == ClockRange::Clamped && self.current >= self.stop
    }

    pub fn play(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = sanitize_multiplier(multiplier);
    }

    pub fn set_range(&mut self, range: ClockRange) {
        self.range = range;
    }

    /// Jump to `time`, clamped into the clock bounds.
    pub fn seek(&mut self, time: DateTime<Utc>) {
        self.current = time.clamp(self.start, self.stop);
    }

    /// Advance by `wall` elapsed real time scaled by the multiplier.
    ///
    /// Does nothing while paused. Returns the new current time.
    pub fn advance(&mut self, wall: std::time::Duration) -> DateTime<Utc> {
        if !self.running {
            return self.current;
        }

        #[allow(clippy::cast_possible_truncation, reason = "the cast saturates and overflow is handled below")]
        let step = (wall.as_secs_f64() * self.multiplier * 1e6).round() as i64;
        let next = self.current.checked_add_signed(Duration::microseconds(step));

        self.current = match next {
            Some(next) if next <= self.stop => next,
            _ => match self.range {
                ClockRange::Clamped => self.stop,
                ClockRange::Loop => self.wrap(step),
            },
        };
        self.current
    }

    /// Position `step` microseconds past the current time, folded into the range.
    fn wrap(&self, step: i64) -> DateTime<Utc> {
        let span = (self.stop - self.start).num_microseconds().unwrap_or(0);
        if span <= 0 {
            return self.start;
        }
        let elapsed = (self.current - self.start).num_microseconds().unwrap_or(0);
        let offset = (i128::from(elapsed) + i128::from(step)).rem_euclid(i128::from(span));
        #[allow(clippy::cast_possible_truncation, reason = "offset is below span, which fits in i64")]
        let offset = offset as i64;
        self.start + Duration::microseconds(offset)
    }
}

fn sanitize_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 0.0 {
        multiplier
    } else {
        1.0
    }
}
