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

//! ICAO flight plan (FPL) message parser.
//!
//! Extracts the handful of items the playback engine needs from a filed
//! flight plan and resolves them to a single departure timestamp.
//!
//! Message format (fields are separated by `-`):
//! ```text
//! (FPL-<ident>-<rules><type> -<acft>/<wake> -<dep><hhmm> -<speed><level> <route> -<dest><eet> -<other>)
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Errors that can occur while parsing a flight plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightPlanError {
    #[error("no departure aerodrome and time group found")]
    MissingTimeGroup,

    #[error("no destination aerodrome found")]
    MissingDestination,

    #[error("invalid departure time: {0}")]
    InvalidTime(String),

    #[error("invalid date of flight: {0}")]
    InvalidDate(String),
}

/// Items extracted from a filed flight plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightPlanRecord {
    /// Aircraft identification (item 7), e.g. "BAW123".
    pub callsign: Option<String>,
    /// Flight rules letter (item 8), e.g. "I" or "V".
    pub flight_rules: Option<char>,
    /// ICAO aircraft type designator (item 9), e.g. "B738".
    pub aircraft_type: Option<String>,
    /// Departure aerodrome location indicator.
    pub departure_id: String,
    /// Destination aerodrome location indicator.
    pub destination_id: String,
    /// Cruise speed and level group (item 15), e.g. "N0450F350".
    pub cruise: Option<String>,
    /// Remaining route clause tokens.
    pub route: Vec<String>,
    /// Total estimated elapsed time (item 16).
    pub estimated_elapsed: Option<Duration>,
    /// Resolved departure time.
    pub departure_time_utc: DateTime<Utc>,
}

impl FlightPlanRecord {
    /// Estimated arrival time, when the plan carries an elapsed time.
    #[must_use]
    pub fn estimated_arrival(&self) -> Option<DateTime<Utc>> {
        self.estimated_elapsed.map(|eet| self.departure_time_utc + eet)
    }
}

/// Parse a flight plan relative to the current time.
pub fn parse(text: &str) -> Result<FlightPlanRecord, FlightPlanError> {
    parse_at(text, Utc::now())
}

/// Parse a flight plan, resolving a missing DOF item against `now`.
///
/// Without a DOF item the departure is today at the filed time, moved to
/// tomorrow if that moment has already passed.
pub fn parse_at(text: &str, now: DateTime<Utc>) -> Result<FlightPlanRecord, FlightPlanError> {
    let body = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let fields: Vec<&str> = body.split('-').map(str::trim).collect();

    let (dep_index, departure_id, hhmm) = fields
        .iter()
        .enumerate()
        .find_map(|(i, field)| {
            let (ident, digits) = split_location_group(first_token(field)?)?;
            Some((i, ident, digits?))
        })
        .ok_or(FlightPlanError::MissingTimeGroup)?;

    let (callsign, flight_rules) = match fields.first() {
        Some(&"FPL") => (
            fields.get(1).filter(|s| !s.is_empty()).map(|s| (*s).to_string()),
            fields.get(2).and_then(|s| s.chars().next()),
        ),
        _ => (None, None),
    };

    // Item 9 precedes the equipment field, which can look like a designator.
    let aircraft_type = fields[..dep_index]
        .iter()
        .find_map(|field| aircraft_designator(first_token(field)?));

    let mut cruise = None;
    let mut route = Vec::new();
    let mut destination = None;
    for field in &fields[dep_index + 1..] {
        let Some(token) = first_token(field) else {
            continue;
        };
        if let Some((ident, eet)) = split_location_group(token) {
            destination = Some((ident, eet));
            break;
        }
        if cruise.is_none() && route.is_empty() {
            let mut tokens = field.split_whitespace();
            cruise = tokens.next().map(str::to_string);
            route.extend(tokens.map(str::to_string));
        }
    }
    let (destination_id, eet) = destination.ok_or(FlightPlanError::MissingDestination)?;

    let departure_clock = parse_hhmm(hhmm)
        .ok_or_else(|| FlightPlanError::InvalidTime(hhmm.to_string()))?;
    let estimated_elapsed = eet.and_then(parse_elapsed);

    let departure_time_utc = match date_of_flight(&fields)? {
        Some(date) => date.and_time(departure_clock).and_utc(),
        None => {
            let today = now.date_naive().and_time(departure_clock).and_utc();
            if today < now {
                today + Duration::days(1)
            } else {
                today
            }
        }
    };

    Ok(FlightPlanRecord {
        callsign,
        flight_rules,
        aircraft_type,
        departure_id: departure_id.to_string(),
        destination_id: destination_id.to_string(),
        cruise,
        route,
        estimated_elapsed,
        departure_time_utc,
    })
}

fn first_token(field: &str) -> Option<&str> {
    field.split_whitespace().next()
}

/// Split `XXXX` or `XXXXHHMM` into the location indicator and optional time.
fn split_location_group(token: &str) -> Option<(&str, Option<&str>)> {
    let ident = token.get(..4)?;
    if !ident.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    match token.get(4..)? {
        "" => Some((ident, None)),
        rest if rest.len() == 4 && rest.chars().all(|c| c.is_ascii_digit()) => {
            Some((ident, Some(rest)))
        }
        _ => None,
    }
}

/// Type designator from an item 9 token such as `C172/L` or `2F16/M`.
fn aircraft_designator(token: &str) -> Option<String> {
    let (designator, wake) = token.split_once('/')?;
    if wake.is_empty() || !wake.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    // A leading number of aircraft is only present for formation flights.
    let designator = designator.trim_start_matches(|c: char| c.is_ascii_digit());
    let valid = (2..=4).contains(&designator.len())
        && designator.starts_with(|c: char| c.is_ascii_alphabetic())
        && designator.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| designator.to_string())
}

fn parse_hhmm(digits: &str) -> Option<NaiveTime> {
    let hours = digits.get(..2)?.parse::<u32>().ok()?;
    let minutes = digits.get(2..4)?.parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Elapsed time groups may exceed 24 hours, so they are not clock times.
fn parse_elapsed(digits: &str) -> Option<Duration> {
    let hours = digits.get(..2)?.parse::<i64>().ok()?;
    let minutes = digits.get(2..4)?.parse::<i64>().ok()?;
    (minutes < 60).then(|| Duration::minutes(hours * 60 + minutes))
}

/// Find and decode a `DOF/YYMMDD` item anywhere in the message.
fn date_of_flight(fields: &[&str]) -> Result<Option<NaiveDate>, FlightPlanError> {
    let Some(raw) = fields
        .iter()
        .flat_map(|field| field.split_whitespace())
        .find_map(|token| token.strip_prefix("DOF/"))
    else {
        return Ok(None);
    };

    let invalid = || FlightPlanError::InvalidDate(raw.to_string());
    if raw.len() != 6 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let year = 2000 + raw[..2].parse::<i32>().map_err(|_| invalid())?;
    let month = raw[2..4].parse::<u32>().map_err(|_| invalid())?;
    let day = raw[4..6].parse::<u32>().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(invalid)
}
