//! Departure time handling.
//!
//! Timetables and reminders carry a time of day without a date. Clients
//! send "HH:MM" (or "HH:MM:SS" as echoed back by the API); reminders are
//! anchored to the day after they are created.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of day at which a bus leaves a stop.
///
/// # Examples
///
/// ```
/// use bustrack_server::domain::DepartureTime;
///
/// let t = DepartureTime::parse("07:45").unwrap();
/// assert_eq!(t.to_string(), "07:45:00");
///
/// assert!(DepartureTime::parse("7:45").is_err());
/// assert!(DepartureTime::parse("24:00").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepartureTime(NaiveTime);

impl DepartureTime {
    /// Wrap a `NaiveTime`, dropping sub-second precision.
    pub fn new(time: NaiveTime) -> Self {
        Self(time.with_nanosecond(0).unwrap_or(time))
    }

    /// Parse "HH:MM" or "HH:MM:SS".
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let bytes = s.as_bytes();
        if bytes.len() != 5 && bytes.len() != 8 {
            return Err(TimeError::new("expected HH:MM format"));
        }

        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        if hour > 23 {
            return Err(TimeError::new("hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        let second = if bytes.len() == 8 {
            if bytes[5] != b':' {
                return Err(TimeError::new("expected colon at position 5"));
            }
            let second = parse_two_digits(&bytes[6..8])
                .ok_or_else(|| TimeError::new("invalid second digits"))?;
            if second > 59 {
                return Err(TimeError::new("second must be 0-59"));
            }
            second
        } else {
            0
        };

        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(|| TimeError::new("invalid time"))
    }

    /// Returns the underlying time of day.
    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// The moment a reminder created on `today` should fire: the next day
    /// at this time.
    pub fn reminder_for(&self, today: NaiveDate) -> NaiveDateTime {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        tomorrow.and_time(self.0)
    }
}

/// Parse two ASCII digits into a number.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = bytes[0].checked_sub(b'0').filter(|&d| d <= 9)?;
    let d2 = bytes[1].checked_sub(b'0').filter(|&d| d <= 9)?;
    Some((d1 * 10 + d2) as u32)
}

impl fmt::Debug for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DepartureTime({})", self)
    }
}

impl fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}

impl Serialize for DepartureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DepartureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any valid HH:MM parses and displays with a zero seconds field
        #[test]
        fn valid_hhmm_roundtrip(h in 0u32..24, m in 0u32..60) {
            let s = format!("{:02}:{:02}", h, m);
            let t = DepartureTime::parse(&s).unwrap();
            prop_assert_eq!(t.to_string(), format!("{s}:00"));
        }

        /// Display output always parses back to the same value
        #[test]
        fn display_parses_back(h in 0u32..24, m in 0u32..60, s in 0u32..60) {
            let t = DepartureTime::new(NaiveTime::from_hms_opt(h, m, s).unwrap());
            prop_assert_eq!(DepartureTime::parse(&t.to_string()).unwrap(), t);
        }
    }
}
