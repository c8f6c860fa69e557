//! Date patterns for date elements.
//!
//! Date text is computed every time a date element is materialized, from a
//! [`Clock`] and the element's [`DateFormat`]. It is never cached.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported date patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// `DD/MM/YYYY`
    #[default]
    DayMonthYearSlash,
    /// `MM/DD/YYYY`
    MonthDayYearSlash,
    /// `YYYY-MM-DD`
    Iso,
    /// `DD-MM-YYYY`
    DayMonthYearDash,
    /// `Month DD, YYYY`
    LongForm,
}

impl DateFormat {
    /// Every supported pattern, in menu order.
    pub const ALL: [Self; 5] = [
        Self::DayMonthYearSlash,
        Self::MonthDayYearSlash,
        Self::Iso,
        Self::DayMonthYearDash,
        Self::LongForm,
    ];

    /// The user-facing pattern string.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::DayMonthYearSlash => "DD/MM/YYYY",
            Self::MonthDayYearSlash => "MM/DD/YYYY",
            Self::Iso => "YYYY-MM-DD",
            Self::DayMonthYearDash => "DD-MM-YYYY",
            Self::LongForm => "Month DD, YYYY",
        }
    }

    /// Parse a pattern string. Unknown patterns fall back to the default.
    #[must_use]
    pub fn from_pattern(pattern: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|f| f.pattern() == pattern.trim())
            .unwrap_or_default()
    }

    /// Render a date in this pattern.
    #[must_use]
    pub fn render(self, date: NaiveDate) -> String {
        let fmt = match self {
            Self::DayMonthYearSlash => "%d/%m/%Y",
            Self::MonthDayYearSlash => "%m/%d/%Y",
            Self::Iso => "%Y-%m-%d",
            Self::DayMonthYearDash => "%d-%m-%Y",
            Self::LongForm => "%B %d, %Y",
        };
        date.format(fmt).to_string()
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pattern())
    }
}

impl Serialize for DateFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.pattern())
    }
}

impl<'de> Deserialize<'de> for DateFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = Option::<String>::deserialize(deserializer)?;
        Ok(pattern.map_or_else(Self::default, |p| Self::from_pattern(&p)))
    }
}

/// Source of "today" for date elements.
pub trait Clock: Send + Sync {
    /// The current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a settable date.
#[derive(Debug)]
pub struct FixedClock {
    date: std::sync::RwLock<NaiveDate>,
}

impl FixedClock {
    /// Create a clock that always reports `date`.
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: std::sync::RwLock::new(date),
        }
    }

    /// Move the clock to another date.
    pub fn set(&self, date: NaiveDate) {
        *self
            .date
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self
            .date
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date")
    }

    #[test]
    fn test_render_patterns() {
        assert_eq!(DateFormat::DayMonthYearSlash.render(day()), "07/03/2024");
        assert_eq!(DateFormat::MonthDayYearSlash.render(day()), "03/07/2024");
        assert_eq!(DateFormat::Iso.render(day()), "2024-03-07");
        assert_eq!(DateFormat::DayMonthYearDash.render(day()), "07-03-2024");
        assert_eq!(DateFormat::LongForm.render(day()), "March 07, 2024");
    }

    #[test]
    fn test_unknown_pattern_defaults() {
        assert_eq!(DateFormat::from_pattern("YYYY/DD"), DateFormat::DayMonthYearSlash);
        let parsed: DateFormat = serde_json::from_str("\"nonsense\"").expect("parse");
        assert_eq!(parsed, DateFormat::DayMonthYearSlash);
        let parsed: DateFormat = serde_json::from_str("null").expect("parse null");
        assert_eq!(parsed, DateFormat::DayMonthYearSlash);
    }

    #[test]
    fn test_pattern_round_trip() {
        for format in DateFormat::ALL {
            let json = serde_json::to_string(&format).expect("serialize");
            let back: DateFormat = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, format);
        }
    }

    #[test]
    fn test_fixed_clock_moves() {
        let clock = FixedClock::new(day());
        assert_eq!(clock.today(), day());
        let next = day().succ_opt().expect("next day");
        clock.set(next);
        assert_eq!(clock.today(), next);
    }
}
