use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::UserKey;

/// Fractional digits kept for every recorded value.
pub const HOURS_SCALE: u32 = 1;

/// A weekly hours value normalized to exactly one fractional digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hours(Decimal);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseHoursError {
    #[error("hours value is empty")]
    Empty,
    #[error("`{input}` is not a decimal number")]
    Invalid { input: String },
}

impl Hours {
    /// Trims `input`, parses it as a decimal numeral and rounds half away from
    /// zero to one fractional digit. No range check is applied here.
    pub fn parse(input: &str) -> Result<Self, ParseHoursError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseHoursError::Empty);
        }

        let invalid = || ParseHoursError::Invalid { input: trimmed.to_owned() };
        if !is_decimal_numeral(trimmed) {
            return Err(invalid());
        }

        let value = Decimal::from_str(trimmed).map_err(|_| invalid())?;
        let hours = Self::from_decimal(value);
        // Values near `Decimal::MAX` have no room left for a fractional digit.
        if hours.0.scale() != HOURS_SCALE {
            return Err(invalid());
        }
        Ok(hours)
    }

    pub fn from_decimal(value: Decimal) -> Self {
        let mut rounded =
            value.round_dp_with_strategy(HOURS_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(HOURS_SCALE);
        if rounded.is_zero() {
            rounded.set_sign_positive(true);
        }
        Self(rounded)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

}

/// `[+-]?(digits[.digits*] | .digits)`. `Decimal::from_str` alone also takes
/// `_` separators, which are not accepted as hours input.
fn is_decimal_numeral(input: &str) -> bool {
    let unsigned =
        input.strip_prefix('+').or_else(|| input.strip_prefix('-')).unwrap_or(input);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());

    match fraction {
        None => !whole.is_empty() && all_digits(whole),
        Some(fraction) => {
            (!whole.is_empty() || !fraction.is_empty()) && all_digits(whole) && all_digits(fraction)
        }
    }
}

impl FromStr for Hours {
    type Err = ParseHoursError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest hours value stored for one registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursRecord {
    pub user_key: UserKey,
    pub hours: Hours,
    /// 1 after the first insert, incremented on every overwrite.
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursWrite {
    Inserted,
    Updated,
}

impl HoursWrite {
    pub fn from_revision(revision: i64) -> Self {
        if revision <= 1 {
            Self::Inserted
        } else {
            Self::Updated
        }
    }
}

/// Acceptance range applied by the reply collector after parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoursPolicy {
    pub min: Hours,
    pub max: Hours,
}

impl HoursPolicy {
    pub fn with_max_hours(max_hours: u32) -> Self {
        Self { min: Hours::from_decimal(Decimal::ZERO), max: Hours::from_decimal(max_hours.into()) }
    }

    pub fn accepts(&self, hours: Hours) -> bool {
        hours >= self.min && hours <= self.max
    }
}

impl Default for HoursPolicy {
    fn default() -> Self {
        Self::with_max_hours(168)
    }
}
