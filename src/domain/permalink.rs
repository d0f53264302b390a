//! Dated detail permalinks: `/{year}/{mon}/{day}/{slug}-{code}-{id}/`.

use thiserror::Error;
use time::{Date, Month, OffsetDateTime, UtcOffset};

use crate::domain::content_types::normalize_short_code;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MAX_ID_DIGITS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermalinkError {
    #[error("invalid date `{year}/{month}/{day}`")]
    InvalidDate {
        year: String,
        month: String,
        day: String,
    },
    #[error("malformed permalink segment `{0}`")]
    Malformed(String),
}

/// The trailing `{slug}-{code}-{id}` segment of a detail URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermalinkTail {
    pub slug: String,
    pub type_code: String,
    pub id: i64,
}

impl PermalinkTail {
    pub fn parse(segment: &str) -> Result<Self, PermalinkError> {
        let malformed = || PermalinkError::Malformed(segment.to_string());

        let mut parts = segment.rsplitn(3, '-');
        let id_part = parts.next().ok_or_else(malformed)?;
        let code_part = parts.next().ok_or_else(malformed)?;
        let slug_part = parts.next().ok_or_else(malformed)?;

        if id_part.is_empty()
            || id_part.len() > MAX_ID_DIGITS
            || !id_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }
        let id = id_part.parse::<i64>().map_err(|_| malformed())?;
        let type_code = normalize_short_code(code_part).ok_or_else(malformed)?;

        let slug_valid = !slug_part.is_empty()
            && slug_part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !slug_valid {
            return Err(malformed());
        }

        Ok(Self {
            slug: slug_part.to_string(),
            type_code,
            id,
        })
    }
}

/// Parse the date components of a detail URL. The month is a three-letter
/// English abbreviation in any case; the day may be zero padded.
pub fn parse_url_date(year: &str, month: &str, day: &str) -> Result<Date, PermalinkError> {
    let invalid = || PermalinkError::InvalidDate {
        year: year.to_string(),
        month: month.to_string(),
        day: day.to_string(),
    };

    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if day.is_empty() || day.len() > 2 || !day.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let day: u8 = day.parse().map_err(|_| invalid())?;
    let month_index = MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| abbr.eq_ignore_ascii_case(month))
        .ok_or_else(invalid)?;
    let month = Month::try_from(month_index as u8 + 1).map_err(|_| invalid())?;

    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

/// Calendar date used for permalinks: the UTC date of the publish time.
pub fn permalink_date(publish_at: OffsetDateTime) -> Date {
    publish_at.to_offset(UtcOffset::UTC).date()
}

/// Canonical path for a dated content object.
pub fn canonical_path(date: Date, slug: &str, type_code: &str, id: i64) -> String {
    let month = MONTH_ABBREVIATIONS[usize::from(u8::from(date.month())) - 1];
    format!(
        "/{:04}/{month}/{}/{slug}-{}-{id}/",
        date.year(),
        date.day(),
        type_code.to_ascii_lowercase()
    )
}
