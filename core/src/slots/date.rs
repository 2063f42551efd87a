use regex::Regex;
use std::{fmt::Display, sync::LazyLock};
use tracing::error;

use super::SlotError;

const DATE_PATTERN: &str = r"^[0-9]{2}-[0-9]{2}-[0-9]{4}$";

static DATE_FORMAT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(DATE_PATTERN)
        .inspect_err(|e| error!(pattern = DATE_PATTERN, "Failed to compile date pattern: {e}"))
        .ok()
});

/// A date string that has passed the `DD-MM-YYYY` shape check.
///
/// Only the shape is checked: `31-02-2024` and `99-99-9999` are both accepted,
/// the value is compared verbatim against the `date_slot` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotDate(String);

impl SlotDate {
    /// Validates `input` against `DD-MM-YYYY`
    ///
    /// # Errors
    /// `SlotError::InvalidDate` when the input doesn't have exactly two digits, a dash, two
    /// digits, a dash and four digits.
    pub fn parse(input: &str) -> Result<Self, SlotError> {
        let Some(re) = DATE_FORMAT.as_ref() else {
            error!(input, "Date pattern unavailable, rejecting date");
            return Err(SlotError::InvalidDate(input.to_string()));
        };
        if re.is_match(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(SlotError::InvalidDate(input.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SlotDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
