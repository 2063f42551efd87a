use std::fmt::Display;

use super::SlotError;

/// Time of day read from the `date_slot` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    /// Parses `H:M` or `HH:MM`
    ///
    /// # Errors
    /// `SlotError::MalformedTime` unless the input is two `:`-separated integers with
    /// the hour in `0..=23` and the minute in `0..=59`.
    pub fn parse(input: &str) -> Result<Self, SlotError> {
        let malformed = || SlotError::MalformedTime(input.to_string());
        let (hour, minute) = input.split_once(':').ok_or_else(malformed)?;
        let hour: u8 = hour.parse().map_err(|_| malformed())?;
        let minute: u8 = minute.parse().map_err(|_| malformed())?;
        if hour > 23 || minute > 59 {
            return Err(malformed());
        }
        Ok(Self { hour, minute })
    }

    /// `H:MM AM/PM`, midnight and noon both render with hour 12
    #[must_use]
    pub fn to_twelve_hour(&self) -> String {
        let period = if self.hour < 12 { "AM" } else { "PM" };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{hour}:{:02} {period}", self.minute)
    }
}

impl Display for SlotTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
