mod date;
pub mod query;
pub mod store;
mod time;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

pub use date::SlotDate;
pub use query::{availability_by_doctor, availability_by_specialization, NO_AVAILABILITY};
pub use store::{CsvSlotSource, InMemorySlotSource, SlotSource, SlotStore, StoreError};
pub use time::SlotTime;

/// One bookable unit of the slot table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRecord {
    /// `DD-MM-YYYY`, as stored
    pub date: String,
    /// 24-hour `HH:MM`, as stored
    pub time: String,
    pub doctor_name: String,
    pub specialization: String,
    pub is_available: bool,
}

impl SlotRecord {
    pub fn new(
        date: impl Into<String>,
        time: impl Into<String>,
        doctor_name: impl Into<String>,
        specialization: impl Into<String>,
        is_available: bool,
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            doctor_name: doctor_name.into(),
            specialization: specialization.into(),
            is_available,
        }
    }
}

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("The date must be in the format 'DD-MM-YYYY', got `{0}`")]
    InvalidDate(String),
    #[error("Malformed slot time `{0}`, expected `HH:MM`")]
    MalformedTime(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Doctors known to the practice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Doctor {
    #[serde(rename = "kevin anderson")]
    KevinAnderson,
    #[serde(rename = "robert martinez")]
    RobertMartinez,
    #[serde(rename = "susan davis")]
    SusanDavis,
    #[serde(rename = "daniel miller")]
    DanielMiller,
    #[serde(rename = "sarah wilson")]
    SarahWilson,
    #[serde(rename = "michael green")]
    MichaelGreen,
    #[serde(rename = "lisa brown")]
    LisaBrown,
    #[serde(rename = "jane smith")]
    JaneSmith,
    #[serde(rename = "emily johnson")]
    EmilyJohnson,
    #[serde(rename = "john doe")]
    JohnDoe,
}

impl Doctor {
    pub const ALL: [Doctor; 10] = [
        Self::KevinAnderson,
        Self::RobertMartinez,
        Self::SusanDavis,
        Self::DanielMiller,
        Self::SarahWilson,
        Self::MichaelGreen,
        Self::LisaBrown,
        Self::JaneSmith,
        Self::EmilyJohnson,
        Self::JohnDoe,
    ];

    /// Name as it appears in the `doctor_name` column
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KevinAnderson => "kevin anderson",
            Self::RobertMartinez => "robert martinez",
            Self::SusanDavis => "susan davis",
            Self::DanielMiller => "daniel miller",
            Self::SarahWilson => "sarah wilson",
            Self::MichaelGreen => "michael green",
            Self::LisaBrown => "lisa brown",
            Self::JaneSmith => "jane smith",
            Self::EmilyJohnson => "emily johnson",
            Self::JohnDoe => "john doe",
        }
    }
}

impl Display for Doctor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Practice categories a doctor can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    GeneralDentist,
    CosmeticDentist,
    Prosthodontist,
    PediatricDentist,
    EmergencyDentist,
    OralSurgeon,
    Orthodontist,
}

impl Specialization {
    pub const ALL: [Specialization; 7] = [
        Self::GeneralDentist,
        Self::CosmeticDentist,
        Self::Prosthodontist,
        Self::PediatricDentist,
        Self::EmergencyDentist,
        Self::OralSurgeon,
        Self::Orthodontist,
    ];

    /// Category as it appears in the `specialization` column
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralDentist => "general_dentist",
            Self::CosmeticDentist => "cosmetic_dentist",
            Self::Prosthodontist => "prosthodontist",
            Self::PediatricDentist => "pediatric_dentist",
            Self::EmergencyDentist => "emergency_dentist",
            Self::OralSurgeon => "oral_surgeon",
            Self::Orthodontist => "orthodontist",
        }
    }
}

impl Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
