use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{
    query::{availability_by_doctor, availability_by_specialization},
    Doctor, SlotDate, SlotError, SlotRecord, Specialization,
};

/// Rows shown in the debug log after every load
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read slot table `{path}`: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("Invalid `is_available` value `{value}` on line {line}")]
    InvalidAvailability { line: u64, value: String },
}

/// Somewhere slot rows can be read from.
///
/// Every call to `load` is expected to return the table's current contents, nothing is cached
/// between calls.
pub trait SlotSource: Send + Sync {
    fn load(&self) -> Result<Vec<SlotRecord>, StoreError>;
}

/// Reads the slot table from a CSV file with the columns `date_slot`, `doctor_name`,
/// `specialization` and `is_available`. Other columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvSlotSource {
    path: PathBuf,
}

impl CsvSlotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, source: csv::Error) -> StoreError {
        StoreError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date_slot: String,
    doctor_name: String,
    specialization: String,
    is_available: String,
}

impl CsvRow {
    fn into_record(self, line: u64) -> Result<SlotRecord, StoreError> {
        let is_available =
            parse_flag(&self.is_available).ok_or_else(|| StoreError::InvalidAvailability {
                line,
                value: self.is_available.clone(),
            })?;
        // "DD-MM-YYYY HH:MM": date is the first token, time the last
        let date = self.date_slot.split(' ').next().unwrap_or_default();
        let time = self.date_slot.split(' ').last().unwrap_or_default();
        Ok(SlotRecord {
            date: date.to_string(),
            time: time.to_string(),
            doctor_name: self.doctor_name,
            specialization: self.specialization,
            is_available,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl SlotSource for CsvSlotSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Vec<SlotRecord>, StoreError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.read_error(e))?;
        let headers = reader.headers().map_err(|e| self.read_error(e))?.clone();

        let mut records = vec![];
        for row in reader.records() {
            let row = row.map_err(|e| self.read_error(e))?;
            let line = row.position().map_or(0, csv::Position::line);
            let raw: CsvRow = row
                .deserialize(Some(&headers))
                .map_err(|e| self.read_error(e))?;
            records.push(raw.into_record(line)?);
        }
        debug!(row_count = records.len(), "Loaded slot table");
        Ok(records)
    }
}

/// A fixed set of rows, mostly useful for tests and demos
#[derive(Debug, Clone, Default)]
pub struct InMemorySlotSource {
    records: Vec<SlotRecord>,
}

impl InMemorySlotSource {
    #[must_use]
    pub fn new(records: Vec<SlotRecord>) -> Self {
        Self { records }
    }
}

impl SlotSource for InMemorySlotSource {
    fn load(&self) -> Result<Vec<SlotRecord>, StoreError> {
        Ok(self.records.clone())
    }
}

/// Handle the availability tools read through, attached to the client as state.
///
/// Each query reloads the whole table from its source.
pub struct SlotStore {
    source: Box<dyn SlotSource>,
}

impl SlotStore {
    pub fn new(source: impl SlotSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Reads the current contents of the table
    ///
    /// # Errors
    /// Whatever the underlying source fails with
    pub fn load(&self) -> Result<Vec<SlotRecord>, StoreError> {
        let records = self.source.load()?;
        for record in records.iter().take(PREVIEW_ROWS) {
            debug!(?record, "slot row");
        }
        Ok(records)
    }

    /// Lists the open slots of `doctor` on `date`
    ///
    /// # Errors
    /// If the table can't be loaded
    pub fn by_doctor(&self, date: &SlotDate, doctor: Doctor) -> Result<String, SlotError> {
        info!(%doctor, %date, "Checking availability for doctor");
        let records = self.load()?;
        Ok(availability_by_doctor(&records, date, doctor))
    }

    /// Lists the open slots of every doctor with `specialization` on `date`
    ///
    /// # Errors
    /// If the table can't be loaded or one of the matching rows has a malformed time
    pub fn by_specialization(
        &self,
        date: &SlotDate,
        specialization: Specialization,
    ) -> Result<String, SlotError> {
        info!(%specialization, %date, "Checking availability for specialization");
        let records = self.load()?;
        availability_by_specialization(&records, date, specialization)
    }
}
