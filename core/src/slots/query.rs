//! Filter-and-format queries over a loaded slot table.
//!
//! Both queries are pure: the same rows and arguments always produce the same text.

use std::collections::BTreeMap;
use tracing::debug;

use super::{Doctor, SlotDate, SlotError, SlotRecord, SlotTime, Specialization};

/// Returned by both queries when nothing is open
pub const NO_AVAILABILITY: &str = "No availability in the entire day";

/// Open slots of one doctor on one date.
///
/// Times are listed as stored (24-hour) in table order.
#[must_use]
pub fn availability_by_doctor(records: &[SlotRecord], date: &SlotDate, doctor: Doctor) -> String {
    let times: Vec<&str> = records
        .iter()
        .filter(|r| r.date == date.as_str() && r.doctor_name == doctor.as_str() && r.is_available)
        .map(|r| r.time.as_str())
        .collect();

    if times.is_empty() {
        return NO_AVAILABILITY.to_string();
    }
    format!(
        "This availability for {date}\nAvailable slots: {}",
        times.join(", ")
    )
}

/// Open slots on one date for every doctor of a specialization.
///
/// One block per doctor, doctors in ascending name order, each doctor's times in table order
/// and rendered as `H:MM AM/PM`.
///
/// # Errors
/// `SlotError::MalformedTime` if any matching row carries a time that isn't `HH:MM`
pub fn availability_by_specialization(
    records: &[SlotRecord],
    date: &SlotDate,
    specialization: Specialization,
) -> Result<String, SlotError> {
    let mut by_doctor: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    // rows with a blank doctor name belong to no group
    records
        .iter()
        .filter(|r| {
            r.date == date.as_str()
                && r.specialization == specialization.as_str()
                && r.is_available
                && !r.doctor_name.is_empty()
        })
        .for_each(|r| {
            by_doctor
                .entry(r.doctor_name.as_str())
                .or_default()
                .push(r.time.as_str());
        });
    debug!(?by_doctor, "Grouped open slots");

    if by_doctor.is_empty() {
        return Ok(NO_AVAILABILITY.to_string());
    }

    let mut output = format!("This availability for {date}\n");
    for (doctor, times) in by_doctor {
        let times = times
            .into_iter()
            .map(|t| SlotTime::parse(t).map(|t| t.to_twelve_hour()))
            .collect::<Result<Vec<_>, _>>()?;
        output.push_str(&format!(
            "{doctor}. Available slots: \n{}\n",
            times.join(", \n")
        ));
    }
    Ok(output)
}
