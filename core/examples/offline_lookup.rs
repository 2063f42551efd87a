use slotdesk::slots::{CsvSlotSource, Doctor, SlotDate, SlotStore, Specialization};

fn main() -> Result<(), slotdesk::error::Error> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/doctor_availability.csv");
    let store = SlotStore::new(CsvSlotSource::new(path));
    let date = SlotDate::parse("07-08-2024")?;

    println!("{}\n", store.by_doctor(&date, Doctor::JohnDoe)?);
    println!("{}", store.by_specialization(&date, Specialization::GeneralDentist)?);

    if let Err(e) = SlotDate::parse("7-8-2024") {
        println!("{e}");
    }
    Ok(())
}
