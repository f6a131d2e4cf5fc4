use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 12] = [
    "command", "caller", "role", "order", "maid", "job_type", "duration", "charges", "lat", "lng",
    "score", "comment",
];

/// Writes a command log that takes `orders` orders through the full
/// lifecycle: create, one application, acceptance, completion.
pub fn generate_lifecycle_log(path: &Path, orders: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    for i in 1..=orders {
        let order = i.to_string();
        let maid = format!("M{}", i % 7);
        wtr.write_record([
            "create", "owner1", "homeowner", "", "", "Cleaning", "2 hours", "300", "24.86",
            "67.01", "", "",
        ])?;
        wtr.write_record(["apply", &maid, "maid", &order, "", "", "", "", "", "", "", ""])?;
        wtr.write_record([
            "accept", "owner1", "homeowner", &order, &maid, "", "", "", "", "", "", "",
        ])?;
        wtr.write_record(["complete", &maid, "maid", &order, "", "", "", "", "", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
