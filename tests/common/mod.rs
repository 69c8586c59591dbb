use std::fs::File;
use std::io::Error;
use std::path::Path;

pub fn write_seed_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["customer", "amount", "currency"])?;

    for i in 1..=rows {
        wtr.write_record([i.to_string().as_str(), "100.00", "EUR"])?;
    }

    wtr.flush()?;
    Ok(())
}
