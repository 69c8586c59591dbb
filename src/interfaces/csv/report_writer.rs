use crate::domain::billing::BillingAttempt;
use crate::error::Result;
use std::io::Write;

/// Writes finalized billing attempts as a CSV report.
///
/// One row per attempt: id, invoice id, status, charging date and the
/// status message (empty for successful charges).
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(sink),
        }
    }

    pub fn write_attempts<I>(&mut self, attempts: I) -> Result<()>
    where
        I: IntoIterator<Item = BillingAttempt>,
    {
        for attempt in attempts {
            self.writer.serialize(attempt)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
