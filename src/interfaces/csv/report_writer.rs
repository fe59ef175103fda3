use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Final state of one user, as printed by the CLI driver.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct ReportRow {
    pub user: String,
    pub balance: u64,
    pub plan: String,
    pub status: String,
    pub days_remaining: i64,
}

/// CSV writer for the final ledger report.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { writer: csv::Writer::from_writer(sink) }
    }

    pub fn write_rows<I: IntoIterator<Item = ReportRow>>(&mut self, rows: I) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
