use crate::domain::split::{SplitRecord, SplitStatus, SplitType};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct SplitRow<'a> {
    title: &'a str,
    total: String,
    split_type: SplitType,
    status: SplitStatus,
    participants: usize,
    paid: usize,
    pending: usize,
}

impl<'a> From<&'a SplitRecord> for SplitRow<'a> {
    fn from(record: &'a SplitRecord) -> Self {
        let split = record.expense();
        Self {
            title: &split.title,
            total: split.total_amount.to_string(),
            split_type: split.split_type,
            status: record.effective_status(),
            participants: record.participants().len(),
            paid: record.participants().iter().filter(|p| p.is_paid()).count(),
            pending: record.open_pending().count(),
        }
    }
}

/// Writes a one-line-per-split report as CSV.
pub struct SplitWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SplitWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_splits(&mut self, records: &[SplitRecord]) -> Result<()> {
        if records.is_empty() {
            self.writer.write_record([
                "title",
                "total",
                "split_type",
                "status",
                "participants",
                "paid",
                "pending",
            ])?;
        }
        for record in records {
            self.writer.serialize(SplitRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
