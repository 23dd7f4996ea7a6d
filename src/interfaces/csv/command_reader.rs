use crate::domain::shares::InviteeRequest;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Register,
    Create,
    MarkPaid,
    Pay,
    Invite,
    Reconcile,
    Delete,
}

/// One line of a ledger script. Which columns matter depends on `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandRow {
    pub op: Operation,
    /// Email of the user performing the command.
    pub actor: String,
    /// Split title.
    pub split: Option<String>,
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub split_type: Option<String>,
    pub participants: Option<String>,
    pub target: Option<String>,
}

/// Reads ledger commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting short rows, so
/// trailing optional columns may be left out.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands; a malformed row yields an error and the
    /// stream carries on.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

/// Parses `email[=amount];email[=amount];...`. Empty entries are skipped.
pub fn parse_participants(raw: &str) -> Result<Vec<InviteeRequest>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((email, amount)) => {
                let amount = Decimal::from_str(amount.trim()).map_err(|e| {
                    LedgerError::invalid(format!("bad amount for {}: {e}", email.trim()))
                })?;
                Ok(InviteeRequest::with_amount(email.trim(), amount))
            }
            None => Ok(InviteeRequest::new(entry)),
        })
        .collect()
}
