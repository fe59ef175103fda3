use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// Kinds of operation the CSV driver can execute.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    Register,
    Link,
    Purchase,
    Tip,
    Trade,
    Subscribe,
    CancelDowngrade,
    Status,
}

/// One row of the operation script: `op, user, a, b, c, d`. The meaning of
/// the positional arguments depends on the operation.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct Operation {
    pub op: OpKind,
    pub user: String,
    pub a: Option<String>,
    pub b: Option<String>,
    pub c: Option<String>,
    pub d: Option<String>,
}

impl Operation {
    /// Fetches a required positional argument.
    pub fn require<'a>(&self, value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LedgerError::InvalidArgument(format!("missing argument {name}")))
    }
}

/// Streaming reader for operation scripts.
pub struct OpReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OpReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
