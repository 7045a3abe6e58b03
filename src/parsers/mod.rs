pub mod cobertura;

use std::path::Path;

use crate::error::Result;
use crate::model::CoverageData;
use crate::notify::Notifier;

use cobertura::CoberturaParser;

/// Every coverage parser implements this trait.
pub trait Parser {
    /// Parse the input bytes into our coverage model.
    fn parse(&self, input: &[u8]) -> Result<CoverageData>;
}

/// Read and parse a Cobertura file from disk.
pub fn parse_file(path: &Path) -> Result<CoverageData> {
    let content = std::fs::read(path)?;
    CoberturaParser.parse(&content)
}

/// Parse a Cobertura document, reporting any failure to `notifier` instead
/// of returning it.
pub fn load(input: &[u8], notifier: &dyn Notifier) -> Option<CoverageData> {
    report_failure(CoberturaParser.parse(input), notifier)
}

/// Like [`load`], reading the document from `path` first.
pub fn load_file(path: &Path, notifier: &dyn Notifier) -> Option<CoverageData> {
    report_failure(parse_file(path), notifier)
}

fn report_failure(result: Result<CoverageData>, notifier: &dyn Notifier) -> Option<CoverageData> {
    match result {
        Ok(data) => Some(data),
        Err(e) => {
            notifier.show_error(e.title(), &e.to_string());
            None
        }
    }
}
