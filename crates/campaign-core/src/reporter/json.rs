//! JSON reporter

use serde::Serialize;

use super::ReportError;

pub struct JsonReporter;

impl JsonReporter {
    pub fn format<T: Serialize>(item: &T, pretty: bool) -> Result<String, ReportError> {
        let mut output = if pretty {
            serde_json::to_string_pretty(item)?
        } else {
            serde_json::to_string(item)?
        };
        output.push('\n');
        Ok(output)
    }
}
