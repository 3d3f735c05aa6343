//! Command handlers
//!
//! Each handler takes the engine and an [`Output`](crate::output::Output)
//! so it can run against an in-memory store in tests.

pub mod account;
pub mod commission;
pub mod wallet;

use serde_json::Value;

use crate::error::CliResult;
use crate::logic::format_output;
use crate::output::Output;

/// Print `data` in the requested format under an optional header
pub(crate) fn render(output: &dyn Output, title: &str, data: &Value, format: &str) -> CliResult<()> {
    if format == "json" {
        return output.print_json(data);
    }
    output.header(title)?;
    output.print(format_output(data, format)?.trim_end())
}
