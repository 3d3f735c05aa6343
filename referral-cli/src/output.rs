//! Output abstraction for testable printing
//!
//! Commands print through [`Output`] so tests can capture what would have
//! been written to the terminal.

use crate::error::CliResult;

pub trait Output: Send + Sync {
    /// Print normal output
    fn print(&self, msg: &str) -> CliResult<()>;

    /// Print formatted JSON
    fn print_json(&self, data: &serde_json::Value) -> CliResult<()> {
        self.print(&serde_json::to_string_pretty(data)?)
    }

    /// Print error message
    fn error(&self, msg: &str) -> CliResult<()>;

    fn success(&self, msg: &str) -> CliResult<()> {
        self.print(&format!("✅ {}", msg))
    }

    fn warning(&self, msg: &str) -> CliResult<()> {
        self.print(&format!("⚠️  {}", msg))
    }

    fn info(&self, msg: &str) -> CliResult<()> {
        self.print(&format!("ℹ️  {}", msg))
    }

    /// Print a section header
    fn header(&self, title: &str) -> CliResult<()> {
        self.print(&format!("\n{}\n{}", title, "=".repeat(title.len())))
    }
}

/// Standard console output implementation
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn print(&self, msg: &str) -> CliResult<()> {
        println!("{}", msg);
        Ok(())
    }

    fn error(&self, msg: &str) -> CliResult<()> {
        eprintln!("❌ {}", msg);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_mock_output_captures_messages() {
        let output = MockOutput::new();
        output.print("test message").unwrap();
        output.success("done").unwrap();
        output.error("boom").unwrap();

        assert_eq!(output.get_messages(), vec!["test message".to_string(), "✅ done".to_string()]);
        assert_eq!(output.get_errors(), vec!["boom".to_string()]);
        output.assert_contains_message("done");
    }

    #[test]
    fn test_header_underlines_title() {
        let output = MockOutput::new();
        output.header("Downline").unwrap();
        assert!(output.transcript().contains("Downline\n========"));
    }
}
