//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{Local, Utc};
use serde_json::Value;

use folio_core::sync::ConnectionStatus;
use folio_core::AppState;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print one state snapshot
    pub fn print_state(&self, state: &AppState) {
        match self.format {
            OutputFormat::Human => {
                println!("[{}] {}", Local::now().format("%H:%M:%S"), summarize(state));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"at": Utc::now().to_rfc3339(), "state": state})
                );
            }
            OutputFormat::Quiet => {
                println!("{}", describe_count(state));
            }
        }
    }

    /// Print a connection status change
    pub fn print_status(&self, status: ConnectionStatus) {
        match self.format {
            OutputFormat::Human => println!("-- {}", status_label(status)),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"status": status_label(status)}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
    }
}

/// One-line summary of a snapshot
pub fn summarize(state: &AppState) -> String {
    let mut parts = vec![match state.visitor_count() {
        Some(n) => format!("{} visitor{}", n, if n == 1 { "" } else { "s" }),
        None => format!("visitors: {}", describe_count(state)),
    }];

    if state.donation_active {
        parts.push(format!("donation: {}", describe_donation(state)));
    }

    if state.polls.as_array().map_or(true, |records| !records.is_empty()) {
        parts.push(format!("polls: {}", describe_polls(state)));
    }

    parts.join(" | ")
}

fn describe_donation(state: &AppState) -> String {
    if let Some(donation) = state.donation_details() {
        let mut text = donation.name.clone().unwrap_or_else(|| "anonymous".to_string());
        if let Some(amount) = donation.amount {
            text.push_str(&format!(" ({:.2})", amount));
        }
        if let Some(message) = donation.message {
            text.push_str(&format!(" \"{}\"", truncate(&message, 40)));
        }
        return text;
    }

    match &state.donation {
        Some(Value::String(s)) => truncate(s, 40),
        Some(other) => truncate(&other.to_string(), 40),
        None => String::new(),
    }
}

fn describe_count(state: &AppState) -> String {
    match &state.count {
        Value::String(s) => truncate(s, 40),
        other => truncate(&other.to_string(), 40),
    }
}

fn describe_polls(state: &AppState) -> String {
    let Some(records) = state.polls.as_array() else {
        return truncate(&state.polls.to_string(), 40);
    };
    let results = state.poll_results();
    if results.len() != records.len() {
        return format!("{} record(s)", records.len());
    }
    results
        .iter()
        .map(|p| format!("{} {}", p.option, p.votes))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_summarize_initial() {
        assert_eq!(summarize(&AppState::new()), "0 visitors");
    }

    #[test]
    fn test_summarize_full() {
        let state = AppState {
            donation_active: true,
            donation: Some(json!({"name": "ada", "amount": 5, "message": "thanks"})),
            count: json!(1),
            polls: json!([
                {"option": "A", "votes": 3},
                {"option": "B", "votes": 1}
            ]),
        };
        assert_eq!(
            summarize(&state),
            "1 visitor | donation: ada (5.00) \"thanks\" | polls: A 3, B 1"
        );
    }

    #[test]
    fn test_summarize_opaque_payloads() {
        let state = AppState {
            donation_active: true,
            donation: Some(json!("gift")),
            count: json!(2),
            polls: json!([[1, 2]]),
        };
        assert_eq!(
            summarize(&state),
            "2 visitors | donation: gift | polls: 1 record(s)"
        );
    }

    #[test]
    fn test_summarize_malformed_count_and_polls() {
        let state = AppState {
            count: json!("lots"),
            polls: json!({"option": "A"}),
            ..AppState::new()
        };
        assert_eq!(
            summarize(&state),
            "visitors: lots | polls: {\"option\":\"A\"}"
        );
    }

    #[test]
    fn test_summarize_null_polls_still_shown() {
        let state = AppState {
            polls: Value::Null,
            ..AppState::new()
        };
        assert_eq!(summarize(&state), "0 visitors | polls: null");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ünïcödé text", 6), "ünï...");
    }
}
