//! Tracing setup and human-readable rendering of recorded errors.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::errors::ErrorEvent;

const LINE_COLOR: &str = "\x1b[35m";
const CONTEXT_COLOR: &str = "\x1b[32m";
const RESET_COLOR: &str = "\x1b[0m";

/// Install the global tracing subscriber: env-filter + fmt + span-trace
/// capture. Call once at process start; repeated calls are ignored.
///
/// Filtering follows `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}

/// Color mode for rendered error events.
///
/// - [`Auto`](FormatterMode::Auto): colored iff stderr is a terminal
/// - [`Colored`](FormatterMode::Colored): always colored
/// - [`Plain`](FormatterMode::Plain): never colored (log files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Render recorded error events as human-readable text with explicit
/// color control.
///
/// # Examples
///
/// ```
/// use dispatchflow::errors::ErrorEvent;
/// use dispatchflow::telemetry::{pretty_print_with_mode, FormatterMode};
///
/// let events = vec![ErrorEvent::node("planning", "no drivers match")];
/// let plain = pretty_print_with_mode(&events, FormatterMode::Plain);
/// assert!(!plain.contains("\x1b["));
/// assert!(plain.contains("no drivers match"));
/// ```
pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let colored = mode.is_colored();
    let mut out = String::new();
    for (idx, event) in events.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        if colored {
            out.push_str(&format!(
                "[{idx}] {} | {CONTEXT_COLOR}{}{RESET_COLOR}\n",
                event.when.to_rfc3339(),
                event.scope.label()
            ));
            out.push_str(&format!(
                "{LINE_COLOR}  error: {}{RESET_COLOR}\n",
                event.message
            ));
        } else {
            out.push_str(&format!(
                "[{idx}] {} | {}\n",
                event.when.to_rfc3339(),
                event.scope.label()
            ));
            out.push_str(&format!("  error: {}\n", event.message));
        }
        if !event.details.is_null() {
            if colored {
                out.push_str(&format!(
                    "{LINE_COLOR}  details: {}{RESET_COLOR}\n",
                    event.details
                ));
            } else {
                out.push_str(&format!("  details: {}\n", event.details));
            }
        }
    }
    out
}

/// Render with auto-detected color support.
pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}
