//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` for traces shown only with `--verbose`
//! - [`LogSink`], the one-way diagnostic channel the agent reports through
//!
//! # Example
//!
//! ```ignore
//! // Simple logging
//! log!("simulate"; "loaded {} modules", count);
//!
//! // Only printed when verbose mode is on
//! debug!("agent"; "applying {} deltas", deltas.len());
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument or `[log] verbose`)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "agent" => prefix.bright_blue().bold().to_string(),
        "hotreload" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Diagnostic Sink
// ============================================================================

/// One-way diagnostic channel.
///
/// Everything the agent wants its host to see (handler failures, malformed
/// declarations, patch errors, "Deltas applied.") goes through here. The
/// agent never returns these as errors.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Sink that prints under the `[hotreload]` prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl LogSink for TerminalSink {
    fn log(&self, message: &str) {
        log("hotreload", message);
    }
}

/// Sink that keeps every message in memory.
///
/// Used by `hotdelta simulate` to print a report after the run, and by tests
/// to assert on diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages logged so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Number of messages containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

// ============================================================================
// Tests
// ============================================================================
