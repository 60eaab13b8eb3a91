//! Stack trace trimming
//!
//! Backtraces captured from test errors are full of frames belonging to the
//! engine, the runtime and the standard library. Only frames from test code
//! are worth showing.

/// Symbol prefixes of frames hidden from reported stack traces
pub const FRAMEWORK_FRAME_PREFIXES: &[&str] = &[
    "test_engine::models::error",
    "test_engine::executor",
    "test_engine::engine",
    "test_engine::fixture",
    "test_engine::results",
    "std::",
    "core::",
    "alloc::",
    "anyhow::",
    "tokio::",
    "<std::",
    "<core::",
    "<alloc::",
    "<anyhow::",
    "<tokio::",
    "__rust",
    "rust_begin_unwind",
];

struct Frame<'a> {
    symbol: &'a str,
    locations: Vec<&'a str>,
}

/// Drop framework frames from a rendered backtrace.
///
/// Returns `None` when no frame survives.
pub fn trim_backtrace(rendered: &str, hidden: &[&str]) -> Option<String> {
    let mut frames: Vec<Frame<'_>> = Vec::new();

    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                frame.locations.push(location);
            }
            continue;
        }
        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(Frame {
                    symbol: symbol.trim(),
                    locations: Vec::new(),
                });
            }
        }
    }

    let kept: Vec<String> = frames
        .iter()
        .filter(|frame| !hidden.iter().any(|prefix| frame.symbol.starts_with(prefix)))
        .map(|frame| match frame.locations.first() {
            Some(location) => format!("   at {} in {}", frame.symbol, location),
            None => format!("   at {}", frame.symbol),
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("\n"))
    }
}

/// Render an error chain outermost first, one "--->" per inner error
pub fn describe_chain(messages: Vec<String>) -> Option<String> {
    if messages.len() < 2 {
        return None;
    }
    Some(messages.join("\n ---> "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/abc/library/std/src/backtrace.rs:116:5
   1: anyhow::error::<impl anyhow::Error>::msg
             at /cargo/anyhow-1.0.86/src/error.rs:83:36
   2: my_tests::parsing::reads_header
             at ./tests/parsing.rs:42:9
   3: test_engine::executor::bounded::run_inline
             at ./src/executor/bounded.rs:200:5
   4: my_tests::parsing::helper
   5: core::ops::function::FnOnce::call_once
             at /rustc/abc/library/core/src/ops/function.rs:250:5";

    #[test]
    fn test_trim_keeps_user_frames() {
        let trimmed = trim_backtrace(SAMPLE, FRAMEWORK_FRAME_PREFIXES).unwrap();
        assert_eq!(
            trimmed,
            "   at my_tests::parsing::reads_header in ./tests/parsing.rs:42:9\n   at my_tests::parsing::helper"
        );
    }

    #[test]
    fn test_trim_all_hidden() {
        let only_std = "   0: std::rt::lang_start\n             at /rustc/x/std/rt.rs:1:1";
        assert_eq!(trim_backtrace(only_std, FRAMEWORK_FRAME_PREFIXES), None);
    }

    #[test]
    fn test_describe_chain() {
        assert_eq!(describe_chain(vec!["only".to_string()]), None);
        assert_eq!(
            describe_chain(vec!["outer".to_string(), "inner".to_string()]).unwrap(),
            "outer\n ---> inner"
        );
    }
}
