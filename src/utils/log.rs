// src/utils/log.rs

//! Structured log blocks on top of the `log` facade.
//!
//! Single-line messages use the `log` macros directly. These helpers keep
//! multi-line output (phase banners, run summaries) consistent no matter
//! which logger the binary installs.

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("{}", format_step(step_num, total, message));
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in format_summary(title, items) {
        log::info!("{line}");
    }
}

fn format_step(step_num: usize, total: usize, message: &str) -> String {
    format!("[STEP {step_num}/{total}] {message}")
}

fn format_summary(title: &str, items: &[(&str, String)]) -> Vec<String> {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(format!("[SUMMARY] {title}"));
    for (key, value) in items {
        lines.push(format!("    {key}: {value}"));
    }
    lines
}
