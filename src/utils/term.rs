//! User-facing terminal output.
//!
//! Wizard-style status markers with ANSI colors, suppressed when stdout is
//! not a TTY. Diagnostics still go through `tracing`; this module is only for
//! the interactive surface.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::OnceLock;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[91m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const CYAN: &str = "\x1b[96m";

fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| io::stdout().is_terminal())
}

// stderr can be redirected independently of stdout.
fn stderr_colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| io::stderr().is_terminal())
}

fn paint_with(enabled: bool, code: &str, text: &str) -> String {
    if enabled {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn paint(code: &str, text: &str) -> String {
    paint_with(colors_enabled(), code, text)
}

pub fn header(text: &str) {
    println!("\n{}", paint(&format!("{BOLD}{CYAN}"), &format!("=== {text} ===")));
}

pub fn step(text: &str) {
    println!("{} {text}", paint(BLUE, ">"));
}

pub fn success(text: &str) {
    println!("{} {text}", paint(GREEN, "+"));
}

pub fn error(text: &str) {
    eprintln!("{} {text}", paint_with(stderr_colors_enabled(), RED, "x"));
}

pub fn info(text: &str) {
    println!("{} {text}", paint(CYAN, "i"));
}

pub fn warning(text: &str) {
    println!("{} {text}", paint(YELLOW, "!"));
}

pub fn bold(text: &str) -> String {
    paint(BOLD, text)
}

/// Destructive-operation gate: requires the user to type `yes`.
///
/// Returns `false` on anything else, including EOF.
pub fn confirm(prompt: &str) -> bool {
    print!("{prompt} Type 'yes' to confirm: ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => line.trim().eq_ignore_ascii_case("yes"),
    }
}

/// Read one line of input after a prompt, trimmed. `None` on EOF.
pub fn prompt(label: &str) -> Option<String> {
    print!("{label}: ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_with_disabled_emits_no_escapes() {
        let plain = paint_with(false, RED, "boom");
        assert_eq!(plain, "boom");
        assert!(!plain.contains('\x1b'));
    }

    #[test]
    fn test_paint_with_enabled_wraps_and_resets() {
        let colored = paint_with(true, GREEN, "ok");
        assert!(colored.starts_with(GREEN));
        assert!(colored.ends_with(RESET));
        assert!(colored.contains("ok"));
    }
}
