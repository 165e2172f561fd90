//! Screening generated files before they are written
//!
//! Two checks run on every extracted body:
//! - a safety scan for calls a generated MVP has no business making
//!   (process spawning, raw sockets, dynamic evaluation, system paths)
//! - a content check that the body matches the file's type, so a `.json`
//!   file holds JSON and an `.html` file holds markup
//!
//! Patterns are matched case-insensitively with `contains()`.

use std::path::Path;

/// Snippets rejected in any generated file
pub const BLOCKED_SNIPPETS: &[&str] = &[
    "import subprocess",
    "from subprocess import",
    "os.system(",
    "subprocess.run(",
    "subprocess.popen(",
    "import shlex",
    "import socket",
    "import paramiko",
    "shutil.rmtree(",
    "open('/etc",
    "open(\"/etc",
    "import ctypes",
    "ctypes.cdll(",
    "eval(",
    "exec(",
    "child_process",
    "rm -rf /",
];

/// HTTP client modules rejected in generated Python app code
pub const NETWORK_SNIPPETS: &[&str] = &["requests.", "httpx.", "urllib."];

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Safety violations found in `code`; empty when the file is acceptable
#[must_use]
pub fn safety_violations(file_name: &str, code: &str) -> Vec<String> {
    let lower = code.to_lowercase();
    let mut violations: Vec<String> = BLOCKED_SNIPPETS
        .iter()
        .filter(|snippet| lower.contains(*snippet))
        .map(|snippet| format!("found '{}'", snippet))
        .collect();

    if lower.contains("open(") && (lower.contains("/tmp/") || code.contains("../")) {
        violations.push("suspicious file access (open with /tmp or parent traversal)".to_string());
    }

    if extension(file_name) == "py" && NETWORK_SNIPPETS.iter().any(|s| lower.contains(s)) {
        violations.push("networking libraries used in app code".to_string());
    }

    violations
}

fn starts_any_line(content: &str, prefixes: &[&str]) -> bool {
    content
        .lines()
        .map(str::trim_start)
        .any(|line| prefixes.iter().any(|p| line.starts_with(p)))
}

/// Problems with `content` given the file's extension; empty when it fits
#[must_use]
pub fn content_issues(file_name: &str, content: &str) -> Vec<String> {
    let mut issues = Vec::new();

    match extension(file_name).as_str() {
        "json" => {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
                issues.push(format!("invalid JSON: {}", e));
            }
        }
        "py" => {
            let trimmed = content.trim_start();
            if (trimmed.starts_with('{') || trimmed.starts_with('['))
                && serde_json::from_str::<serde_json::Value>(content).is_ok()
            {
                issues.push("Python file contains JSON data instead of code".to_string());
            }
        }
        "html" | "htm" => {
            let lower = content.to_lowercase();
            if !["<html", "<head", "<body", "<!doctype"]
                .iter()
                .any(|tag| lower.contains(tag))
            {
                issues.push("HTML file missing basic structure".to_string());
            }
        }
        "css" => {
            if starts_any_line(content, &["import ", "def ", "function "]) {
                issues.push("CSS file contains code instead of styles".to_string());
            }
        }
        "js" | "mjs" => {
            if starts_any_line(content, &["def "]) && starts_any_line(content, &["import "]) {
                issues.push("JavaScript file contains Python code".to_string());
            }
        }
        _ => {}
    }

    issues
}

/// Everything that keeps `code` from being written as `file_name`
#[must_use]
pub fn screen(file_name: &str, code: &str) -> Vec<String> {
    if code.trim().is_empty() {
        return vec!["model returned no code".to_string()];
    }
    let mut problems = safety_violations(file_name, code);
    problems.extend(content_issues(file_name, code));
    problems
}
