//! Filesystem path genericization.
//!
//! Paths such as `C:\Users\alice\AppData\Roaming\app.exe` identify the user.
//! Before a path leaves the engine it is rewritten relative to a well-known
//! environment variable: `%APPDATA%\app.exe`.

use std::collections::HashMap;

/// Variables tried in order. Nested locations come before their parents
/// (`ProgramFiles(x86)` before `ProgramFiles`, `APPDATA` before `USERPROFILE`).
pub const GENERIC_PATH_VARIABLES: &[&str] = &[
    "SystemRoot",
    "CommonProgramFiles(x86)",
    "CommonProgramW6432",
    "CommonProgramFiles",
    "ProgramFiles(x86)",
    "ProgramW6432",
    "ProgramFiles",
    "TEMP",
    "LOCALAPPDATA",
    "APPDATA",
    "USERPROFILE",
    "PUBLIC",
    "ProgramData",
    "ALLUSERSPROFILE",
];

/// Source of environment variable values.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Rewrites paths against a snapshot of the well-known variables.
#[derive(Debug, Clone, Default)]
pub struct PathGenericizer {
    /// (variable name, normalized value) in priority order
    prefixes: Vec<(&'static str, String)>,
}

impl PathGenericizer {
    /// Snapshot the well-known variables from `env`. Unset or empty
    /// variables are skipped.
    pub fn from_env(env: &dyn Environment) -> Self {
        let prefixes = GENERIC_PATH_VARIABLES
            .iter()
            .filter_map(|&name| {
                let value = normalize(&env.var(name)?);
                let value = value.trim_end_matches('\\').to_string();
                if value.is_empty() {
                    None
                } else {
                    Some((name, value))
                }
            })
            .collect();
        Self { prefixes }
    }

    /// Genericizer for the current process environment.
    pub fn from_process_env() -> Self {
        Self::from_env(&ProcessEnvironment)
    }

    /// Rewrite `path` as `%VAR%` + remainder, or return it unchanged.
    pub fn genericize(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }

        let normalized = normalize(path);
        for (name, prefix) in &self.prefixes {
            if let Some(rest) = strip_prefix_ignore_case(&normalized, prefix) {
                if rest.is_empty() || rest.starts_with('\\') {
                    return format!("%{name}%{rest}");
                }
            }
        }
        path.to_string()
    }
}

/// Use backslashes throughout and collapse repeated separators.
///
/// A leading `\\` (UNC prefix) is preserved.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_separator = false;
    for (index, c) in path.chars().enumerate() {
        let c = if c == '/' { '\\' } else { c };
        if c == '\\' {
            if previous_separator && index > 1 {
                continue;
            }
            previous_separator = true;
        } else {
            previous_separator = false;
        }
        out.push(c);
    }
    out
}

/// Case-insensitive `strip_prefix` that compares full Unicode lowercase.
fn strip_prefix_ignore_case<'a>(haystack: &'a str, prefix: &str) -> Option<&'a str> {
    let mut hay = haystack.char_indices();
    for p in prefix.chars() {
        let (_, h) = hay.next()?;
        if !h.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    match hay.next() {
        Some((offset, _)) => Some(&haystack[offset..]),
        None => Some(""),
    }
}
