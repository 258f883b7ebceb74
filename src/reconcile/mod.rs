//! Clipboard reconciliation
//!
//! Pulls one candidate file name out of every pasted line and looks it up in
//! the cached listing. Lookups are exact and case-sensitive; the only fuzzy
//! rule is the in-progress suffix.

use crate::remote::{RemoteEntry, RemoteListing};

/// Outcome for one candidate name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An entry with exactly this name exists
    Complete(RemoteEntry),
    /// Only `<name><suffix>` exists; the transfer is still running
    Partial(RemoteEntry),
    Missing(String),
}

/// One reported line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Candidate extracted from the pasted line
    pub name: String,
    pub verdict: Verdict,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Drop a leading numbered-list marker such as `12)`.
fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    match trimmed[digits..].strip_prefix(')') {
        Some(rest) if digits > 0 => rest,
        _ => line,
    }
}

/// First run of `[A-Za-z0-9_.]` in `line`, if any, after any leading `N)`
/// list marker.
pub fn extract_file_name(line: &str) -> Option<&str> {
    let line = strip_list_marker(line);
    let start = line.find(is_name_char)?;
    let rest = &line[start..];
    let end = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

pub fn classify(name: &str, listing: &RemoteListing, partial_suffix: &str) -> Verdict {
    if let Some(entry) = listing.find(name) {
        return Verdict::Complete(entry.clone());
    }
    let partial = format!("{}{}", name, partial_suffix);
    match listing.find(&partial) {
        Some(entry) => Verdict::Partial(entry.clone()),
        None => Verdict::Missing(name.to_string()),
    }
}

/// Classify every line of `text` that yields a candidate, in input order.
///
/// Duplicates are reported each time they appear.
pub fn reconcile(text: &str, listing: &RemoteListing, partial_suffix: &str) -> Vec<Finding> {
    text.lines()
        .filter_map(extract_file_name)
        .map(|name| Finding {
            name: name.to_string(),
            verdict: classify(name, listing, partial_suffix),
        })
        .collect()
}
