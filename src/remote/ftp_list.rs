//! FTP `LIST` output parsing
//!
//! Handles the Unix `ls -l` layout (with or without a group column) and the
//! MS-DOS/IIS layout. Lines that carry no entry (`total N`, `.`, `..`) yield
//! `None`; lines in neither layout are a protocol error.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use super::error::RemoteError;
use super::types::{checked_size, EntryKind, RemoteEntry};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse one line of `LIST` output.
///
/// `now` anchors Unix timestamps that omit the year.
pub fn parse_list_line(line: &str, now: DateTime<Utc>) -> Result<Option<RemoteEntry>, RemoteError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() == 2 && tokens[0].1.eq_ignore_ascii_case("total") {
        return Ok(None);
    }

    let parsed = if is_dos_date(tokens[0].1) {
        parse_dos(line, &tokens)
    } else {
        parse_unix(line, &tokens, now)
    };

    match parsed {
        Some(p) if p.name == "." || p.name == ".." => Ok(None),
        Some(p) => Ok(Some(RemoteEntry {
            name: p.name.to_string(),
            size: checked_size(p.name, p.size)?,
            modified: p.modified,
            kind: p.kind,
        })),
        None => Err(RemoteError::Protocol(format!(
            "unrecognized LIST line: {:?}",
            line
        ))),
    }
}

struct ParsedLine<'a> {
    name: &'a str,
    size: u64,
    kind: EntryKind,
    modified: Option<DateTime<Utc>>,
}

/// Whitespace-separated tokens with their byte offsets in `line`.
fn tokenize(line: &str) -> Vec<(usize, &str)> {
    let base = line.as_ptr() as usize;
    line.split_whitespace()
        .map(|t| (t.as_ptr() as usize - base, t))
        .collect()
}

fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

fn parse_unix<'a>(
    line: &'a str,
    tokens: &[(usize, &str)],
    now: DateTime<Utc>,
) -> Option<ParsedLine<'a>> {
    let perms = tokens[0].1;
    let kind = match perms.chars().next()? {
        'd' => EntryKind::Directory,
        '-' => EntryKind::File,
        'l' | 'b' | 'c' | 'p' | 's' => EntryKind::Unknown,
        _ => return None,
    };

    // The month column sits right after the size; its index depends on
    // whether the server prints a group column.
    let month_idx = (3..tokens.len().saturating_sub(3)).find(|&i| {
        month_number(tokens[i].1).is_some() && tokens[i - 1].1.parse::<u64>().is_ok()
    })?;

    let size = tokens[month_idx - 1].1.parse::<u64>().ok()?;
    let month = month_number(tokens[month_idx].1)?;
    let day = tokens[month_idx + 1].1.parse::<u32>().ok()?;
    let time_or_year = tokens[month_idx + 2].1;
    let modified = unix_timestamp(month, day, time_or_year, now);

    let mut name = &line[tokens[month_idx + 3].0..];
    if kind == EntryKind::Unknown && perms.starts_with('l') {
        if let Some(arrow) = name.find(" -> ") {
            name = &name[..arrow];
        }
    }

    Some(ParsedLine {
        name,
        size,
        kind,
        modified,
    })
}

fn unix_timestamp(month: u32, day: u32, time_or_year: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some((h, m)) = time_or_year.split_once(':') {
        let hour = h.parse::<u32>().ok()?;
        let minute = m.parse::<u32>().ok()?;
        let at = |year: i32| {
            NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        };
        // Year-less stamps are within the last six months; one that lands in
        // the future belongs to last year.
        let this_year = at(now.year())?;
        if this_year > now + Duration::days(1) {
            at(now.year() - 1)
        } else {
            Some(this_year)
        }
    } else {
        let year = time_or_year.parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

fn is_dos_date(token: &str) -> bool {
    let parts: Vec<&str> = token.split('-').collect();
    parts.len() == 3
        && parts[0].len() == 2
        && parts[1].len() == 2
        && (parts[2].len() == 2 || parts[2].len() == 4)
        && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_dos<'a>(line: &'a str, tokens: &[(usize, &str)]) -> Option<ParsedLine<'a>> {
    if tokens.len() < 4 {
        return None;
    }
    let mut date = tokens[0].1.split('-');
    let month = date.next()?.parse::<u32>().ok()?;
    let day = date.next()?.parse::<u32>().ok()?;
    let year_token = date.next()?;
    let mut year = year_token.parse::<i32>().ok()?;
    if year_token.len() == 2 {
        year += if year < 70 { 2000 } else { 1900 };
    }

    let time = tokens[1].1.to_ascii_uppercase();
    let (clock, pm) = if let Some(t) = time.strip_suffix("PM") {
        (t, Some(true))
    } else if let Some(t) = time.strip_suffix("AM") {
        (t, Some(false))
    } else {
        (time.as_str(), None)
    };
    let (h, m) = clock.split_once(':')?;
    let mut hour = h.parse::<u32>().ok()?;
    let minute = m.parse::<u32>().ok()?;
    match pm {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        _ => {}
    }
    let modified = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(|naive| Utc.from_utc_datetime(&naive));

    let (kind, size) = if tokens[2].1.eq_ignore_ascii_case("<DIR>") {
        (EntryKind::Directory, 0)
    } else {
        (EntryKind::File, tokens[2].1.parse::<u64>().ok()?)
    };
    Some(ParsedLine {
        name: &line[tokens[3].0..],
        size,
        kind,
        modified,
    })
}
