//! User-visible log
//!
//! The terminal is in raw mode while the tool runs, so every line is written
//! with an explicit `\r\n` and flushed immediately.

use std::fmt::Display;
use std::io::{self, Write};

use chrono::{Local, TimeZone};
use crossterm::style::Stylize;

use crate::reconcile::{Finding, Verdict};
use crate::remote::{ConnectionParams, RemoteEntry};

pub const HOTKEY_HELP: &str = "<ctrl-q> quit | <ctrl-r> refresh | <ctrl-s> paste";
pub const SEPARATOR: &str = "-------------------------------------------------";

const SIZE_UNITS: [char; 7] = [' ', 'K', 'M', 'G', 'T', 'P', 'E'];
const TIME_FORMAT: &str = "%y-%m-%d %H:%M";
const TIME_BLANK: &str = "              ";
const SIZE_BLANK: &str = "        ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Error,
}

pub struct Console<W: Write> {
    out: W,
    color: bool,
}

impl Console<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn line(&mut self, severity: Severity, message: impl Display) -> io::Result<()> {
        let text = message.to_string();
        if self.color {
            match severity {
                Severity::Info => write!(self.out, "{}", text)?,
                Severity::Notice => write!(self.out, "{}", text.green())?,
                Severity::Warning => write!(self.out, "{}", text.yellow())?,
                Severity::Error => write!(self.out, "{}", text.red())?,
            }
        } else {
            write!(self.out, "{}", text)?;
        }
        self.out.write_all(b"\r\n")?;
        self.out.flush()
    }

    pub fn info(&mut self, message: impl Display) -> io::Result<()> {
        self.line(Severity::Info, message)
    }

    pub fn warning(&mut self, message: impl Display) -> io::Result<()> {
        self.line(Severity::Warning, message)
    }

    pub fn error(&mut self, message: impl Display) -> io::Result<()> {
        self.line(Severity::Error, message)
    }

    /// Hotkey help, connection line and separator
    pub fn status_block(&mut self, params: &ConnectionParams) -> io::Result<()> {
        self.warning(HOTKEY_HELP)?;
        self.info(params)?;
        self.info(SEPARATOR)
    }

    pub fn finding(&mut self, finding: &Finding) -> io::Result<()> {
        let (severity, text) = render_finding(finding);
        self.line(severity, text)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `"{whole:>3}{unit} {rest:>3}"`; negative sizes are reported, not clamped.
pub fn format_size(size: i64) -> String {
    if size < 0 {
        return "#err size<0".to_string();
    }
    let mut whole = size;
    let mut unit = 0;
    while whole >= 1000 {
        whole /= 1000;
        unit += 1;
    }
    format!("{:>3}{} {:>3}", whole, SIZE_UNITS[unit], size % 1000)
}

/// `yy-mm-dd HH:MM|size|name` with the time shown in `tz`
pub fn format_entry_in<Tz>(entry: &RemoteEntry, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = match entry.modified {
        Some(t) => t.with_timezone(tz).format(TIME_FORMAT).to_string(),
        None => TIME_BLANK.to_string(),
    };
    format!("{}|{}|{}", time, format_size(entry.size), entry.name)
}

pub fn format_entry(entry: &RemoteEntry) -> String {
    format_entry_in(entry, &Local)
}

pub fn format_missing(name: &str) -> String {
    format!("{}|{}|{}", TIME_BLANK, SIZE_BLANK, name)
}

fn render_finding(finding: &Finding) -> (Severity, String) {
    match &finding.verdict {
        Verdict::Complete(entry) => (Severity::Notice, format_entry(entry)),
        Verdict::Partial(entry) => (Severity::Warning, format_entry(entry)),
        Verdict::Missing(name) => (Severity::Error, format_missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::EntryKind;
    use chrono::Utc;

    fn output(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_inner()).unwrap()
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(-1), "#err size<0");
        assert_eq!(format_size(0), "  0    0");
        assert_eq!(format_size(5), "  5    5");
        assert_eq!(format_size(999), "999  999");
        assert_eq!(format_size(1_000), "  1K   0");
        assert_eq!(format_size(734_003_200), "734M 200");
        assert_eq!(format_size(12_345_678_901), " 12G 901");
        assert_eq!(format_size(i64::MAX), "  9E 807");
    }

    #[test]
    fn test_format_entry_widths_line_up() {
        let entry = RemoteEntry::new("movie.mkv", 734_003_200, EntryKind::File)
            .with_modified(Utc.with_ymd_and_hms(2024, 3, 10, 8, 15, 0).unwrap());
        let line = format_entry_in(&entry, &Utc);
        assert_eq!(line, "24-03-10 08:15|734M 200|movie.mkv");

        let missing = format_missing("movie.mkv");
        assert_eq!(missing.find('|'), line.find('|'));
        assert_eq!(missing.rfind('|'), line.rfind('|'));

        let undated = format_entry_in(&RemoteEntry::new("x", 1, EntryKind::File), &Utc);
        assert_eq!(undated, "              |  1    1|x");
    }

    #[test]
    fn test_plain_lines_use_crlf() {
        let mut console = Console::new(Vec::new(), false);
        console.info("connecting...").unwrap();
        console.error("boom").unwrap();
        assert_eq!(output(console), "connecting...\r\nboom\r\n");
    }

    #[test]
    fn test_colored_lines_carry_escapes() {
        let mut console = Console::new(Vec::new(), true);
        console.warning("lost connection").unwrap();
        let out = output(console);
        assert!(out.contains("lost connection"));
        assert!(out.ends_with("\r\n"));
    }

    #[test]
    fn test_status_block() {
        let params = ConnectionParams::parse("sftp://u:p@nas/dl").unwrap();
        let mut console = Console::new(Vec::new(), false);
        console.status_block(&params).unwrap();
        let out = output(console);
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(lines[0], HOTKEY_HELP);
        assert_eq!(lines[1], "[sftp] nas/dl:22");
        assert_eq!(lines[2], SEPARATOR);
    }

    #[test]
    fn test_finding_severity() {
        let entry = RemoteEntry::new("show.part", 12, EntryKind::File);
        let partial = Finding {
            name: "show".into(),
            verdict: Verdict::Partial(entry),
        };
        assert_eq!(render_finding(&partial).0, Severity::Warning);

        let missing = Finding {
            name: "a.zip".into(),
            verdict: Verdict::Missing("a.zip".into()),
        };
        let (severity, text) = render_finding(&missing);
        assert_eq!(severity, Severity::Error);
        assert_eq!(text, format_missing("a.zip"));
    }
}
