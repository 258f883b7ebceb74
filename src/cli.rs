//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

/// Check pasted download lists against a remote FTP/SFTP directory.
///
/// Hotkeys: <ctrl-r> refresh the listing, <ctrl-s> check the clipboard,
/// <ctrl-q> quit.
#[derive(Parser, Debug)]
#[command(name = "cpbcheck", version)]
pub struct Cli {
    /// Connection string: [proto://][user[:password]@]host[/path][:port]
    pub connection: String,

    /// Settings file to use instead of ~/.cpbcheck/settings.json
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "cpbcheck",
            "--no-color",
            "--settings",
            "/tmp/s.json",
            "sftp://u:p@nas/dl",
        ])
        .unwrap();
        assert!(cli.no_color);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.connection, "sftp://u:p@nas/dl");
    }

    #[test]
    fn test_connection_is_required() {
        assert!(Cli::try_parse_from(["cpbcheck"]).is_err());
    }
}
