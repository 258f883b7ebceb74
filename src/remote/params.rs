//! Connection parameters and the connection-string parser
//!
//! Format: `[proto://][user[:password]@]host[/path][/][:port]`

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use zeroize::Zeroizing;

/// Hint shown to the user when a connection string is rejected.
pub const CONNECTION_STRING_FORMAT: &str = "[proto://][user[:password]@]host[/path][:port]";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty connection string")]
    Empty,

    #[error("no host name")]
    MissingHost,

    #[error("unsupported protocol {0:?}")]
    UnsupportedProtocol(String),

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("unexpected input {0:?}")]
    UnexpectedInput(String),
}

/// Supported remote protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Ftp,
    Sftp,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp => 21,
            Protocol::Sftp => 22,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ftp => "ftp",
            Protocol::Sftp => "sftp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("ftp") {
            Ok(Protocol::Ftp)
        } else if s.eq_ignore_ascii_case("sftp") {
            Ok(Protocol::Sftp)
        } else {
            Err(ParseError::UnsupportedProtocol(s.to_string()))
        }
    }
}

/// Everything needed to (re)establish one remote session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub protocol: Protocol,
    pub username: String,
    pub password: Zeroizing<String>,
    pub host: String,
    pub port: u16,
    /// Directory to change into after login; empty means stay at the login directory.
    pub path: String,
}

impl ConnectionParams {
    /// Parse a connection string.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let s = input.trim_matches(|c: char| c <= ' ');
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(c) = s.chars().find(|c| *c <= ' ') {
            return Err(ParseError::UnexpectedInput(c.to_string()));
        }

        // The scheme never contains ':', so a "://" preceded by one belongs to a password.
        let (proto, rest) = match s.find("://") {
            Some(i) if !s[..i].contains(':') => (&s[..i], &s[i + 3..]),
            _ => ("", s),
        };
        let protocol: Protocol = proto.parse()?;

        let (username, password, rest) = match rest.find('@') {
            Some(at) => {
                let userinfo = &rest[..at];
                let (user, pass) = match userinfo.find(':') {
                    Some(colon) => (&userinfo[..colon], &userinfo[colon + 1..]),
                    None => (userinfo, ""),
                };
                (user, pass, &rest[at + 1..])
            }
            None => ("", "", rest),
        };

        let host_end = rest.find([':', '/']).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            return Err(ParseError::MissingHost);
        }
        let mut rest = &rest[host_end..];

        let mut path = "";
        if let Some(body) = rest.strip_prefix('/') {
            let path_end = body.find(':').unwrap_or(body.len());
            path = &body[..path_end];
            path = path.strip_suffix('/').unwrap_or(path);
            rest = &body[path_end..];
        }

        let port = match rest.strip_prefix(':') {
            Some(digits) => {
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseError::InvalidPort(digits.to_string()));
                }
                digits
                    .parse::<u16>()
                    .map_err(|_| ParseError::InvalidPort(digits.to_string()))?
            }
            None if rest.is_empty() => protocol.default_port(),
            None => return Err(ParseError::UnexpectedInput(rest.to_string())),
        };

        Ok(Self {
            protocol,
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port` for dialing
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for ConnectionParams {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{}:{}",
            self.protocol, self.host, self.path, self.port
        )
    }
}
