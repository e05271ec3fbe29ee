//! Types shared by the control channel, the data channel and the dispatcher.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A shorthand for a Result whose error type is always an FtpError.
pub type Result<T> = ::std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur during an FTPS session.
#[derive(Debug, Error)]
pub enum FtpError {
    /// The transport could not be established, broke, or the greeting was negative.
    #[error("FTP ConnectionError: {0}")]
    Connect(String),
    /// TLS handshake or certificate failure on either channel.
    #[error("FTP SecureError: {0}")]
    Tls(String),
    /// Credentials rejected.
    #[error("FTP AuthError: {code} {text}")]
    Auth { code: u32, text: String },
    /// Malformed or missing reply content.
    #[error("FTP InvalidResponse: {0}")]
    Protocol(String),
    /// Negative reply to a command, carried verbatim.
    #[error("{code} {text}")]
    Ftp { code: u32, text: String },
    /// Malformed invocation.
    #[error("usage: {0}")]
    Usage(String),
    /// A network read or write exceeded its deadline.
    #[error("FTP Timeout: {0}")]
    Timeout(String),
    /// Local filesystem failure.
    #[error("{}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FtpError {
    /// Classifies a network I/O failure. Deadline expiry gets its own kind.
    pub fn from_io(err: io::Error) -> FtpError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FtpError::Timeout(err.to_string()),
            _ => FtpError::Connect(err.to_string()),
        }
    }

    pub fn local<P: Into<PathBuf>>(path: P, source: io::Error) -> FtpError {
        FtpError::Local {
            path: path.into(),
            source,
        }
    }

    /// Reply code carried by the error, if the server produced one.
    pub fn code(&self) -> Option<u32> {
        match *self {
            FtpError::Auth { code, .. } | FtpError::Ftp { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Process exit status for this kind of failure. Never zero.
    pub fn exit_code(&self) -> i32 {
        match *self {
            FtpError::Usage(_) => 2,
            FtpError::Connect(_) => 3,
            FtpError::Tls(_) => 4,
            FtpError::Auth { .. } => 5,
            FtpError::Protocol(_) => 6,
            FtpError::Ftp { .. } => 7,
            FtpError::Timeout(_) => 8,
            FtpError::Local { .. } => 9,
        }
    }
}

impl From<io::Error> for FtpError {
    fn from(err: io::Error) -> FtpError {
        FtpError::from_io(err)
    }
}

/// One complete reply record: the 3-digit code and the message text.
/// Continuation lines of a multi-line reply are joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u32,
    pub text: String,
}

impl Reply {
    pub fn new<S: Into<String>>(code: u32, text: S) -> Reply {
        Reply {
            code,
            text: text.into(),
        }
    }

    /// 1xx: the command was accepted and another reply will follow.
    pub fn is_preliminary(&self) -> bool {
        self.code < 200
    }

    /// 3xx: the command needs a follow-up command.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 1xx to 3xx.
    pub fn is_positive(&self) -> bool {
        self.code < 400
    }

    pub fn into_error(self) -> FtpError {
        FtpError::Ftp {
            code: self.code,
            text: self.text,
        }
    }

    pub fn into_auth_error(self) -> FtpError {
        FtpError::Auth {
            code: self.code,
            text: self.text,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}
