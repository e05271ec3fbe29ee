//! Command-line operands: `ftps://` URLs and plain local paths.

use std::fmt;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use super::config::DEFAULT_PORT;
use super::types::{FtpError, Result};

pub const SCHEME: &str = "ftps";

/// Where and as whom to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Endpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
            user: "anonymous".to_owned(),
            password: String::new(),
        }
    }

    pub fn with_credentials<U: Into<String>, P: Into<String>>(mut self, user: U, password: P) -> Endpoint {
        self.user = user.into();
        self.password = password.into();
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}@{}:{}", SCHEME, self.user, self.host, self.port)
    }
}

/// A path on an FTPS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub endpoint: Endpoint,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Local(PathBuf),
    Remote(RemoteLocation),
}

impl Operand {
    /// `ftps://[user[:password]@]host[:port]/path`, or a local path when the
    /// argument carries no scheme.
    pub fn parse(arg: &str) -> Result<Operand> {
        if !arg.contains("://") {
            return Ok(Operand::Local(PathBuf::from(arg)));
        }

        let url = Url::parse(arg).map_err(|e| FtpError::Usage(format!("invalid URL {}: {}", arg, e)))?;
        if url.scheme() != SCHEME {
            return Err(FtpError::Usage(format!("unsupported scheme {:?} in {}", url.scheme(), arg)));
        }
        let host = match url.host() {
            Some(Host::Domain(host)) if !host.is_empty() => host.to_owned(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(_)) => return Err(FtpError::Usage(format!("IPv6 hosts are not supported: {}", arg))),
            _ => return Err(FtpError::Usage(format!("missing host in {}", arg))),
        };

        let mut endpoint = Endpoint::new(host, url.port().unwrap_or(DEFAULT_PORT));
        if !url.username().is_empty() {
            endpoint = endpoint.with_credentials(decode(url.username())?, decode(url.password().unwrap_or(""))?);
        }
        Ok(Operand::Remote(RemoteLocation {
            endpoint,
            path: decode(url.path())?,
        }))
    }

    pub fn is_remote(&self) -> bool {
        matches!(*self, Operand::Remote(_))
    }

    pub fn path_is_empty(&self) -> bool {
        match *self {
            Operand::Local(ref path) => path.as_os_str().is_empty(),
            Operand::Remote(ref remote) => remote.path.is_empty(),
        }
    }
}

fn decode(component: &str) -> Result<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| FtpError::Usage(format!("invalid percent-encoding in {:?}: {}", component, e)))
}
