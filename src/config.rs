//! Client configuration: network deadlines and the TLS trust setup shared by
//! the control and data channels.

use std::fs;
use std::path::Path;
use std::time::Duration;

use native_tls::{Certificate, TlsConnector};

use super::types::{FtpError, Result};

pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for establishing each TCP connection.
    pub connect_timeout: Duration,
    /// Read/write deadline applied to every socket. `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
    /// PEM certificates trusted in addition to the system store.
    pub root_certificates: Vec<Vec<u8>>,
    /// Skip certificate and hostname validation on both channels.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            root_certificates: Vec::new(),
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    pub fn with_root_certificate_pem<P: Into<Vec<u8>>>(mut self, pem: P) -> Self {
        self.root_certificates.push(pem.into());
        self
    }

    /// Adds the PEM certificate stored at `path` to the trusted roots.
    pub fn load_root_certificate(self, path: &Path) -> Result<Self> {
        let pem = fs::read(path).map_err(|e| FtpError::local(path, e))?;
        // Fail early on garbage rather than at the first handshake.
        Certificate::from_pem(&pem)
            .map_err(|e| FtpError::Tls(format!("invalid certificate in {}: {}", path.display(), e)))?;
        Ok(self.with_root_certificate_pem(pem))
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builds the connector used for both TLS handshakes of a session.
    pub fn tls_connector(&self) -> Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        for pem in &self.root_certificates {
            let cert = Certificate::from_pem(pem).map_err(|e| FtpError::Tls(e.to_string()))?;
            builder.add_root_certificate(cert);
        }
        if self.accept_invalid_certs {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(|e| FtpError::Tls(e.to_string()))
    }
}
