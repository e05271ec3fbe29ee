//! Passive-mode data channel. Each transfer gets its own connection, obtained
//! from `request_passive` + `Passive::open` and released by `DataChannel::close`.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use lazy_static::lazy_static;
use log::{debug, warn};
use native_tls::TlsConnector;
use regex::Regex;

use super::config::ClientConfig;
use super::control::ControlChannel;
use super::stream::{self, NetStream};
use super::types::{FtpError, Result};

lazy_static! {
    // This regex extracts IP and Port details from PASV command response.
    // The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
    static ref PORT_RE: Regex = Regex::new(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)").unwrap();
}

/// Address granted by the server for the next transfer.
#[derive(Debug)]
pub struct Passive {
    addr: SocketAddrV4,
}

/// Runs the PASV command.
pub fn request_passive(control: &mut ControlChannel) -> Result<Passive> {
    // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
    let reply = control.send_command("PASV")?;
    if !reply.is_positive() {
        return Err(FtpError::Protocol(format!("passive mode refused: {}", reply)));
    }
    let passive = Passive {
        addr: parse_pasv(&reply.text)?,
    };
    debug!("passive data address {}", passive.addr());
    Ok(passive)
}

/// Extracts the data address from the text of a `227` reply.
pub fn parse_pasv(text: &str) -> Result<SocketAddrV4> {
    let caps = PORT_RE
        .captures(text)
        .ok_or_else(|| FtpError::Protocol(format!("Invalid PASV response: {}", text)))?;

    let mut fields = [0u8; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = caps[i + 1]
            .parse()
            .map_err(|_| FtpError::Protocol(format!("PASV field out of range: {}", &caps[i + 1])))?;
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) * 256 + u16::from(fields[5]);
    if port == 0 {
        return Err(FtpError::Protocol(format!("Invalid PASV port: {}", text)));
    }
    Ok(SocketAddrV4::new(ip, port))
}

impl Passive {
    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Connects to the negotiated address. The returned channel is plain TCP
    /// until `secure` is called.
    pub fn open(self, config: &ClientConfig) -> Result<DataChannel> {
        let tcp = stream::open(SocketAddr::V4(self.addr), config)?;
        Ok(DataChannel {
            stream: Some(NetStream::Tcp(tcp)),
            addr: self.addr,
        })
    }
}

/// The open data connection of one transfer.
///
/// `close` consumes the channel. If a channel goes out of scope without
/// being closed, dropping it performs the same shutdown.
#[derive(Debug)]
pub struct DataChannel {
    stream: Option<NetStream>,
    addr: SocketAddrV4,
}

impl DataChannel {
    /// TLS handshake on the data connection. The certificate is checked
    /// against the control hostname: the passive address is often a bare IP
    /// or a different interface of the same server.
    pub fn secure(mut self, connector: &TlsConnector, control_host: &str) -> Result<DataChannel> {
        let stream = self.stream.take().ok_or_else(closed)?;
        self.stream = Some(stream.into_secure(connector, control_host)?);
        debug!("data channel to {} secured", self.addr);
        Ok(self)
    }

    pub fn is_secure(&self) -> bool {
        self.stream.as_ref().map_or(false, NetStream::is_secure)
    }

    /// Graceful shutdown: `close_notify` first, then the TCP connection.
    pub fn close(mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut stream) => {
                let closed = stream.shutdown();
                debug!("data channel to {} closed", self.addr);
                closed.map_err(FtpError::from_io)
            }
            None => Ok(()),
        }
    }

    fn stream(&mut self) -> io::Result<&mut NetStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "data channel closed"))
    }
}

fn closed() -> FtpError {
    FtpError::Protocol("data channel already closed".to_owned())
}

impl Read for DataChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
}

impl Write for DataChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}

impl Drop for DataChannel {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown() {
                warn!("closing data channel to {}: {}", self.addr, e);
            }
        }
    }
}
