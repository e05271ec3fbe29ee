use native_tls::{HandshakeError, TlsConnector, TlsStream};

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
};

use super::config::ClientConfig;
use super::types::{FtpError, Result};

/// Transport under either channel. Starts as plain TCP and is replaced
/// wholesale by the TLS variant once a handshake succeeds.
#[derive(Debug)]
pub enum NetStream {
    Tcp(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl NetStream {
    /// Runs a client handshake over the plain transport, validating the peer
    /// certificate against `domain`.
    pub fn into_secure(self, connector: &TlsConnector, domain: &str) -> Result<NetStream> {
        match self {
            NetStream::Tcp(stream) => match connector.connect(domain, stream) {
                Ok(stream) => Ok(NetStream::Tls(stream)),
                Err(HandshakeError::Failure(err)) => {
                    Err(FtpError::Tls(format!("handshake with {} failed: {}", domain, err)))
                }
                Err(HandshakeError::WouldBlock(_)) => {
                    Err(FtpError::Timeout(format!("handshake with {} timed out", domain)))
                }
            },
            NetStream::Tls(_) => Err(FtpError::Tls("stream is already secured".to_owned())),
        }
    }

    /// Test if the stream is secured
    pub fn is_secure(&self) -> bool {
        matches!(*self, NetStream::Tls(_))
    }

    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match *self {
            NetStream::Tcp(ref stream) => stream,
            NetStream::Tls(ref stream) => stream.get_ref(),
        }
    }

    /// Sends `close_notify` when secured, then shuts the TCP connection down.
    pub fn shutdown(&mut self) -> io::Result<()> {
        if let NetStream::Tls(ref mut stream) = *self {
            stream.shutdown()?;
            // Read up to the peer's close_notify so nothing it sent after the
            // handshake (TLS 1.3 session tickets) is left unread at close.
            let mut sink = [0u8; 1024];
            while let Ok(n) = stream.read(&mut sink) {
                if n == 0 {
                    break;
                }
            }
        }
        match self.get_ref().shutdown(Shutdown::Both) {
            Err(ref e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            NetStream::Tcp(ref mut stream) => stream.read(buf),
            NetStream::Tls(ref mut stream) => stream.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            NetStream::Tcp(ref mut stream) => stream.write(buf),
            NetStream::Tls(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match *self {
            NetStream::Tcp(ref mut stream) => stream.flush(),
            NetStream::Tls(ref mut stream) => stream.flush(),
        }
    }
}

/// Connects to `host:port`, trying each IPv4 address the name resolves to.
pub fn dial(host: &str, port: u16, config: &ClientConfig) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| FtpError::Connect(format!("cannot resolve {}: {}", host, e)))?;

    let mut last_err = None;
    for addr in addrs.filter(SocketAddr::is_ipv4) {
        match open(addr, config) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| FtpError::Connect(format!("no IPv4 address for {}", host))))
}

/// Opens a TCP connection to `addr` with the configured deadlines applied.
pub fn open(addr: SocketAddr, config: &ClientConfig) -> Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            FtpError::Timeout(format!("connecting to {}: {}", addr, e))
        }
        _ => FtpError::Connect(format!("connecting to {}: {}", addr, e)),
    })?;
    stream.set_read_timeout(config.io_timeout)?;
    stream.set_write_timeout(config.io_timeout)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
