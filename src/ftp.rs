//! FTP module.

use std::io::{Read, Write};

use log::{debug, warn};
use native_tls::TlsConnector;

use super::config::ClientConfig;
use super::control::ControlChannel;
use super::data;
use super::operand::Endpoint;
use super::types::{FtpError, Result};

/// Direction and buffer of one data-channel transfer.
enum Payload<'a> {
    Receive(&'a mut Vec<u8>),
    Send(&'a [u8]),
}

/// An authenticated FTPS session with a private, binary, stream-mode,
/// file-structured configuration.
#[derive(Debug)]
pub struct FtpClient {
    control: ControlChannel,
    connector: TlsConnector,
    config: ClientConfig,
}

impl FtpClient {
    /// Connects, secures the control channel, logs in and configures the
    /// session. The first failure abandons the whole session.
    pub fn connect(endpoint: &Endpoint, config: &ClientConfig) -> Result<FtpClient> {
        let connector = config.tls_connector()?;
        let mut control = ControlChannel::connect(&endpoint.host, endpoint.port, config)?.into_secure(&connector)?;
        control.authenticate(&endpoint.user, &endpoint.password)?;
        control.configure()?;
        Ok(FtpClient {
            control,
            connector,
            config: config.clone(),
        })
    }

    /// Execute `LIST` command which returns the detailed file listing in human readable format.
    /// An empty `pathname` lists the current directory.
    pub fn list(&mut self, pathname: &str) -> Result<String> {
        let command = if pathname.is_empty() {
            "LIST".to_owned()
        } else {
            format!("LIST {}", pathname)
        };
        let mut listing = Vec::new();
        self.run_transfer(&command, Payload::Receive(&mut listing))?;
        Ok(String::from_utf8_lossy(&listing).into_owned())
    }

    /// Retrieves the whole file into memory.
    pub fn download(&mut self, pathname: &str) -> Result<Vec<u8>> {
        let command = format!("RETR {}", require_path(pathname)?);
        let mut contents = Vec::new();
        self.run_transfer(&command, Payload::Receive(&mut contents))?;
        Ok(contents)
    }

    /// This stores a file on the server.
    pub fn upload(&mut self, pathname: &str, contents: &[u8]) -> Result<()> {
        let command = format!("STOR {}", require_path(pathname)?);
        self.run_transfer(&command, Payload::Send(contents))
    }

    /// Remove the remote file from the server.
    pub fn remove(&mut self, pathname: &str) -> Result<()> {
        let command = format!("DELE {}", require_path(pathname)?);
        self.control.expect(&command).map(|_| ())
    }

    /// This creates a new directory on the server.
    pub fn mkdir(&mut self, pathname: &str) -> Result<()> {
        let command = format!("MKD {}", require_path(pathname)?);
        self.control.expect(&command).map(|_| ())
    }

    /// Removes the remote pathname from the server.
    pub fn rmdir(&mut self, pathname: &str) -> Result<()> {
        let command = format!("RMD {}", require_path(pathname)?);
        self.control.expect(&command).map(|_| ())
    }

    /// Quits the current FTP session.
    pub fn quit(self) -> Result<()> {
        self.control.quit()
    }

    pub fn host(&self) -> &str {
        self.control.host()
    }

    /// Shared path of every data-channel command.
    ///
    /// The data connection is opened before the preliminary reply is read,
    /// since servers may hold that reply until the client has connected. The
    /// TLS handshake only starts once the command has been accepted, and the
    /// channel is closed before the completion reply is read: the final status
    /// of a transfer only means something after the data stream has ended.
    fn run_transfer(&mut self, command: &str, payload: Payload<'_>) -> Result<()> {
        let passive = data::request_passive(&mut self.control)?;
        self.control.write_command(command)?;
        let channel = match passive.open(&self.config) {
            Ok(channel) => channel,
            // A server refusing the command may take its passive listener
            // down before we connect; its reply is the real error.
            Err(err) => {
                return Err(match self.control.read_reply() {
                    Ok(reply) if !reply.is_positive() => reply.into_error(),
                    _ => err,
                })
            }
        };

        let opening = self.control.read_reply()?;
        if !opening.is_preliminary() {
            if let Err(e) = channel.close() {
                debug!("closing refused data channel: {}", e);
            }
            return Err(if opening.is_positive() {
                FtpError::Protocol(format!("expected a preliminary reply to {}, got {}", command, opening))
            } else {
                opening.into_error()
            });
        }

        let mut channel = channel.secure(&self.connector, self.control.host())?;
        let (streamed, sending) = match payload {
            Payload::Receive(buf) => (channel.read_to_end(buf).map(|n| n as u64), false),
            Payload::Send(bytes) => (
                channel
                    .write_all(bytes)
                    .and_then(|_| channel.flush())
                    .map(|_| bytes.len() as u64),
                true,
            ),
        };
        let closed = channel.close();

        let transferred = streamed.map_err(FtpError::from_io)?;
        match closed {
            // The shutdown is what tells the server the upload is complete.
            Err(e) if sending => return Err(e),
            Err(e) => warn!("closing data channel after {}: {}", command, e),
            Ok(()) => {}
        }

        let done = self.control.read_reply()?;
        if !done.is_positive() {
            return Err(done.into_error());
        }
        debug!("{}: {} bytes, {}", command, transferred, done);
        Ok(())
    }
}

fn require_path(pathname: &str) -> Result<&str> {
    if pathname.is_empty() {
        Err(FtpError::Usage("a remote path is required".to_owned()))
    } else {
        Ok(pathname)
    }
}
