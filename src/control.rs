//! Control channel: CRLF-terminated commands and reply records over a stream
//! that is upgraded to TLS before any credential is sent.

use std::io::{BufRead, BufReader, Write};

use log::{debug, trace};
use native_tls::TlsConnector;

use super::config::ClientConfig;
use super::stream::{self, NetStream};
use super::types::{FtpError, Reply, Result};

/// Session parameters sent after login, in the order the server must see them:
/// the protection buffer size has to precede the protection level, and the
/// remaining settings assume the connection is already private.
const SESSION_SETUP: [&str; 5] = ["PBSZ 0", "PROT P", "TYPE I", "MODE S", "STRU F"];

/// Stream to interface with the FTP server. This interface is only for the command stream.
#[derive(Debug)]
pub struct ControlChannel {
    reader: BufReader<NetStream>,
    host: String,
    /// A command (or the greeting) is still waiting for its final reply.
    awaiting_reply: bool,
}

impl ControlChannel {
    /// Opens the transport and waits for the server greeting.
    pub fn connect(host: &str, port: u16, config: &ClientConfig) -> Result<ControlChannel> {
        let tcp = stream::dial(host, port, config)?;
        debug!("connected to {}:{} ({})", host, port, tcp.peer_addr()?);
        let mut control = ControlChannel {
            reader: BufReader::new(NetStream::Tcp(tcp)),
            host: host.to_owned(),
            awaiting_reply: true,
        };

        let mut greeting = control.read_reply()?;
        // 120: service ready in a few minutes; the real greeting follows.
        while greeting.is_preliminary() {
            greeting = control.read_reply()?;
        }
        if !greeting.is_positive() {
            return Err(FtpError::Connect(format!("server refused the session: {}", greeting)));
        }
        Ok(control)
    }

    /// Switches the control stream to TLS via `AUTH TLS`, validating the
    /// server certificate against the control hostname.
    pub fn into_secure(mut self, connector: &TlsConnector) -> Result<ControlChannel> {
        let reply = self.send_command("AUTH TLS")?;
        if !reply.is_positive() {
            return Err(FtpError::Tls(format!("server refused AUTH TLS: {}", reply)));
        }
        if !self.reader.buffer().is_empty() {
            return Err(FtpError::Protocol("unexpected data before the TLS handshake".to_owned()));
        }

        let stream = self.reader.into_inner().into_secure(connector, &self.host)?;
        debug!("control channel to {} secured", self.host);
        Ok(ControlChannel {
            reader: BufReader::new(stream),
            host: self.host,
            awaiting_reply: false,
        })
    }

    /// Log in to the FTP server. `PASS` is only sent when `USER` asked for it.
    pub fn authenticate(&mut self, user: &str, password: &str) -> Result<()> {
        let reply = self.send_command(&format!("USER {}", user))?;
        if !reply.is_positive() {
            return Err(reply.into_auth_error());
        }
        if reply.is_intermediate() {
            let reply = self.send_command(&format!("PASS {}", password))?;
            if !reply.is_positive() || reply.is_intermediate() {
                return Err(reply.into_auth_error());
            }
        }
        debug!("logged in as {}", user);
        Ok(())
    }

    /// Sends the post-login session parameters, stopping at the first refusal.
    pub fn configure(&mut self) -> Result<()> {
        for command in SESSION_SETUP.iter() {
            self.expect(command)?;
        }
        Ok(())
    }

    /// Writes one command line and reads one reply record.
    pub fn send_command(&mut self, command: &str) -> Result<Reply> {
        self.write_command(command)?;
        self.read_reply()
    }

    /// `send_command`, turning a negative reply into an error.
    pub fn expect(&mut self, command: &str) -> Result<Reply> {
        let reply = self.send_command(command)?;
        if reply.is_positive() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    /// Quits the current FTP session.
    pub fn quit(mut self) -> Result<()> {
        self.expect("QUIT")?;
        if let Err(e) = self.reader.get_mut().shutdown() {
            debug!("closing control channel: {}", e);
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.reader.get_ref().is_secure()
    }

    pub(crate) fn write_command(&mut self, command: &str) -> Result<()> {
        if self.awaiting_reply {
            return Err(FtpError::Protocol(format!(
                "cannot send {}: the previous reply has not been read",
                redact(command)
            )));
        }
        if command.contains(|c| c == '\r' || c == '\n') {
            return Err(FtpError::Protocol(format!("line break in command {:?}", redact(command))));
        }
        trace!("CMD {}", redact(command));

        let line = format!("{}\r\n", command);
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        self.awaiting_reply = true;
        Ok(())
    }

    /// Reads the next reply record. A preliminary (1xx) reply leaves the
    /// command outstanding until its completion reply arrives.
    pub(crate) fn read_reply(&mut self) -> Result<Reply> {
        let reply = read_record(&mut self.reader)?;
        if !reply.is_preliminary() {
            self.awaiting_reply = false;
        }
        Ok(reply)
    }
}

/// Reads one reply record. A first line of the form `NNN-` opens a multi-line
/// reply that ends at the first line starting with `NNN `.
pub(crate) fn read_record<R: BufRead>(reader: &mut R) -> Result<Reply> {
    let first = read_line(reader)?;
    let code = parse_code(&first)?;
    let mut text = first.get(4..).unwrap_or("").to_owned();

    if first.as_bytes().get(3) == Some(&b'-') {
        let code_str = &first[..3];
        let terminator = format!("{} ", code_str);
        let continuation = format!("{}-", code_str);
        loop {
            let line = read_line(reader)?;
            text.push('\n');
            if line.starts_with(&terminator) || line == code_str {
                text.push_str(line.get(4..).unwrap_or(""));
                break;
            }
            text.push_str(line.strip_prefix(&continuation).unwrap_or(&line));
        }
    }
    Ok(Reply { code, text })
}

fn parse_code(line: &str) -> Result<u32> {
    let bytes = line.as_bytes();
    let well_formed = bytes.len() >= 3
        && (b'1'..=b'6').contains(&bytes[0])
        && bytes[1..3].iter().all(u8::is_ascii_digit)
        && matches!(bytes.get(3), None | Some(b' ') | Some(b'-'));
    if !well_formed {
        return Err(FtpError::Protocol(format!("could not parse reply code: {:?}", line)));
    }
    line[..3]
        .parse()
        .map_err(|e| FtpError::Protocol(format!("could not parse reply code: {}", e)))
}

/// Accumulates bytes up to the next LF, however the peer fragments them.
fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;
    if buf.last() != Some(&b'\n') {
        return Err(FtpError::Connect("connection closed while awaiting a reply".to_owned()));
    }
    while let Some(b'\n') | Some(b'\r') = buf.last() {
        buf.pop();
    }
    let line = String::from_utf8_lossy(&buf).into_owned();
    trace!("FTP {}", line);
    Ok(line)
}

fn redact(command: &str) -> &str {
    if command.starts_with("PASS ") {
        "PASS ****"
    } else {
        command
    }
}
