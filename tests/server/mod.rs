//! Scripted FTPS server for the integration tests.
//!
//! Sessions are served one after another on a background thread. Files and
//! directories persist across sessions; every command line received is
//! recorded in arrival order.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use native_tls::{Identity, TlsAcceptor, TlsStream};

use ftps::status;
use ftps::{ClientConfig, Endpoint};

pub const USER: &str = "alice";
pub const PASSWORD: &str = "secret";

const IO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub reject_login: bool,
    pub reject_stor: bool,
    /// Advertise a passive port but close its listener straight away.
    pub drop_passive_listener: bool,
    /// Move the data, then report `451` instead of `226`.
    pub abort_after_transfer: bool,
}

#[derive(Default)]
struct Shared {
    commands: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

pub struct MockServer {
    port: u16,
    cert_pem: String,
    shared: Arc<Mutex<Shared>>,
}

impl MockServer {
    pub fn start(script: Script) -> MockServer {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_pem = cert.serialize_pem().unwrap();
        let key_pem = cert.serialize_private_key_pem();

        let identity = Identity::from_pkcs8(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap();
        let acceptor = TlsAcceptor::new(identity).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let state = Arc::clone(&shared);
        thread::spawn(move || {
            for control in listener.incoming() {
                let control = match control {
                    Ok(control) => control,
                    Err(_) => break,
                };
                let _ = Session::new(&acceptor, &script, &state).serve(control);
            }
        });

        MockServer { port, cert_pem, shared }
    }

    /// Client configuration trusting this server's certificate.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_root_certificate_pem(self.cert_pem.clone())
            .with_io_timeout(Some(IO_TIMEOUT))
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("localhost", self.port).with_credentials(USER, PASSWORD)
    }

    pub fn url(&self, path: &str) -> String {
        format!("ftps://{}:{}@localhost:{}{}", USER, PASSWORD, self.port, path)
    }

    pub fn commands(&self) -> Vec<String> {
        self.shared.lock().unwrap().commands.clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.shared.lock().unwrap().files.get(path).cloned()
    }

    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.shared.lock().unwrap().files.insert(path.to_owned(), contents.to_vec());
    }

    pub fn put_dir(&self, path: &str) {
        self.shared.lock().unwrap().dirs.insert(path.to_owned());
    }
}

struct Session<'a> {
    acceptor: &'a TlsAcceptor,
    script: &'a Script,
    shared: &'a Mutex<Shared>,
    user: Option<String>,
    logged_in: bool,
    pbsz: bool,
    prot: bool,
    binary: bool,
    passive: Option<TcpListener>,
}

impl<'a> Session<'a> {
    fn new(acceptor: &'a TlsAcceptor, script: &'a Script, shared: &'a Mutex<Shared>) -> Session<'a> {
        Session {
            acceptor,
            script,
            shared,
            user: None,
            logged_in: false,
            pbsz: false,
            prot: false,
            binary: false,
            passive: None,
        }
    }

    fn serve(mut self, mut control: TcpStream) -> io::Result<()> {
        control.set_read_timeout(Some(IO_TIMEOUT))?;
        // Greeting split mid-line across two writes.
        control.write_all(b"220-Mock FTPS server\r\n220-TLS ")?;
        control.flush()?;
        thread::sleep(Duration::from_millis(20));
        control.write_all(b"required\r\n220 Ready.\r\n")?;

        let mut plain = BufReader::new(control);
        match self.read_command(&mut plain)? {
            Some(ref line) if line == "AUTH TLS" => reply(plain.get_mut(), status::AUTH_OK, "Proceed with negotiation.")?,
            Some(_) => return reply(plain.get_mut(), status::NOT_LOGGED_IN, "Please use AUTH TLS."),
            None => return Ok(()),
        }
        let tls = self.acceptor.accept(plain.into_inner()).map_err(other)?;
        let mut control = BufReader::new(tls);

        while let Some(line) = self.read_command(&mut control)? {
            let (verb, arg) = match line.find(' ') {
                Some(i) => (line[..i].to_owned(), line[i + 1..].to_owned()),
                None => (line.clone(), String::new()),
            };
            if verb == "QUIT" {
                return reply(control.get_mut(), status::CLOSING, "Goodbye.");
            }
            self.handle(control.get_mut(), &verb, &arg)?;
        }
        Ok(())
    }

    fn read_command<R: BufRead>(&self, reader: &mut R) -> io::Result<Option<String>> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n').to_owned();
        self.shared.lock().unwrap().commands.push(line.clone());
        Ok(Some(line))
    }

    fn handle<W: Write>(&mut self, out: &mut W, verb: &str, arg: &str) -> io::Result<()> {
        match verb {
            "USER" => {
                self.user = Some(arg.to_owned());
                return reply(out, status::NEED_PASSWORD, "Please specify the password.");
            }
            "PASS" if self.user.is_none() => return reply(out, status::BAD_SEQUENCE, "Login with USER first."),
            "PASS" if self.script.reject_login || arg != PASSWORD => return reply(out, status::NOT_LOGGED_IN, "Login incorrect."),
            "PASS" => {
                self.logged_in = true;
                out.write_all(format!("{0}-Welcome.\r\n{0}-Be nice.\r\n", status::LOGGED_IN).as_bytes())?;
                return reply(out, status::LOGGED_IN, "Login successful.");
            }
            _ if !self.logged_in => return reply(out, status::NOT_LOGGED_IN, "Please login with USER and PASS."),
            _ => {}
        }

        match verb {
            "PBSZ" => {
                self.pbsz = true;
                reply(out, status::COMMAND_OK, "PBSZ set to 0.")
            }
            "PROT" if !self.pbsz => reply(out, status::BAD_SEQUENCE, "PBSZ required before PROT."),
            "PROT" if arg != "P" => reply(out, 536, "Only private data channels are offered."),
            "PROT" => {
                self.prot = true;
                reply(out, status::COMMAND_OK, "PROT now Private.")
            }
            "TYPE" | "MODE" | "STRU" if !self.prot => reply(out, status::BAD_SEQUENCE, "Protection level must be set first."),
            "TYPE" => {
                self.binary = arg == "I";
                reply(out, status::COMMAND_OK, "Switching to Binary mode.")
            }
            "MODE" => reply(out, status::COMMAND_OK, "Mode set to S."),
            "STRU" => reply(out, status::COMMAND_OK, "Structure set to F."),
            "PASV" if !self.prot => reply(out, status::BAD_SEQUENCE, "Protection level must be set first."),
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                if !self.script.drop_passive_listener {
                    self.passive = Some(listener);
                }
                let text = format!("Entering Passive Mode (127,0,0,1,{},{}).", port / 256, port % 256);
                reply(out, status::PASSIVE_MODE, &text)
            }
            "LIST" | "RETR" | "STOR" => self.transfer(out, verb, arg),
            "DELE" => {
                if self.shared.lock().unwrap().files.remove(arg).is_some() {
                    reply(out, status::REQUESTED_FILE_ACTION_OK, "Delete operation successful.")
                } else {
                    reply(out, status::FILE_UNAVAILABLE, "Delete operation failed.")
                }
            }
            "MKD" => {
                if self.shared.lock().unwrap().dirs.insert(arg.to_owned()) {
                    reply(out, status::PATH_CREATED, &format!("\"{}\" created", arg))
                } else {
                    reply(out, status::FILE_UNAVAILABLE, "Create directory operation failed.")
                }
            }
            "RMD" => {
                if self.shared.lock().unwrap().dirs.remove(arg) {
                    reply(out, status::REQUESTED_FILE_ACTION_OK, "Remove directory operation successful.")
                } else {
                    reply(out, status::FILE_UNAVAILABLE, "Remove directory operation failed.")
                }
            }
            _ => reply(out, status::NOT_IMPLEMENTED, "Command not implemented."),
        }
    }

    fn transfer<W: Write>(&mut self, out: &mut W, verb: &str, arg: &str) -> io::Result<()> {
        let listener = match self.passive.take() {
            Some(listener) => listener,
            None => return reply(out, status::CANNOT_OPEN_DATA_CONNECTION, "Use PASV first."),
        };
        if !self.binary {
            return reply(out, status::BAD_SEQUENCE, "Binary mode required.");
        }

        match verb {
            "LIST" => {
                let listing = self.listing(arg);
                reply(out, status::ABOUT_TO_SEND, "Here comes the directory listing.")?;
                self.send(listener, listing.as_bytes())?;
                self.complete(out, "Directory send OK.")
            }
            "RETR" => {
                let contents = match self.shared.lock().unwrap().files.get(arg) {
                    Some(contents) => contents.clone(),
                    None => return reply(out, status::FILE_UNAVAILABLE, "Failed to open file."),
                };
                reply(out, status::ABOUT_TO_SEND, "Opening BINARY mode data connection.")?;
                self.send(listener, &contents)?;
                self.complete(out, "Transfer complete.")
            }
            _ => {
                if self.script.reject_stor {
                    return reply(out, status::FILE_UNAVAILABLE, "Permission denied.");
                }
                reply(out, status::ABOUT_TO_SEND, "Ok to send data.")?;
                let contents = self.receive(listener)?;
                if !self.script.abort_after_transfer {
                    self.shared.lock().unwrap().files.insert(arg.to_owned(), contents);
                }
                self.complete(out, "Transfer complete.")
            }
        }
    }

    fn complete<W: Write>(&self, out: &mut W, text: &str) -> io::Result<()> {
        if self.script.abort_after_transfer {
            reply(out, status::ACTION_ABORTED, "Local error in processing.")
        } else {
            reply(out, status::CLOSING_DATA_CONNECTION, text)
        }
    }

    fn listing(&self, dir: &str) -> String {
        let shared = self.shared.lock().unwrap();
        let prefix = if dir.ends_with('/') { dir.to_owned() } else { format!("{}/", dir) };
        let mut listing = String::new();
        for name in shared.dirs.iter().filter(|d| d.starts_with(&prefix)) {
            listing.push_str(&format!("drwxr-xr-x 2 ftp ftp 4096 Jan 01 00:00 {}\r\n", &name[prefix.len()..]));
        }
        for (name, contents) in shared.files.iter().filter(|(f, _)| f.starts_with(&prefix)) {
            listing.push_str(&format!(
                "-rw-r--r-- 1 ftp ftp {:>8} Jan 01 00:00 {}\r\n",
                contents.len(),
                &name[prefix.len()..]
            ));
        }
        listing
    }

    fn accept_data(&self, listener: TcpListener) -> io::Result<TlsStream<TcpStream>> {
        let (tcp, _) = listener.accept()?;
        tcp.set_read_timeout(Some(IO_TIMEOUT))?;
        self.acceptor.accept(tcp).map_err(other)
    }

    fn send(&self, listener: TcpListener, contents: &[u8]) -> io::Result<()> {
        let mut data = self.accept_data(listener)?;
        data.write_all(contents)?;
        data.shutdown()?;
        // Wait for the client's close_notify before dropping the socket.
        let mut rest = Vec::new();
        let _ = data.read_to_end(&mut rest);
        Ok(())
    }

    fn receive(&self, listener: TcpListener) -> io::Result<Vec<u8>> {
        let mut data = self.accept_data(listener)?;
        let mut contents = Vec::new();
        data.read_to_end(&mut contents)?;
        let _ = data.shutdown();
        Ok(contents)
    }
}

fn reply<W: Write>(out: &mut W, code: u32, text: &str) -> io::Result<()> {
    out.write_all(format!("{} {}\r\n", code, text).as_bytes())?;
    out.flush()
}

fn other<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}
