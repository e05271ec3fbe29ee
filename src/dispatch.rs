//! Turns a verb and its operands into one operation and runs it against a
//! session and the local filesystem.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{debug, info};

use super::config::ClientConfig;
use super::ftp::FtpClient;
use super::operand::{Endpoint, Operand, RemoteLocation};
use super::types::{FtpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verb {
    /// List a remote directory
    Ls,
    /// Create a remote directory
    Mkdir,
    /// Remove a remote file
    Rm,
    /// Remove a remote directory
    Rmdir,
    /// Copy a file; at least one side is an ftps:// URL
    Cp,
    /// Move a file; at least one side is an ftps:// URL
    Mv,
}

impl Verb {
    fn arity(self) -> usize {
        match self {
            Verb::Ls | Verb::Mkdir | Verb::Rm | Verb::Rmdir => 1,
            Verb::Cp | Verb::Mv => 2,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Verb::Ls => "ls",
            Verb::Mkdir => "mkdir",
            Verb::Rm => "rm",
            Verb::Rmdir => "rmdir",
            Verb::Cp => "cp",
            Verb::Mv => "mv",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    List(RemoteLocation),
    MakeDir(RemoteLocation),
    RemoveDir(RemoteLocation),
    Remove(RemoteLocation),
    Download {
        from: RemoteLocation,
        to: PathBuf,
        remove_source: bool,
    },
    Upload {
        from: PathBuf,
        to: RemoteLocation,
        remove_source: bool,
    },
    /// Download into memory, then upload. Both paths live on one server.
    RemoteCopy {
        from: RemoteLocation,
        to: RemoteLocation,
        remove_source: bool,
    },
}

impl Operation {
    /// The server this operation talks to.
    pub fn endpoint(&self) -> &Endpoint {
        match *self {
            Operation::List(ref loc)
            | Operation::MakeDir(ref loc)
            | Operation::RemoveDir(ref loc)
            | Operation::Remove(ref loc)
            | Operation::Download { from: ref loc, .. }
            | Operation::Upload { to: ref loc, .. }
            | Operation::RemoteCopy { from: ref loc, .. } => &loc.endpoint,
        }
    }
}

/// What a successful operation hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listing(String),
    Done,
}

/// Remote side of an operation. `FtpClient` is the production session.
pub trait RemoteSession {
    fn list(&mut self, path: &str) -> Result<String>;
    fn mkdir(&mut self, path: &str) -> Result<()>;
    fn rmdir(&mut self, path: &str) -> Result<()>;
    fn remove(&mut self, path: &str) -> Result<()>;
    fn download(&mut self, path: &str) -> Result<Vec<u8>>;
    fn upload(&mut self, path: &str, contents: &[u8]) -> Result<()>;
}

impl RemoteSession for FtpClient {
    fn list(&mut self, path: &str) -> Result<String> {
        FtpClient::list(self, path)
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        FtpClient::mkdir(self, path)
    }

    fn rmdir(&mut self, path: &str) -> Result<()> {
        FtpClient::rmdir(self, path)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        FtpClient::remove(self, path)
    }

    fn download(&mut self, path: &str) -> Result<Vec<u8>> {
        FtpClient::download(self, path)
    }

    fn upload(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        FtpClient::upload(self, path, contents)
    }
}

/// Local side of an operation.
pub trait LocalFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn remove(&self, path: &Path) -> Result<()>;
}

/// `LocalFs` over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl LocalFs for StdFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| FtpError::local(path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).map_err(|e| FtpError::local(path, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| FtpError::local(path, e))
    }
}

/// Resolves `verb` and its operands into an operation without touching the
/// network or the filesystem.
pub fn resolve(verb: Verb, operands: Vec<Operand>) -> Result<Operation> {
    if operands.len() != verb.arity() {
        return Err(FtpError::Usage(format!(
            "{} takes {} operand(s), got {}",
            verb,
            verb.arity(),
            operands.len()
        )));
    }
    let mut operands = operands.into_iter();

    if verb.arity() == 1 {
        let location = match operands.next() {
            Some(Operand::Remote(location)) => location,
            _ => return Err(FtpError::Usage(format!("{} needs an ftps:// URL", verb))),
        };
        if location.path.is_empty() && verb != Verb::Ls {
            return Err(FtpError::Usage(format!("{} needs a path in the URL", verb)));
        }
        return Ok(match verb {
            Verb::Mkdir => Operation::MakeDir(location),
            Verb::Rm => Operation::Remove(location),
            Verb::Rmdir => Operation::RemoveDir(location),
            _ => Operation::List(location),
        });
    }

    let (source, destination) = match (operands.next(), operands.next()) {
        (Some(source), Some(destination)) => (source, destination),
        _ => unreachable!("arity checked above"),
    };
    if source.path_is_empty() || destination.path_is_empty() {
        return Err(FtpError::Usage(format!("{} needs a non-empty source and destination path", verb)));
    }

    let remove_source = verb == Verb::Mv;
    match (source, destination) {
        (Operand::Local(from), Operand::Remote(to)) => Ok(Operation::Upload { from, to, remove_source }),
        (Operand::Remote(from), Operand::Local(to)) => Ok(Operation::Download { from, to, remove_source }),
        (Operand::Remote(from), Operand::Remote(to)) => {
            if from.endpoint.host != to.endpoint.host
                || from.endpoint.port != to.endpoint.port
                || from.endpoint.user != to.endpoint.user
            {
                return Err(FtpError::Usage(format!(
                    "{} between remotes needs both URLs on the same server and account",
                    verb
                )));
            }
            Ok(Operation::RemoteCopy { from, to, remove_source })
        }
        (Operand::Local(_), Operand::Local(_)) => {
            Err(FtpError::Usage(format!("{} needs at least one ftps:// URL", verb)))
        }
    }
}

/// Runs `operation` on an established session. For a move, the source is only
/// deleted after the transfer went through.
pub fn run<S: RemoteSession, L: LocalFs>(operation: &Operation, session: &mut S, local: &L) -> Result<Outcome> {
    match *operation {
        Operation::List(ref loc) => return session.list(&loc.path).map(Outcome::Listing),
        Operation::MakeDir(ref loc) => session.mkdir(&loc.path)?,
        Operation::RemoveDir(ref loc) => session.rmdir(&loc.path)?,
        Operation::Remove(ref loc) => session.remove(&loc.path)?,
        Operation::Upload {
            ref from,
            ref to,
            remove_source,
        } => {
            let contents = local.read(from)?;
            session.upload(&to.path, &contents)?;
            info!("uploaded {} bytes from {} to {}", contents.len(), from.display(), to.path);
            if remove_source {
                local.remove(from)?;
            }
        }
        Operation::Download {
            ref from,
            ref to,
            remove_source,
        } => {
            let contents = session.download(&from.path)?;
            local.write(to, &contents)?;
            info!("downloaded {} bytes from {} to {}", contents.len(), from.path, to.display());
            if remove_source {
                session.remove(&from.path)?;
            }
        }
        Operation::RemoteCopy {
            ref from,
            ref to,
            remove_source,
        } => {
            let contents = session.download(&from.path)?;
            session.upload(&to.path, &contents)?;
            info!("copied {} bytes from {} to {}", contents.len(), from.path, to.path);
            if remove_source {
                session.remove(&from.path)?;
            }
        }
    }
    Ok(Outcome::Done)
}

/// Resolves, connects, runs and quits. A failure anywhere drops the session
/// without `QUIT`.
pub fn execute<L: LocalFs>(verb: Verb, operands: Vec<Operand>, config: &ClientConfig, local: &L) -> Result<Outcome> {
    let operation = resolve(verb, operands)?;
    debug!("{} resolved to {:?}", verb, operation);
    let mut client = FtpClient::connect(operation.endpoint(), config)?;
    let outcome = run(&operation, &mut client, local)?;
    client.quit()?;
    Ok(outcome)
}
