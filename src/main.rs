use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::debug;

use ftps::dispatch::{self, StdFs};
use ftps::{ClientConfig, FtpError, Operand, Outcome, Result, Verb};

/// FTPS client: ls, mkdir, rm, rmdir, cp and mv over explicit TLS.
///
/// Operands are local paths or ftps://[user[:password]@]host[:port]/path URLs.
#[derive(Parser, Debug)]
#[command(name = "ftps", version)]
struct Cli {
    #[arg(value_enum)]
    verb: Verb,

    /// One operand for ls/mkdir/rm/rmdir, two for cp/mv
    #[arg(required = true, num_args = 1..=2)]
    operands: Vec<String>,

    /// Read/write deadline for every network operation, in seconds
    #[arg(long, env = "FTPS_TIMEOUT", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Deadline for establishing each connection, in seconds
    #[arg(long, env = "FTPS_CONNECT_TIMEOUT", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: u64,

    /// Additional PEM certificate to trust
    #[arg(long, env = "FTPS_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Skip certificate and hostname validation
    #[arg(long, env = "FTPS_INSECURE")]
    insecure: bool,

    /// Log protocol activity to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::default()
            .with_io_timeout(Some(Duration::from_secs(self.timeout)))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout));
        if let Some(ref path) = self.ca_file {
            config = config.load_root_certificate(path)?;
        }
        config.accept_invalid_certs = self.insecure;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let operands = cli
        .operands
        .iter()
        .map(|arg| Operand::parse(arg))
        .collect::<Result<Vec<_>>>()?;
    let config = cli.config()?;

    match dispatch::execute(cli.verb, operands, &config, &StdFs)? {
        Outcome::Listing(listing) => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(listing.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| FtpError::local("<stdout>", e))
        }
        Outcome::Done => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(err) = run(&cli) {
        debug!("{} failed: {:?}", cli.verb, err);
        eprintln!("ftps: {}", err);
        process::exit(err.exit_code());
    }
}
