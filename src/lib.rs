#![crate_name = "ftps"]
#![crate_type = "lib"]

//! ftps is an FTPS client written in Rust: explicit TLS on the control
//! channel, private (TLS) passive-mode data channels.
//!
//! ### Usage
//!
//! ```rust,no_run
//! use ftps::{ClientConfig, Endpoint, FtpClient};
//!
//! let endpoint = Endpoint::new("ftp.example.com", 21).with_credentials("alice", "secret");
//! let mut client = FtpClient::connect(&endpoint, &ClientConfig::default()).unwrap_or_else(|err|
//!     panic!("{}", err)
//! );
//! client.upload("/hello.txt", b"hello").unwrap();
//! assert_eq!(client.download("/hello.txt").unwrap(), b"hello");
//! println!("{}", client.list("/").unwrap());
//! let _ = client.quit();
//! ```
//!

mod stream;
pub mod config;
pub mod control;
pub mod data;
pub mod dispatch;
mod ftp;
pub mod operand;
pub mod status;
pub mod types;

pub use self::config::ClientConfig;
pub use self::dispatch::{Operation, Outcome, Verb};
pub use self::ftp::FtpClient;
pub use self::operand::{Endpoint, Operand, RemoteLocation};
pub use self::types::{FtpError, Reply, Result};
