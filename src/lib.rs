//! # rsub - edit local files in a remote editor
//!
//! rsub speaks the rmate/rsub protocol: it hands files to an editor plugin
//! listening on a TCP port (usually reached through an SSH reverse tunnel)
//! and writes back whatever the editor saves.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rsub::{connection, Config, CommandDispatcher, Driver};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let channel = connection::connect(&config).await?;
//!     let mut driver = Driver::new(channel, CommandDispatcher::new());
//!     let summary = driver.run(&["notes.txt"]).await?;
//!     println!("saved {} times", summary.saved);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod latch;
pub mod logging;
pub mod protocol;
pub mod session;

// Re-export commonly used types and functions
pub use channel::{Channel, ChannelConfig};
pub use codec::Reply;
pub use config::Config;
pub use driver::{Driver, RunSummary};
pub use error::{
	ChannelError, CommandError, CopyError, FilesystemError, FsOp, ProtocolError, RsubError,
	SessionError,
};
pub use latch::FatalLatch;
pub use protocol::{Command, CommandDispatcher};
pub use session::{token_for, Session, SessionRegistry};

// vim: ts=4
