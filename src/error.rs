//! Error types for rsub operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Malformed wire data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
	/// The stream ended in the middle of a line
	BadLineTerminator,

	/// A header block ended without a required field
	MissingField { command: &'static str, field: &'static str },

	/// A header field carried an unparsable value
	InvalidField { field: &'static str, value: String },
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::BadLineTerminator => write!(f, "bad response line terminator"),
			ProtocolError::MissingField { command, field } => {
				write!(f, "{} command without '{}' field", command, field)
			}
			ProtocolError::InvalidField { field, value } => {
				write!(f, "invalid value for '{}': {:?}", field, value)
			}
		}
	}
}

impl Error for ProtocolError {}

/// Channel failure. Once latched, the same value is handed to every caller.
#[derive(Debug, Clone)]
pub enum ChannelError {
	/// Underlying stream I/O failure
	Io(Arc<io::Error>),

	/// A read or write deadline expired
	TimedOut { op: &'static str, after: Duration },

	/// The stream ended before an exact-length transfer completed
	ShortRead { expected: u64, copied: u64 },

	/// Malformed framing on the read side
	Protocol(ProtocolError),

	/// The channel was closed locally
	Closed,
}

impl ChannelError {
	/// True for a timeout, either explicit or reported by the OS
	pub fn is_timeout(&self) -> bool {
		match self {
			ChannelError::TimedOut { .. } => true,
			ChannelError::Io(e) => e.kind() == io::ErrorKind::TimedOut,
			_ => false,
		}
	}
}

impl fmt::Display for ChannelError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChannelError::Io(e) => write!(f, "I/O error: {}", e),
			ChannelError::TimedOut { op, after } => {
				write!(f, "{} timed out after {:?}", op, after)
			}
			ChannelError::ShortRead { expected, copied } => {
				write!(f, "short transfer: expected {} bytes, got {}", expected, copied)
			}
			ChannelError::Protocol(e) => write!(f, "protocol error: {}", e),
			ChannelError::Closed => write!(f, "conn: closed"),
		}
	}
}

impl Error for ChannelError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ChannelError::Io(e) => Some(e.as_ref()),
			ChannelError::Protocol(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for ChannelError {
	fn from(e: io::Error) -> Self {
		ChannelError::Io(Arc::new(e))
	}
}

impl From<ProtocolError> for ChannelError {
	fn from(e: ProtocolError) -> Self {
		ChannelError::Protocol(e)
	}
}

/// Session lookup failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
	/// No open session carries this token
	UnknownToken { token: String },
}

impl fmt::Display for SessionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionError::UnknownToken { token } => {
				write!(f, "save file error: unknown token {}", token)
			}
		}
	}
}

impl Error for SessionError {}

/// Filesystem step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
	Stat,
	Create,
	Open,
	Canonicalize,
	TempFile,
	Write,
	Rename,
	Chmod,
	NotAFile,
}

impl fmt::Display for FsOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FsOp::Stat => "stat",
			FsOp::Create => "create",
			FsOp::Open => "open",
			FsOp::Canonicalize => "canonicalize",
			FsOp::TempFile => "create temporary file for",
			FsOp::Write => "write",
			FsOp::Rename => "rename over",
			FsOp::Chmod => "chmod",
			FsOp::NotAFile => "edit",
		};
		f.write_str(name)
	}
}

/// Local filesystem failure while opening or saving a file
#[derive(Debug)]
pub struct FilesystemError {
	pub op: FsOp,
	pub path: PathBuf,
	pub source: io::Error,
}

impl FilesystemError {
	pub fn new(op: FsOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
		FilesystemError { op, path: path.into(), source }
	}
}

impl fmt::Display for FilesystemError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "cannot {} {}: {}", self.op, self.path.display(), self.source)
	}
}

impl Error for FilesystemError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.source)
	}
}

/// Exact-length copy failure: either the wire or the sink broke
#[derive(Debug)]
pub enum CopyError {
	/// Reading from the channel failed; the channel is latched
	Channel(ChannelError),

	/// Writing to the sink failed; the remaining payload was drained
	Sink(io::Error),
}

impl fmt::Display for CopyError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CopyError::Channel(e) => write!(f, "{}", e),
			CopyError::Sink(e) => write!(f, "sink write failed: {}", e),
		}
	}
}

impl Error for CopyError {}

impl From<ChannelError> for CopyError {
	fn from(e: ChannelError) -> Self {
		CopyError::Channel(e)
	}
}

/// Failure of a single `open`, `save` or `close`
#[derive(Debug)]
pub enum CommandError {
	Protocol(ProtocolError),
	Channel(ChannelError),
	Session(SessionError),
	Filesystem(FilesystemError),
}

impl CommandError {
	/// Only channel failures end the connection
	pub fn is_fatal(&self) -> bool {
		matches!(self, CommandError::Channel(_))
	}
}

impl fmt::Display for CommandError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CommandError::Protocol(e) => write!(f, "Protocol error: {}", e),
			CommandError::Channel(e) => write!(f, "Channel error: {}", e),
			CommandError::Session(e) => write!(f, "Session error: {}", e),
			CommandError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
		}
	}
}

impl Error for CommandError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			CommandError::Protocol(e) => Some(e),
			CommandError::Channel(e) => Some(e),
			CommandError::Session(e) => Some(e),
			CommandError::Filesystem(e) => Some(e),
		}
	}
}

impl From<ProtocolError> for CommandError {
	fn from(e: ProtocolError) -> Self {
		CommandError::Protocol(e)
	}
}

impl From<ChannelError> for CommandError {
	fn from(e: ChannelError) -> Self {
		CommandError::Channel(e)
	}
}

impl From<SessionError> for CommandError {
	fn from(e: SessionError) -> Self {
		CommandError::Session(e)
	}
}

impl From<FilesystemError> for CommandError {
	fn from(e: FilesystemError) -> Self {
		CommandError::Filesystem(e)
	}
}

/// Top-level outcome of a run that did not end cleanly
#[derive(Debug)]
pub enum RsubError {
	/// Configuration could not be loaded
	Config { message: String },

	/// The editor could not be reached
	ConnectFailed { addr: String, source: io::Error },

	/// The connection dropped while files were still open
	ConnectionLost { open_files: usize, source: Option<ChannelError> },
}

impl fmt::Display for RsubError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RsubError::Config { message } => write!(f, "Invalid configuration: {}", message),
			RsubError::ConnectFailed { addr, source } => {
				write!(f, "connect {} failed: {}", addr, source)
			}
			RsubError::ConnectionLost { open_files, source: Some(e) } => {
				write!(f, "connection closed with {} open files: {}", open_files, e)
			}
			RsubError::ConnectionLost { open_files, source: None } => {
				write!(f, "connection closed by peer with {} open files", open_files)
			}
		}
	}
}

impl Error for RsubError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			RsubError::ConnectFailed { source, .. } => Some(source),
			RsubError::ConnectionLost { source: Some(e), .. } => Some(e),
			_ => None,
		}
	}
}


// vim: ts=4
