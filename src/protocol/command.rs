//! Command vocabulary of the editor protocol
//!
//! Client → editor: `open` with a fixed header set followed by raw file
//! bytes and `\n.\n`. Editor → client: `save` and `close`, each a command
//! line plus a `key: value` header block.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::codec::split_header;
use crate::error::ProtocolError;

/// Trailer written after the raw bytes of an `open`
pub const OPEN_TRAILER: &[u8] = b"\n.\n";

/// A protocol command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Open(OpenRequest),
	Save { token: String, size: u64 },
	Close { token: String },
}

/// Commands the editor may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingCommand {
	Save,
	Close,
}

impl IncomingCommand {
	/// Recognize a command line; anything unknown is `None`
	pub fn parse(line: &[u8]) -> Option<Self> {
		match String::from_utf8_lossy(line).trim() {
			"save" => Some(IncomingCommand::Save),
			"close" => Some(IncomingCommand::Close),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			IncomingCommand::Save => "save",
			IncomingCommand::Close => "close",
		}
	}
}

/// Everything the header of an `open` carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
	pub display_name: String,
	pub real_path: PathBuf,
	pub token: String,
	pub length: u64,
}

impl OpenRequest {
	/// Header lines up to and including `data: <length>`
	pub fn header(&self) -> String {
		let mut out = String::with_capacity(160);
		out.push_str("open\n");
		let _ = writeln!(out, "display-name: {}", self.display_name);
		let _ = writeln!(out, "real-path: {}", self.real_path.display());
		out.push_str("data-on-save: yes\n");
		out.push_str("re-activate: yes\n");
		out.push_str("selection: 0\n");
		let _ = writeln!(out, "token: {}", self.token);
		let _ = writeln!(out, "data: {}", self.length);
		out
	}
}

/// Fields collected from an incoming header block
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
	token: Option<String>,
	data: Option<u64>,
}

impl HeaderBlock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Fold one header line into the block. Unknown keys are skipped.
	pub fn apply(&mut self, line: &[u8]) -> Result<(), ProtocolError> {
		let Some((key, value)) = split_header(line) else {
			return Ok(());
		};
		match key.as_str() {
			"token" => self.token = Some(value),
			"data" => {
				let size = value
					.parse::<u64>()
					.map_err(|_| ProtocolError::InvalidField { field: "data", value })?;
				self.data = Some(size);
			}
			_ => {}
		}
		Ok(())
	}

	/// Payload length, once the `data` field has been seen
	pub fn data(&self) -> Option<u64> {
		self.data
	}

	pub fn into_close(self) -> Result<Command, ProtocolError> {
		let token = self.token.ok_or(ProtocolError::MissingField { command: "close", field: "token" })?;
		Ok(Command::Close { token })
	}

	pub fn into_save(self) -> Result<Command, ProtocolError> {
		let token = self.token.ok_or(ProtocolError::MissingField { command: "save", field: "token" })?;
		let size = self.data.ok_or(ProtocolError::MissingField { command: "save", field: "data" })?;
		Ok(Command::Save { token, size })
	}
}


// vim: ts=4
