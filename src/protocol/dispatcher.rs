//! Protocol state machine
//!
//! `open` hands a local file to the editor. Incoming `save` and `close`
//! commands are matched to open sessions by token. Per-command failures are
//! returned as [`CommandError`]s; only channel failures are fatal.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::command::{Command, HeaderBlock, IncomingCommand, OpenRequest, OPEN_TRAILER};
use crate::channel::Channel;
use crate::codec::Reply;
use crate::error::{ChannelError, CommandError, CopyError, FilesystemError, FsOp, SessionError};
use crate::session::{Session, SessionRegistry};

/// Suffix of in-flight save files
pub const TEMP_SUFFIX: &str = ".rsub-tmp";

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
	host_name: Option<String>,
}

impl Default for CommandDispatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl CommandDispatcher {
	/// Dispatcher labelling files with the local host name, when it resolves
	pub fn new() -> Self {
		Self::with_host_name(sysinfo::System::host_name())
	}

	pub fn with_host_name(host_name: Option<String>) -> Self {
		Self { host_name }
	}

	/// `host:basename`, or just the base name without a host name
	pub fn display_name(&self, path: &Path) -> String {
		let base = path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| path.display().to_string());
		match &self.host_name {
			Some(host) => format!("{}:{}", host, base),
			None => base,
		}
	}

	/// Send `path` to the editor and register its session.
	///
	/// A missing file is created empty first. Opening the same file twice
	/// yields the same token and replaces the earlier registry entry.
	pub async fn open<R, W>(
		&self,
		channel: &mut Channel<R, W>,
		registry: &mut SessionRegistry,
		path: &Path,
	) -> Result<Session, CommandError>
	where
		R: AsyncRead + Unpin,
		W: AsyncWrite + Unpin,
	{
		let length = match tokio::fs::metadata(path).await {
			Ok(meta) if meta.is_dir() => {
				let err = io::Error::new(io::ErrorKind::InvalidInput, "only files can be edited");
				return Err(FilesystemError::new(FsOp::NotAFile, path, err).into());
			}
			Ok(meta) => Some(meta.len()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => None,
			Err(e) => return Err(FilesystemError::new(FsOp::Stat, path, e).into()),
		};

		let mut file = match length {
			Some(_) => tokio::fs::File::open(path)
				.await
				.map_err(|e| FilesystemError::new(FsOp::Open, path, e))?,
			None => {
				debug!("creating {}", path.display());
				tokio::fs::File::create(path)
					.await
					.map_err(|e| FilesystemError::new(FsOp::Create, path, e))?
			}
		};
		let length = length.unwrap_or(0);

		let real_path = tokio::fs::canonicalize(path)
			.await
			.map_err(|e| FilesystemError::new(FsOp::Canonicalize, path, e))?;
		let session = Session::for_path(real_path);

		let request = OpenRequest {
			display_name: self.display_name(path),
			real_path: session.path.clone(),
			token: session.token.clone(),
			length,
		};
		debug!("open {} as {} ({} bytes)", request.real_path.display(), request.token, length);

		channel.send(request.header().as_bytes()).await?;
		channel.send_exact(&mut file, length).await?;
		channel.send(OPEN_TRAILER).await?;
		channel.flush().await?;

		registry.register(session.clone());
		info!("opened {}", session.path.display());
		Ok(session)
	}

	/// Act on one line received from the editor.
	///
	/// Returns the command handled, or `None` when the line is not a known
	/// command (blank lines, future commands) or a `close` names no open file.
	pub async fn dispatch<R, W>(
		&self,
		channel: &mut Channel<R, W>,
		registry: &mut SessionRegistry,
		line: &[u8],
	) -> Result<Option<Command>, CommandError>
	where
		R: AsyncRead + Unpin,
		W: AsyncWrite + Unpin,
	{
		let Some(kind) = IncomingCommand::parse(line) else {
			if !line.is_empty() {
				debug!("ignoring command {:?}", String::from_utf8_lossy(line));
			}
			return Ok(None);
		};

		let command = read_header_block(channel, kind).await?;
		match &command {
			Command::Close { token } => {
				if !self.handle_close(registry, token) {
					return Ok(None);
				}
			}
			Command::Save { token, size } => {
				self.handle_save(channel, registry, token, *size).await?
			}
			Command::Open(_) => {}
		}
		Ok(Some(command))
	}

	/// Returns whether a session was removed
	fn handle_close(&self, registry: &mut SessionRegistry, token: &str) -> bool {
		match registry.remove(token) {
			Some(path) => {
				info!("closed {}", path.display());
				true
			}
			None => {
				debug!("close for unknown token {}", token);
				false
			}
		}
	}

	async fn handle_save<R, W>(
		&self,
		channel: &mut Channel<R, W>,
		registry: &SessionRegistry,
		token: &str,
		size: u64,
	) -> Result<(), CommandError>
	where
		R: AsyncRead + Unpin,
		W: AsyncWrite + Unpin,
	{
		debug!("save token:{} size:{}", token, size);

		let Some(target) = registry.get(token).map(Path::to_path_buf) else {
			discard(channel, size).await?;
			return Err(SessionError::UnknownToken { token: token.to_string() }.into());
		};

		let permissions = match tokio::fs::metadata(&target).await {
			Ok(meta) => meta.permissions(),
			Err(e) => {
				warn!("get file({}) stat error {}", target.display(), e);
				discard(channel, size).await?;
				return Err(FilesystemError::new(FsOp::Stat, target, e).into());
			}
		};

		let temp = match create_temp(&target) {
			Ok(temp) => temp,
			Err(e) => {
				discard(channel, size).await?;
				return Err(FilesystemError::new(FsOp::TempFile, target, e).into());
			}
		};

		match temp.as_file().try_clone() {
			Ok(handle) => {
				let mut sink = tokio::fs::File::from_std(handle);
				match channel.copy_n(&mut sink, size).await {
					Ok(()) => {}
					Err(CopyError::Channel(e)) => return Err(e.into()),
					Err(CopyError::Sink(e)) => {
						return Err(FilesystemError::new(FsOp::Write, temp.path(), e).into());
					}
				}
			}
			Err(e) => {
				discard(channel, size).await?;
				return Err(FilesystemError::new(FsOp::TempFile, target, e).into());
			}
		}

		// Rename is atomic; on failure the temp file is removed and the original stays intact.
		temp.persist(&target).map_err(|e| {
			warn!("save file({}) failed {}", target.display(), e.error);
			FilesystemError::new(FsOp::Rename, target.clone(), e.error)
		})?;

		tokio::fs::set_permissions(&target, permissions)
			.await
			.map_err(|e| FilesystemError::new(FsOp::Chmod, target.clone(), e))?;

		info!("saved {} ({} bytes)", target.display(), size);
		Ok(())
	}
}

/// Collect the header block following a command line.
///
/// For `save` collection stops at the `data` field, since raw bytes follow
/// that line directly. A `save` rejected after its length is known still has
/// its payload drained.
async fn read_header_block<R, W>(
	channel: &mut Channel<R, W>,
	kind: IncomingCommand,
) -> Result<Command, CommandError>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut block = HeaderBlock::new();
	loop {
		match channel.receive_line().await? {
			Reply::Line(line) => {
				block.apply(&line)?;
				if kind == IncomingCommand::Save && block.data().is_some() {
					break;
				}
			}
			Reply::Empty => break,
			Reply::Eof => {
				let err = io::Error::new(
					io::ErrorKind::UnexpectedEof,
					format!("connection closed inside {} header", kind.name()),
				);
				return Err(ChannelError::from(err).into());
			}
		}
	}
	match kind {
		IncomingCommand::Save => {
			let size = block.data();
			match block.into_save() {
				Ok(command) => Ok(command),
				Err(e) => {
					if let Some(size) = size {
						discard(channel, size).await?;
					}
					Err(e.into())
				}
			}
		}
		IncomingCommand::Close => Ok(block.into_close()?),
	}
}

/// Consume a payload nobody will store
async fn discard<R, W>(channel: &mut Channel<R, W>, size: u64) -> Result<(), CommandError>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	match channel.copy_n(&mut tokio::io::sink(), size).await {
		Ok(()) | Err(CopyError::Sink(_)) => Ok(()),
		Err(CopyError::Channel(e)) => Err(e.into()),
	}
}

/// Temporary file next to `target`, so the final rename stays on one filesystem
fn create_temp(target: &Path) -> io::Result<tempfile::NamedTempFile> {
	let dir = match target.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
		_ => PathBuf::from("."),
	};
	let name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	tempfile::Builder::new()
		.prefix(&format!(".{}.", name))
		.suffix(TEMP_SUFFIX)
		.tempfile_in(dir)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_name_with_and_without_host() {
		let path = Path::new("/srv/app/config.yml");
		assert_eq!(
			CommandDispatcher::with_host_name(Some("box".into())).display_name(path),
			"box:config.yml"
		);
		assert_eq!(CommandDispatcher::with_host_name(None).display_name(path), "config.yml");
	}

	#[test]
	fn test_temp_file_lives_beside_target() {
		let dir = tempfile::TempDir::new().unwrap();
		let target = dir.path().join("notes.txt");
		let temp = create_temp(&target).unwrap();
		assert_eq!(temp.path().parent(), Some(dir.path()));
		let name = temp.path().file_name().unwrap().to_string_lossy().into_owned();
		assert!(name.starts_with(".notes.txt."));
		assert!(name.ends_with(TEMP_SUFFIX));
	}
}

// vim: ts=4
