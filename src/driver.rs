//! Lifetime of one editor connection
//!
//! Read the greeting, hand every file to the editor, then serve `save` and
//! `close` until no file is left open or the connection fails.

use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::codec::Reply;
use crate::error::{ChannelError, CommandError, RsubError};
use crate::protocol::{Command, CommandDispatcher};
use crate::session::SessionRegistry;

/// What happened during a run that ended with no open files
#[derive(Debug, Default)]
pub struct RunSummary {
	/// Greeting line sent by the editor, if any
	pub greeting: Option<String>,
	pub opened: usize,
	pub saved: usize,
	pub closed: usize,
	/// Files that could not be handed to the editor
	pub open_failures: Vec<(PathBuf, CommandError)>,
	/// Non-fatal failures of incoming commands
	pub command_failures: Vec<CommandError>,
}

pub struct Driver<R, W> {
	channel: Channel<R, W>,
	registry: SessionRegistry,
	dispatcher: CommandDispatcher,
}

impl<R, W> Driver<R, W>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	pub fn new(channel: Channel<R, W>, dispatcher: CommandDispatcher) -> Self {
		Self { channel, registry: SessionRegistry::new(), dispatcher }
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}

	pub fn channel(&self) -> &Channel<R, W> {
		&self.channel
	}

	/// Run the whole connection.
	///
	/// `Ok` means every opened file was closed by the editor. A dropped or
	/// failed connection while files remain open is
	/// [`RsubError::ConnectionLost`].
	pub async fn run<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<RunSummary, RsubError> {
		let mut summary = RunSummary { greeting: self.greet().await, ..RunSummary::default() };

		for path in paths {
			let path = path.as_ref();
			match self.dispatcher.open(&mut self.channel, &mut self.registry, path).await {
				Ok(_) => {
					info!("send file {} success", path.display());
					summary.opened += 1;
				}
				Err(e) => {
					warn!("send file {} error ({})", path.display(), e);
					summary.open_failures.push((path.to_path_buf(), e));
				}
			}
		}

		if let Some(e) = self.channel.err() {
			return Err(self.lost(Some(e)));
		}

		self.receive_loop(&mut summary).await?;
		self.channel.close();
		Ok(summary)
	}

	/// Consume the editor's greeting line. Its absence is tolerated.
	async fn greet(&mut self) -> Option<String> {
		match self.channel.receive_line().await {
			Ok(Reply::Line(line)) => {
				let greeting = String::from_utf8_lossy(&line).trim().to_string();
				debug!("response: {}", greeting);
				Some(greeting)
			}
			Ok(_) => None,
			Err(e) => {
				debug!("no greeting: {}", e);
				None
			}
		}
	}

	async fn receive_loop(&mut self, summary: &mut RunSummary) -> Result<(), RsubError> {
		loop {
			if self.registry.is_empty() {
				info!("exit, no open files");
				return Ok(());
			}

			let line = match self.channel.receive_line().await {
				Ok(Reply::Line(line)) => line,
				Ok(Reply::Empty) => continue,
				Ok(Reply::Eof) => return Err(self.lost(None)),
				Err(e) => return Err(self.lost(Some(e))),
			};

			match self.dispatcher.dispatch(&mut self.channel, &mut self.registry, &line).await {
				Ok(Some(Command::Save { .. })) => summary.saved += 1,
				Ok(Some(Command::Close { .. })) => summary.closed += 1,
				Ok(_) => {}
				Err(CommandError::Channel(e)) => return Err(self.lost(Some(e))),
				Err(e) => {
					warn!("{}", e);
					summary.command_failures.push(e);
				}
			}
		}
	}

	fn lost(&self, source: Option<ChannelError>) -> RsubError {
		let open_files = self.registry.len();
		warn!("connection close and exit ({} files open)", open_files);
		RsubError::ConnectionLost { open_files, source }
	}
}

// vim: ts=4
