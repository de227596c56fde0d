//! Buffered duplex channel with deadlines and a sticky fatal error
//!
//! The first failure seen by any operation is latched, the underlying
//! stream halves are dropped right away, and that same error is returned by
//! every later call. A receive parked on the stream is released as soon as
//! the shared latch trips, whoever tripped it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
	AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tracing::{debug, trace};

use crate::codec::{self, Reply};
use crate::error::{ChannelError, CopyError};
use crate::latch::FatalLatch;

/// Smallest accepted primary buffer
pub const MIN_BUFFER_SIZE: usize = 16;

/// Default primary buffer size for reads and writes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Deadlines and buffer sizing for a [`Channel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
	/// Read deadline; zero blocks indefinitely
	pub read_timeout: Duration,
	/// Write deadline; zero blocks indefinitely
	pub write_timeout: Duration,
	/// Primary buffer capacity
	pub buffer_size: usize,
}

impl Default for ChannelConfig {
	fn default() -> Self {
		Self {
			read_timeout: Duration::ZERO,
			write_timeout: Duration::ZERO,
			buffer_size: DEFAULT_BUFFER_SIZE,
		}
	}
}

pub struct Channel<R, W> {
	reader: Option<BufReader<R>>,
	writer: Option<BufWriter<W>>,
	latch: Arc<FatalLatch<ChannelError>>,
	config: ChannelConfig,
}

impl<R, W> Channel<R, W>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	pub fn new(reader: R, writer: W, config: ChannelConfig) -> Self {
		Self::with_latch(reader, writer, config, Arc::new(FatalLatch::new()))
	}

	/// Build a channel that shares its fatal latch with other components.
	///
	/// A trip from another holder releases a receive parked on this channel
	/// at once. An idle channel has no task running, so its stream halves are
	/// only dropped when its next operation sees the latched error.
	pub fn with_latch(
		reader: R,
		writer: W,
		config: ChannelConfig,
		latch: Arc<FatalLatch<ChannelError>>,
	) -> Self {
		let capacity = config.buffer_size.max(MIN_BUFFER_SIZE);
		Self {
			reader: Some(BufReader::with_capacity(capacity, reader)),
			writer: Some(BufWriter::with_capacity(capacity, writer)),
			latch,
			config,
		}
	}

	/// Shared handle to this channel's latch; see [`with_latch`](Self::with_latch)
	/// for when an external trip closes the stream
	pub fn latch(&self) -> Arc<FatalLatch<ChannelError>> {
		Arc::clone(&self.latch)
	}

	/// The latched error, if the channel has failed
	pub fn err(&self) -> Option<ChannelError> {
		self.latch.get()
	}

	/// Queue bytes for sending; delivery is only guaranteed after [`flush`](Self::flush)
	pub async fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
		let limit = self.config.write_timeout;
		let writer = self.writer_mut()?;
		let result = with_deadline(limit, "write", async {
			writer.write_all(data).await.map_err(ChannelError::from)
		})
		.await;
		result.map_err(|e| self.fatal(e))
	}

	/// Queue exactly `n` bytes read from `src`.
	///
	/// If `src` runs dry early the frame on the wire is already broken, so
	/// the shortfall is latched as [`ChannelError::ShortRead`].
	pub async fn send_exact<S>(&mut self, src: &mut S, n: u64) -> Result<(), ChannelError>
	where
		S: AsyncRead + Unpin,
	{
		let limit = self.config.write_timeout;
		let writer = self.writer_mut()?;
		let result = with_deadline(limit, "write", async {
			let mut limited = src.take(n);
			let copied = tokio::io::copy(&mut limited, writer).await?;
			if copied < n {
				return Err(ChannelError::ShortRead { expected: n, copied });
			}
			Ok(())
		})
		.await;
		result.map_err(|e| self.fatal(e))
	}

	/// Push buffered bytes out to the stream
	pub async fn flush(&mut self) -> Result<(), ChannelError> {
		let limit = self.config.write_timeout;
		let writer = self.writer_mut()?;
		let result =
			with_deadline(limit, "flush", async { writer.flush().await.map_err(ChannelError::from) })
				.await;
		result.map_err(|e| self.fatal(e))
	}

	/// Read one line using the configured read deadline
	pub async fn receive_line(&mut self) -> Result<Reply, ChannelError> {
		self.receive_line_with_timeout(self.config.read_timeout).await
	}

	/// Read one line, giving up after `timeout` (zero waits indefinitely).
	///
	/// A clean end of stream is reported as [`Reply::Eof`] rather than an error.
	pub async fn receive_line_with_timeout(
		&mut self,
		timeout: Duration,
	) -> Result<Reply, ChannelError> {
		let latch = Arc::clone(&self.latch);
		let reader = self.reader_mut()?;
		let result = tokio::select! {
			biased;
			_ = latch.tripped() => Err(latch.get().unwrap_or(ChannelError::Closed)),
			r = with_deadline(timeout, "read", codec::read_header_line(reader)) => r,
		};
		match result {
			Ok(reply) => {
				if let Reply::Line(line) = &reply {
					trace!("<< {}", String::from_utf8_lossy(line));
				}
				Ok(reply)
			}
			Err(e) => Err(self.fatal(e)),
		}
	}

	/// Copy exactly `n` bytes from the stream into `sink`.
	///
	/// The read buffer is drained first, then the stream. A stream that ends
	/// early is fatal. A failing sink is not: the rest of the payload is
	/// still consumed so the next command starts on a frame boundary.
	pub async fn copy_n<S>(&mut self, sink: &mut S, n: u64) -> Result<(), CopyError>
	where
		S: AsyncWrite + Unpin,
	{
		let limit = self.config.read_timeout;
		let latch = Arc::clone(&self.latch);
		let reader = self.reader_mut()?;

		let result = tokio::select! {
			biased;
			_ = latch.tripped() => Err(CopyError::Channel(latch.get().unwrap_or(ChannelError::Closed))),
			r = with_deadline(limit, "read", copy_exact(reader, sink, n)) => r,
		};
		match result {
			Err(CopyError::Channel(e)) => Err(CopyError::Channel(self.fatal(e))),
			other => other,
		}
	}

	/// Close the channel; later operations report [`ChannelError::Closed`]
	pub fn close(&mut self) {
		self.fatal(ChannelError::Closed);
	}

	/// Latch `err` and drop the stream if this is the first failure.
	///
	/// Returns the error that won the latch.
	fn fatal(&mut self, err: ChannelError) -> ChannelError {
		if !self.latch.check_and_set(err.clone()) {
			debug!("channel failed: {}", err);
		}
		self.close_stream();
		self.latch.get().unwrap_or(err)
	}

	fn close_stream(&mut self) {
		if self.reader.is_some() || self.writer.is_some() {
			trace!("closing underlying stream");
		}
		self.reader = None;
		self.writer = None;
	}

	fn check(&mut self) -> Result<(), ChannelError> {
		match self.latch.get() {
			Some(e) => {
				self.close_stream();
				Err(e)
			}
			None => Ok(()),
		}
	}

	fn reader_mut(&mut self) -> Result<&mut BufReader<R>, ChannelError> {
		self.check()?;
		self.reader.as_mut().ok_or(ChannelError::Closed)
	}

	fn writer_mut(&mut self) -> Result<&mut BufWriter<W>, ChannelError> {
		self.check()?;
		self.writer.as_mut().ok_or(ChannelError::Closed)
	}
}

impl<R, W> std::fmt::Debug for Channel<R, W> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Channel")
			.field("open", &(self.reader.is_some() && self.writer.is_some()))
			.field("latch", &self.latch)
			.field("config", &self.config)
			.finish()
	}
}

async fn with_deadline<T, E, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, E>
where
	F: Future<Output = Result<T, E>>,
	E: From<ChannelError>,
{
	if limit.is_zero() {
		return fut.await;
	}
	match tokio::time::timeout(limit, fut).await {
		Ok(result) => result,
		Err(_) => Err(ChannelError::TimedOut { op, after: limit }.into()),
	}
}

async fn copy_exact<R, S>(reader: &mut BufReader<R>, sink: &mut S, n: u64) -> Result<(), CopyError>
where
	R: AsyncRead + Unpin,
	S: AsyncWrite + Unpin,
{
	let mut remaining = n;
	let mut sink_error = None;

	while remaining > 0 {
		let available = reader.fill_buf().await.map_err(ChannelError::from)?;
		if available.is_empty() {
			return Err(ChannelError::ShortRead { expected: n, copied: n - remaining }.into());
		}
		let take = available.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
		if sink_error.is_none() {
			if let Err(e) = sink.write_all(&available[..take]).await {
				sink_error = Some(e);
			}
		}
		reader.consume(take);
		remaining -= take as u64;
	}

	if sink_error.is_none() {
		if let Err(e) = sink.flush().await {
			sink_error = Some(e);
		}
	}
	match sink_error {
		Some(e) => Err(CopyError::Sink(e)),
		None => Ok(()),
	}
}


// vim: ts=4
