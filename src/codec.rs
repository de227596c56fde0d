//! Line framing for the editor protocol
//!
//! Control text is `\n`-terminated lines; command metadata is a header
//! block of `key: value` lines closed by a blank line. Lines are read out of
//! the reader's fixed buffer when they fit and spill into a growable buffer
//! when they do not, so line length is unbounded.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

use crate::error::{ChannelError, ProtocolError};

/// Line terminator
pub const TERMINATOR: u8 = b'\n';

/// One unit read from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// A non-empty line, terminator stripped
	Line(Vec<u8>),

	/// A blank line (end of a header block)
	Empty,

	/// The peer closed the stream cleanly between lines
	Eof,
}

/// Read one line without its terminator.
///
/// Returns `Ok(None)` on a clean end of stream. A stream that ends after a
/// partial line is a [`ProtocolError::BadLineTerminator`].
pub async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ChannelError>
where
	R: AsyncBufRead + Unpin,
{
	let mut overflow: Option<Vec<u8>> = None;

	loop {
		let available = reader.fill_buf().await?;

		if available.is_empty() {
			return match overflow {
				None => Ok(None),
				Some(partial) => {
					trace!("stream ended after {} bytes of an unterminated line", partial.len());
					Err(ProtocolError::BadLineTerminator.into())
				}
			};
		}

		match available.iter().position(|&b| b == TERMINATOR) {
			Some(end) => {
				let line = match overflow.take() {
					Some(mut buf) => {
						buf.extend_from_slice(&available[..end]);
						buf
					}
					None => available[..end].to_vec(),
				};
				reader.consume(end + 1);
				return Ok(Some(line));
			}
			None => {
				// Buffer exhausted before the terminator: keep the fragment and refill.
				let taken = available.len();
				overflow.get_or_insert_with(Vec::new).extend_from_slice(available);
				reader.consume(taken);
			}
		}
	}
}

/// Read one line of a header block, mapping a blank line to [`Reply::Empty`]
pub async fn read_header_line<R>(reader: &mut R) -> Result<Reply, ChannelError>
where
	R: AsyncBufRead + Unpin,
{
	Ok(match read_line(reader).await? {
		None => Reply::Eof,
		Some(line) if line.is_empty() => Reply::Empty,
		Some(line) => Reply::Line(line),
	})
}

/// Split a `key: value` header line. Both halves are trimmed.
pub fn split_header(line: &[u8]) -> Option<(String, String)> {
	let text = String::from_utf8_lossy(line);
	let (key, value) = text.split_once(':')?;
	Some((key.trim().to_string(), value.trim().to_string()))
}


// vim: ts=4
