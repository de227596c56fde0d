//! In-memory editor peer shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use tokio::io::{
	duplex, split, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream,
	ReadHalf, WriteHalf,
};

use rsub::{Channel, ChannelConfig};

pub type TestChannel = Channel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Large enough that neither side blocks on the pipe in sequential tests
pub const PIPE_SIZE: usize = 1 << 20;

/// Editor side of the connection
pub struct Editor {
	reader: BufReader<ReadHalf<DuplexStream>>,
	writer: WriteHalf<DuplexStream>,
}

/// One `open` as received by the editor
#[derive(Debug)]
pub struct OpenFrame {
	pub headers: BTreeMap<String, String>,
	pub content: Vec<u8>,
}

impl OpenFrame {
	pub fn token(&self) -> &str {
		&self.headers["token"]
	}
}

pub fn connect(config: ChannelConfig) -> (TestChannel, Editor) {
	let (local, remote) = duplex(PIPE_SIZE);
	let (r, w) = split(local);
	let (er, ew) = split(remote);
	(Channel::new(r, w, config), Editor { reader: BufReader::new(er), writer: ew })
}

impl Editor {
	pub async fn send(&mut self, bytes: &[u8]) {
		self.try_send(bytes).await.unwrap();
	}

	/// Like `send`, for writes that may race with the client hanging up
	pub async fn try_send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
		self.writer.write_all(bytes).await?;
		self.writer.flush().await
	}

	pub async fn save(&mut self, token: &str, content: &[u8]) {
		let mut frame = format!("save\ntoken: {}\ndata: {}\n", token, content.len()).into_bytes();
		frame.extend_from_slice(content);
		frame.push(b'\n');
		self.send(&frame).await;
	}

	pub async fn close(&mut self, token: &str) {
		self.send(format!("close\ntoken: {}\n\n", token).as_bytes()).await;
	}

	pub async fn read_open(&mut self) -> OpenFrame {
		let mut line = String::new();
		self.reader.read_line(&mut line).await.unwrap();
		assert_eq!(line, "open\n");

		let mut headers = BTreeMap::new();
		loop {
			line.clear();
			self.reader.read_line(&mut line).await.unwrap();
			let (key, value) = line.trim_end_matches('\n').split_once(": ").unwrap();
			headers.insert(key.to_string(), value.to_string());
			if key == "data" {
				break;
			}
		}

		let size: usize = headers["data"].parse().unwrap();
		let mut content = vec![0u8; size];
		self.reader.read_exact(&mut content).await.unwrap();
		let mut trailer = [0u8; 3];
		self.reader.read_exact(&mut trailer).await.unwrap();
		assert_eq!(&trailer, b"\n.\n");

		OpenFrame { headers, content }
	}

	/// Split back into halves, e.g. to drop the write side only
	pub fn into_parts(self) -> (BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>) {
		(self.reader, self.writer)
	}
}

// vim: ts=4
