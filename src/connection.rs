//! TCP connection to the editor

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::config::Config;
use crate::error::RsubError;

/// Channel over a TCP connection
pub type TcpChannel = Channel<OwnedReadHalf, OwnedWriteHalf>;

/// Dial the editor described by `config`
pub async fn connect(config: &Config) -> Result<TcpChannel, RsubError> {
	let addr = config.address();
	let connecting = TcpStream::connect((config.host.as_str(), config.port));

	let result = if config.connect_timeout_secs == 0 {
		connecting.await
	} else {
		match tokio::time::timeout(config.connect_timeout(), connecting).await {
			Ok(result) => result,
			Err(_) => Err(std::io::Error::new(
				std::io::ErrorKind::TimedOut,
				format!("no answer within {:?}", config.connect_timeout()),
			)),
		}
	};
	let stream = result.map_err(|source| RsubError::ConnectFailed { addr: addr.clone(), source })?;

	if let Err(e) = stream.set_nodelay(true) {
		debug!("cannot disable Nagle on {}: {}", addr, e);
	}
	info!("connect {} success", addr);

	let (recv, send) = stream.into_split();
	Ok(Channel::new(recv, send, config.channel_config()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	use crate::codec::Reply;

	#[tokio::test]
	async fn test_connect_and_exchange() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let server = tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			socket.write_all(b"Editor 1.0\n").await.unwrap();
			let mut buf = [0u8; 5];
			socket.read_exact(&mut buf).await.unwrap();
			buf
		});

		let config = Config { host: "127.0.0.1".into(), port, ..Config::default() };
		let mut channel = connect(&config).await.unwrap();
		assert_eq!(channel.receive_line().await.unwrap(), Reply::Line(b"Editor 1.0".to_vec()));
		channel.send(b"ping\n").await.unwrap();
		channel.flush().await.unwrap();
		assert_eq!(&server.await.unwrap(), b"ping\n");
	}

	#[tokio::test]
	async fn test_connect_refused() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let config = Config { host: "127.0.0.1".into(), port, ..Config::default() };
		match connect(&config).await {
			Err(RsubError::ConnectFailed { addr, .. }) => assert_eq!(addr, config.address()),
			other => panic!("expected connect failure, got {:?}", other.map(|_| ())),
		}
	}
}

// vim: ts=4
