//! End-to-end connection lifecycle tests

mod common;

use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use common::connect;
use rsub::{ChannelConfig, CommandDispatcher, Driver, RsubError};

fn dispatcher() -> CommandDispatcher {
	CommandDispatcher::with_host_name(None)
}

#[tokio::test]
async fn test_full_session_ends_when_last_file_closes() {
	let dir = TempDir::new().unwrap();
	let a = dir.path().join("a.txt");
	let b = dir.path().join("b.txt");
	fs::write(&a, b"alpha").unwrap();
	fs::write(&b, b"beta").unwrap();

	let (channel, mut editor) = connect(ChannelConfig::default());
	let editor_task = tokio::spawn(async move {
		editor.send(b"Test Editor 1.0\n").await;
		let fa = editor.read_open().await;
		let fb = editor.read_open().await;
		assert_eq!(fa.headers["display-name"], "a.txt");
		editor.save(fa.token(), b"ALPHA").await;
		editor.close(fa.token()).await;
		editor.close(fb.token()).await;
		// Anything after the last close must never be read.
		let _ = editor.try_send(b"save\n").await;
	});

	let mut driver = Driver::new(channel, dispatcher());
	let summary = tokio::time::timeout(Duration::from_secs(5), driver.run(&[&a, &b]))
		.await
		.expect("driver should stop once no files are open")
		.unwrap();

	assert_eq!(summary.greeting.as_deref(), Some("Test Editor 1.0"));
	assert_eq!(summary.opened, 2);
	assert_eq!(summary.saved, 1);
	assert_eq!(summary.closed, 2);
	assert!(summary.open_failures.is_empty());
	assert!(summary.command_failures.is_empty());
	assert!(driver.registry().is_empty());
	assert_eq!(fs::read(&a).unwrap(), b"ALPHA");
	assert_eq!(fs::read(&b).unwrap(), b"beta");

	editor_task.await.unwrap();
}

#[tokio::test]
async fn test_connection_loss_with_open_files() {
	let dir = TempDir::new().unwrap();
	let a = dir.path().join("a.txt");
	fs::write(&a, b"alpha").unwrap();

	let (channel, mut editor) = connect(ChannelConfig::default());
	let editor_task = tokio::spawn(async move {
		editor.send(b"Test Editor\n").await;
		editor.read_open().await;
		let (_reader, mut writer) = editor.into_parts();
		writer.shutdown().await.unwrap();
	});

	let mut driver = Driver::new(channel, dispatcher());
	match driver.run(&[&a]).await {
		Err(RsubError::ConnectionLost { open_files: 1, source: None }) => {}
		other => panic!("expected connection loss, got {:?}", other),
	}
	editor_task.await.unwrap();
}

#[tokio::test]
async fn test_per_file_failures_do_not_stop_other_files() {
	let dir = TempDir::new().unwrap();
	let good = dir.path().join("good.txt");
	fs::write(&good, b"ok").unwrap();

	let (channel, mut editor) = connect(ChannelConfig::default());
	let editor_task = tokio::spawn(async move {
		editor.send(b"\n").await;
		let frame = editor.read_open().await;
		editor.send(b"unknown-command\n").await;
		editor.save("stale", b"zz").await;
		editor.close("stale").await;
		editor.close(frame.token()).await;
	});

	let mut driver = Driver::new(channel, dispatcher());
	let summary = driver.run(&[dir.path().to_path_buf(), good.clone()]).await.unwrap();

	assert_eq!(summary.greeting, None);
	assert_eq!(summary.opened, 1);
	assert_eq!(summary.open_failures.len(), 1);
	assert_eq!(summary.open_failures[0].0, dir.path());
	assert_eq!(summary.command_failures.len(), 1);
	assert!(!summary.command_failures[0].is_fatal());
	assert_eq!(summary.closed, 1);
	editor_task.await.unwrap();
}

#[tokio::test]
async fn test_nothing_to_open_ends_cleanly() {
	let dir = TempDir::new().unwrap();
	let (channel, mut editor) = connect(ChannelConfig::default());
	editor.send(b"Test Editor\n").await;

	let mut driver = Driver::new(channel, dispatcher());
	let summary = driver.run(&[dir.path()]).await.unwrap();
	assert_eq!(summary.opened, 0);
	assert_eq!(summary.open_failures.len(), 1);
}

#[tokio::test]
async fn test_read_timeout_ends_run() {
	let dir = TempDir::new().unwrap();
	let a = dir.path().join("a.txt");
	fs::write(&a, b"alpha").unwrap();

	let config = ChannelConfig { read_timeout: Duration::from_millis(100), ..ChannelConfig::default() };
	let (channel, mut editor) = connect(config);
	editor.send(b"Test Editor\n").await;

	let mut driver = Driver::new(channel, dispatcher());
	match driver.run(&[&a]).await {
		Err(RsubError::ConnectionLost { open_files: 1, source: Some(e) }) => assert!(e.is_timeout()),
		other => panic!("expected timeout, got {:?}", other),
	}
	drop(editor);
}

// vim: ts=4
