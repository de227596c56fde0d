//! Configuration for rsub
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (`--config PATH`, else ~/.rsub.toml when present)
//! 3. Environment variables (RSUB_HOST, RSUB_PORT)
//! 4. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::channel::{ChannelConfig, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
use crate::error::RsubError;

/// Port the editor plugins listen on
pub const DEFAULT_PORT: u16 = 52698;

/// Name of the per-user config file under $HOME
pub const CONFIG_FILE_NAME: &str = ".rsub.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
	// ========================================================================
	// CONNECTION
	// ========================================================================
	/// Host running the editor (usually reached through an SSH tunnel)
	pub host: String,

	/// Port of the editor plugin
	pub port: u16,

	/// Seconds to wait for the TCP connection
	pub connect_timeout_secs: u64,

	// ========================================================================
	// CHANNEL
	// ========================================================================
	/// Read deadline in seconds (0 = wait indefinitely)
	pub read_timeout_secs: u64,

	/// Write deadline in seconds (0 = wait indefinitely)
	pub write_timeout_secs: u64,

	/// Primary line buffer size in bytes
	pub buffer_size: usize,

	// ========================================================================
	// OUTPUT
	// ========================================================================
	/// Log protocol activity to stderr
	pub verbose: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			port: DEFAULT_PORT,
			connect_timeout_secs: 10,
			read_timeout_secs: 0,
			write_timeout_secs: 0,
			buffer_size: DEFAULT_BUFFER_SIZE,
			verbose: false,
		}
	}
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub config_file: Option<PathBuf>,
	pub host: Option<String>,
	pub port: Option<u16>,
	pub read_timeout_secs: Option<u64>,
	pub write_timeout_secs: Option<u64>,
	pub verbose: bool,
}

impl Config {
	/// Build the effective configuration from every layer
	pub fn load(cli: &CliOverrides) -> Result<Self, RsubError> {
		let file = match &cli.config_file {
			Some(path) => Some(path.clone()),
			None => default_config_path().filter(|p| p.is_file()),
		};
		let mut config = match file {
			Some(path) => Self::from_file(&path)?,
			None => Self::default(),
		};
		config.apply_env(|key| env::var(key).ok())?;
		config.apply_cli(cli);
		config.validate()?;
		Ok(config)
	}

	/// Parse a TOML config file; missing keys take their defaults
	pub fn from_file(path: &Path) -> Result<Self, RsubError> {
		let text = fs::read_to_string(path).map_err(|e| RsubError::Config {
			message: format!("cannot read {}: {}", path.display(), e),
		})?;
		Self::from_toml(&text)
			.map_err(|message| RsubError::Config { message: format!("{}: {}", path.display(), message) })
	}

	pub fn from_toml(text: &str) -> Result<Self, String> {
		toml::from_str(text).map_err(|e| e.to_string())
	}

	/// Apply RSUB_HOST / RSUB_PORT from `lookup`
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RsubError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = lookup("RSUB_HOST").filter(|h| !h.is_empty()) {
			self.host = host;
		}
		if let Some(port) = lookup("RSUB_PORT").filter(|p| !p.is_empty()) {
			self.port = port.trim().parse().map_err(|_| RsubError::Config {
				message: format!("RSUB_PORT is not a port number: {}", port),
			})?;
		}
		Ok(())
	}

	pub fn apply_cli(&mut self, cli: &CliOverrides) {
		if let Some(host) = &cli.host {
			self.host = host.clone();
		}
		if let Some(port) = cli.port {
			self.port = port;
		}
		if let Some(secs) = cli.read_timeout_secs {
			self.read_timeout_secs = secs;
		}
		if let Some(secs) = cli.write_timeout_secs {
			self.write_timeout_secs = secs;
		}
		self.verbose |= cli.verbose;
	}

	pub fn validate(&self) -> Result<(), RsubError> {
		if self.host.trim().is_empty() {
			return Err(RsubError::Config { message: "host must not be empty".to_string() });
		}
		if self.port == 0 {
			return Err(RsubError::Config { message: "port must not be 0".to_string() });
		}
		if self.buffer_size < MIN_BUFFER_SIZE {
			return Err(RsubError::Config {
				message: format!("buffer-size must be at least {}", MIN_BUFFER_SIZE),
			});
		}
		Ok(())
	}

	/// `host:port` as dialed
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn channel_config(&self) -> ChannelConfig {
		ChannelConfig {
			read_timeout: Duration::from_secs(self.read_timeout_secs),
			write_timeout: Duration::from_secs(self.write_timeout_secs),
			buffer_size: self.buffer_size,
		}
	}
}

fn default_config_path() -> Option<PathBuf> {
	env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.host, "localhost");
		assert_eq!(config.port, 52698);
		assert_eq!(config.read_timeout_secs, 0);
		assert!(!config.verbose);
		assert_eq!(config.address(), "localhost:52698");
	}

	#[test]
	fn test_partial_toml_keeps_defaults() {
		let config = Config::from_toml("port = 9000\nread-timeout-secs = 30\n").unwrap();
		assert_eq!(config.port, 9000);
		assert_eq!(config.host, "localhost");
		assert_eq!(config.channel_config().read_timeout, Duration::from_secs(30));
		assert_eq!(config.channel_config().write_timeout, Duration::ZERO);
	}

	#[test]
	fn test_config_serialization() {
		let config = Config { host: "editor".into(), ..Config::default() };
		let text = toml::to_string(&config).expect("Failed to serialize");
		let back = Config::from_toml(&text).expect("Failed to deserialize");
		assert_eq!(config, back);
	}

	#[test]
	fn test_env_then_cli_priority() {
		let env: HashMap<&str, &str> = [("RSUB_HOST", "envhost"), ("RSUB_PORT", "4000")].into();
		let mut config = Config::default();
		config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.address(), "envhost:4000");

		let cli = CliOverrides { port: Some(5000), verbose: true, ..CliOverrides::default() };
		config.apply_cli(&cli);
		assert_eq!(config.address(), "envhost:5000");
		assert!(config.verbose);
	}

	#[test]
	fn test_bad_env_port() {
		let mut config = Config::default();
		let err = config.apply_env(|k| (k == "RSUB_PORT").then(|| "many".to_string()));
		assert!(matches!(err, Err(RsubError::Config { .. })));
	}

	#[test]
	fn test_load_from_explicit_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("rsub.toml");
		fs::write(&path, "host = \"filehost\"\nbuffer-size = 64\n").unwrap();

		let cli = CliOverrides { config_file: Some(path), ..CliOverrides::default() };
		let mut config = Config::from_file(cli.config_file.as_deref().unwrap()).unwrap();
		config.apply_cli(&cli);
		assert_eq!(config.host, "filehost");
		assert_eq!(config.buffer_size, 64);
	}

	#[test]
	fn test_validate_rejects_tiny_buffer() {
		let config = Config { buffer_size: 4, ..Config::default() };
		assert!(config.validate().is_err());
	}
}

// vim: ts=4
