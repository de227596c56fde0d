use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

use rsub::config::{CliOverrides, Config};
use rsub::logging::{debug, info, init_tracing};
use rsub::{connection, CommandDispatcher, Driver, RsubError};

const EXIT_CONFIG: u8 = 1;
const EXIT_CONNECT_FAILED: u8 = 2;
const EXIT_CONNECTION_LOST: u8 = 86;

fn cli() -> Command {
	Command::new("rsub")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Edit files on a remote server over ssh in a local editor")
		.arg_required_else_help(true)
		.arg(Arg::new("host").long("host").value_name("HOST").help("Connect to host [default: localhost]"))
		.arg(
			Arg::new("port")
				.short('p')
				.long("port")
				.value_name("PORT")
				.value_parser(value_parser!(u16))
				.help("Port number to use for connection [default: 52698]"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::SetTrue)
				.help("Verbose logging messages"),
		)
		.arg(
			Arg::new("config")
				.long("config")
				.value_name("PATH")
				.value_parser(value_parser!(PathBuf))
				.help("Config file [default: ~/.rsub.toml]"),
		)
		.arg(
			Arg::new("read-timeout")
				.long("read-timeout")
				.value_name("SECS")
				.value_parser(value_parser!(u64))
				.help("Read deadline in seconds, 0 waits forever"),
		)
		.arg(
			Arg::new("write-timeout")
				.long("write-timeout")
				.value_name("SECS")
				.value_parser(value_parser!(u64))
				.help("Write deadline in seconds, 0 waits forever"),
		)
		.arg(
			Arg::new("file")
				.value_name("FILE")
				.required(true)
				.action(ArgAction::Append)
				.num_args(1..)
				.value_parser(value_parser!(PathBuf)),
		)
}

fn overrides(matches: &ArgMatches) -> CliOverrides {
	CliOverrides {
		config_file: matches.get_one::<PathBuf>("config").cloned(),
		host: matches.get_one::<String>("host").cloned(),
		port: matches.get_one::<u16>("port").copied(),
		read_timeout_secs: matches.get_one::<u64>("read-timeout").copied(),
		write_timeout_secs: matches.get_one::<u64>("write-timeout").copied(),
		verbose: matches.get_flag("verbose"),
	}
}

fn exit_code(err: &RsubError) -> u8 {
	match err {
		RsubError::Config { .. } => EXIT_CONFIG,
		RsubError::ConnectFailed { .. } => EXIT_CONNECT_FAILED,
		RsubError::ConnectionLost { .. } => EXIT_CONNECTION_LOST,
	}
}

async fn run(config: &Config, files: &[PathBuf]) -> Result<(), RsubError> {
	let channel = connection::connect(config).await?;
	let mut driver = Driver::new(channel, CommandDispatcher::new());
	let summary = driver.run(files).await?;
	debug!("{:?}", summary);
	info!(
		"exit, no open files ({} opened, {} saves, {} failed)",
		summary.opened,
		summary.saved,
		summary.open_failures.len() + summary.command_failures.len()
	);
	Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let matches = cli().get_matches();
	let files: Vec<PathBuf> =
		matches.get_many::<PathBuf>("file").map(|v| v.cloned().collect()).unwrap_or_default();

	let config = match Config::load(&overrides(&matches)) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("rsub: {}", e);
			return ExitCode::from(EXIT_CONFIG);
		}
	};
	init_tracing(config.verbose);

	match run(&config, &files).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("rsub: {}", e);
			ExitCode::from(exit_code(&e))
		}
	}
}


// vim: ts=4
