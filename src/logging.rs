//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("opened file");
//! debug!("protocol detail");
//! ```

pub use tracing::{debug, error, info, warn};

/// Filter used when RUST_LOG is unset
pub fn default_filter(verbose: bool) -> &'static str {
	if verbose {
		"rsub=debug"
	} else {
		"warn"
	}
}

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence; otherwise verbose mode logs rsub at debug
/// level and quiet mode only shows warnings:
///
/// ```bash
/// RUST_LOG=rsub=trace rsub file.txt
/// ```
pub fn init_tracing(verbose: bool) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter(verbose))),
		)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_filter() {
		assert_eq!(default_filter(true), "rsub=debug");
		assert_eq!(default_filter(false), "warn");
	}
}

// vim: ts=4
