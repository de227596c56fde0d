//! Files currently open in the remote editor, keyed by correlation token

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Correlation token for a canonical path.
///
/// Hex-encoded BLAKE3 of the path, so re-opening a file reuses its token.
pub fn token_for(canonical: &Path) -> String {
	blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex().to_string()
}

/// A file handed to the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	pub token: String,
	pub path: PathBuf,
}

impl Session {
	/// Session for an already canonicalized path
	pub fn for_path(canonical: impl Into<PathBuf>) -> Self {
		let path = canonical.into();
		Self { token: token_for(&path), path }
	}
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: BTreeMap<String, PathBuf>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a session, replacing any entry with the same token.
	///
	/// Returns the path previously held under that token.
	pub fn register(&mut self, session: Session) -> Option<PathBuf> {
		let previous = self.sessions.insert(session.token.clone(), session.path.clone());
		if let Some(old) = &previous {
			if *old != session.path {
				warn!(
					"token {} moved from {} to {}",
					session.token,
					old.display(),
					session.path.display()
				);
			}
		}
		previous
	}

	pub fn get(&self, token: &str) -> Option<&Path> {
		self.sessions.get(token).map(PathBuf::as_path)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.sessions.contains_key(token)
	}

	/// Forget a session; unknown tokens are ignored
	pub fn remove(&mut self, token: &str) -> Option<PathBuf> {
		self.sessions.remove(token)
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = Session> + '_ {
		self.sessions
			.iter()
			.map(|(token, path)| Session { token: token.clone(), path: path.clone() })
	}
}


// vim: ts=4
