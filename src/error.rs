//! Error kinds surfaced by tree operations.

/// Errors that can be returned by [`crate::BinaryTree`] and
/// [`crate::PatriciaTree`] operations.
///
/// All of these surface synchronously as the failure of the invoking
/// operation; no partial tree state results from a failed call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A textual prefix or bare address could not be decoded.
	#[error("invalid prefix: {text:?}")]
	InvalidPrefix {
		/// The text that failed to parse.
		text: String,
	},

	/// An address of the wrong family was passed to a tree bound to the
	/// other family.
	#[error("{text:?} is not a valid {expected} prefix")]
	FamilyMismatch {
		/// The text that was rejected.
		text: String,
		/// The family the tree is bound to (`"IPv4"` or `"IPv6"`).
		expected: &'static str,
	},

	/// `delete`/`parent`/`children`/exact `show` was called on a prefix
	/// that is not present in the tree.
	#[error("no such prefix: {prefix}")]
	UnknownPrefix {
		/// The canonical prefix text that was looked up.
		prefix: String,
	},

	/// An attempt was made to overwrite a [`crate::Route`]'s `prefix` after
	/// construction.
	#[error("route prefix is immutable")]
	ImmutableAttribute,
}

impl Error {
	pub(crate) fn invalid(text: impl Into<String>) -> Self {
		Error::InvalidPrefix { text: text.into() }
	}

	pub(crate) fn family_mismatch(text: impl Into<String>, expected: &'static str) -> Self {
		Error::FamilyMismatch {
			text: text.into(),
			expected,
		}
	}

	pub(crate) fn unknown_prefix(prefix: impl Into<String>) -> Self {
		Error::UnknownPrefix {
			prefix: prefix.into(),
		}
	}
}
