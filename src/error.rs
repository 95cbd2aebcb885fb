// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::io;

/// The six-way failure taxonomy surfaced by every [`crate::loader::Loader`]
/// and the positioned reader primitives, plus the argument-validation kind
/// used by [`crate::config::LoaderConfig::validate`].
#[derive(Debug)]
pub enum Error {
    /// An operation was attempted while the loader was locked (a load was
    /// in flight).
    Locked,
    /// An operation that requires a bound file was attempted before one
    /// was set.
    NotReady,
    /// The input was structurally malformed: bad magic, unknown header
    /// token, unclosed STL solid, unknown PLY directive, and similar.
    Loader {
        /// Human-readable detail, e.g. `"expected 'end_header'"`.
        detail: String,
    },
    /// The underlying byte stream failed.
    Io(io::Error),
    /// An optional attribute was queried while unset.
    NotAvailable,
    /// A texture reference could not be validated or resolved.
    InvalidTexture,
    /// Operation requires CRC support the 3DS decoder does not provide.
    CrcDisabled,
    /// A configuration value violated its documented minimum or range.
    InvalidArgument {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl Error {
    pub(crate) fn loader(detail: impl Into<String>) -> Self {
        Error::Loader {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Locked => write!(f, "loader is locked"),
            Error::NotReady => write!(f, "loader has no file bound"),
            Error::Loader { detail } => write!(f, "malformed input: {detail}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::NotAvailable => write!(f, "attribute not available"),
            Error::InvalidTexture => write!(f, "invalid texture"),
            Error::CrcDisabled => write!(f, "crc checking is disabled"),
            Error::InvalidArgument { field } => write!(f, "invalid value for {field}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
