//! The error type shared by every layer of the crate.
//!
//! Errors are a flat taxonomy: each variant names one kind of failure and
//! carries a short message describing where it happened. Nothing in this
//! crate retries or recovers; the first error aborts the whole operation and
//! no partially filled scene is handed out.

use std::{fmt, io};

use failure::Fail;


/// Everything that can go wrong while loading, building or saving a scene.
#[derive(Debug, Fail)]
pub enum Error {
    /// The allocator refused to provide the requested number of bytes.
    #[fail(display = "failed to allocate {} bytes", _0)]
    AllocationFailed(u64),

    /// An integer computation would overflow, or a name or line exceeds a
    /// fixed maximum, or an index is out of range.
    #[fail(display = "bounds exceeded: {}", _0)]
    BoundsExceeded(String),

    #[fail(display = "malformed header: {}", _0)]
    MalformedHeader(String),

    /// A structural problem in a header declaration, e.g. a `property` line
    /// with missing tokens.
    #[fail(display = "malformed file: {}", _0)]
    MalformedFile(String),

    /// The data section does not contain what the header promised (too few
    /// rows, too many values in a row, truncated binary data).
    #[fail(display = "malformed data: {}", _0)]
    MalformedData(String),

    #[fail(display = "data type mismatch: {}", _0)]
    DataTypeMismatch(String),

    #[fail(display = "list count mismatch: {}", _0)]
    ListCountMismatch(String),

    #[fail(display = "unsupported PLY version {}", _0)]
    UnsupportedVersion(f32),

    #[fail(display = "failed to read file: {}", _0)]
    FileRead(#[cause] io::Error),

    #[fail(display = "failed to write file: {}", _0)]
    FileWrite(#[cause] io::Error),

    /// A precondition of the API was violated by the caller.
    #[fail(display = "{}", _0)]
    Generic(String),
}

impl Error {
    /// Returns the fieldless kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AllocationFailed(_) => ErrorKind::AllocationFailed,
            Error::BoundsExceeded(_) => ErrorKind::BoundsExceeded,
            Error::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Error::MalformedFile(_) => ErrorKind::MalformedFile,
            Error::MalformedData(_) => ErrorKind::MalformedData,
            Error::DataTypeMismatch(_) => ErrorKind::DataTypeMismatch,
            Error::ListCountMismatch(_) => ErrorKind::ListCountMismatch,
            Error::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Error::FileRead(_) => ErrorKind::FileReadError,
            Error::FileWrite(_) => ErrorKind::FileWriteError,
            Error::Generic(_) => ErrorKind::Generic,
        }
    }
}

/// The kind of an [`Error`], without any attached context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AllocationFailed,
    BoundsExceeded,
    MalformedHeader,
    MalformedFile,
    MalformedData,
    DataTypeMismatch,
    ListCountMismatch,
    UnsupportedVersion,
    FileReadError,
    FileWriteError,
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::AllocationFailed => "allocation failed",
            ErrorKind::BoundsExceeded => "bounds exceeded",
            ErrorKind::MalformedHeader => "malformed header",
            ErrorKind::MalformedFile => "malformed file",
            ErrorKind::MalformedData => "malformed data",
            ErrorKind::DataTypeMismatch => "data type mismatch",
            ErrorKind::ListCountMismatch => "list count mismatch",
            ErrorKind::UnsupportedVersion => "unsupported version",
            ErrorKind::FileReadError => "file read error",
            ErrorKind::FileWriteError => "file write error",
            ErrorKind::Generic => "generic error",
        }.fmt(f)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand to create an error variant with a `format!`ed message.
macro_rules! err {
    ($variant:ident, $($t:tt)*) => {
        $crate::error::Error::$variant(format!($($t)*))
    };
}
