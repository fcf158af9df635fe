use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can return.
///
/// Per-site patching failures are reported through these variants and caught
/// by the orchestrator; only true internal invariant violations (such as
/// [`Error::SizeConstraint`]) are treated as fatal for a whole run.
#[derive(Error, Debug)]
pub enum Error {
    /// The module container is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the container.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Failed to find an item for the given token in the module tables.
    #[error("Failed to find metadata item - {0}")]
    TypeNotFound(Token),

    /// General error during type system usage.
    #[error("{0}")]
    TypeError(String),

    /// A signature tree that still contains open generic parameters (or a
    /// custom signature routine) was asked for a static, ahead-of-time
    /// evaluation.
    #[error("Signature is not statically evaluable - {0}")]
    SignatureNotClosed(String),

    /// A static data block outside the supported size range was requested.
    ///
    /// This should never occur for genuine IID-width data and signals a
    /// logic defect elsewhere; it aborts the whole run.
    #[error("Static data block size out of supported range - {0}")]
    SizeConstraint(usize),

    /// Recursion limit reached while parsing or walking type signatures.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
