use std::{error::Error as StdError, fmt, io, sync::Arc};

use wafel_layout::DllLayoutError;

/// Failures from loading a simulator binary as a [`crate::DllResource`].
#[derive(Debug, Clone)]
pub enum DllResourceError {
    /// The dynamic loader rejected the binary.
    DlOpen(Arc<dlopen::Error>),
    /// Copying the binary to a private temp file (so it can be loaded more than once)
    /// failed.
    Io(Arc<io::Error>),
    /// The binary's segment table couldn't be read.
    Layout(DllLayoutError),
    /// The binary has no `.data` or `.bss` segment to snapshot.
    MissingDataSegments,
    /// A required ABI symbol wasn't exported by the binary.
    UndefinedSymbol(String),
}

impl fmt::Display for DllResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DllResourceError::DlOpen(error) => write!(f, "{error}"),
            DllResourceError::Io(error) => write!(f, "{error}"),
            DllResourceError::Layout(error) => write!(f, "{error}"),
            DllResourceError::MissingDataSegments => {
                write!(f, "binary is missing a .data or .bss segment")
            }
            DllResourceError::UndefinedSymbol(name) => write!(f, "undefined symbol: {name}"),
        }
    }
}

impl StdError for DllResourceError {}

impl From<dlopen::Error> for DllResourceError {
    fn from(v: dlopen::Error) -> Self {
        Self::DlOpen(Arc::new(v))
    }
}

impl From<io::Error> for DllResourceError {
    fn from(v: io::Error) -> Self {
        Self::Io(Arc::new(v))
    }
}

impl From<DllLayoutError> for DllResourceError {
    fn from(v: DllLayoutError) -> Self {
        Self::Layout(v)
    }
}
