#![allow(missing_docs)]

use std::{error::Error, fmt, io, sync::Arc};

/// An error reading a binary's segment table (§4.1 "Resource contract":
/// [`crate::read_dll_segments`] is the thing [`scatter_dll_resource`] loads through).
///
/// [`scatter_dll_resource`]: https://docs.rs/scatter_dll_resource
#[derive(Debug, Clone)]
pub enum DllLayoutError {
    FileReadError(Arc<io::Error>),
    ObjectReadError(object::Error),
}

impl fmt::Display for DllLayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DllLayoutError::FileReadError(error) => write!(f, "file error: {}", error),
            DllLayoutError::ObjectReadError(error) => write!(f, "object file error: {}", error),
        }
    }
}

impl Error for DllLayoutError {}

impl From<io::Error> for DllLayoutError {
    fn from(v: io::Error) -> Self {
        Self::FileReadError(Arc::new(v))
    }
}

impl From<object::Error> for DllLayoutError {
    fn from(v: object::Error) -> Self {
        Self::ObjectReadError(v)
    }
}
