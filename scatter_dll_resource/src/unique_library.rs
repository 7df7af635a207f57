use std::{
    fmt, fs,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
};

use dlopen::raw::Library;
use once_cell::sync::OnceCell;
use same_file::is_same_file;
use tempfile::TempPath;

use crate::DllResourceError;

fn loaded_binaries() -> &'static Mutex<Vec<PathBuf>> {
    static LOADED: OnceCell<Mutex<Vec<PathBuf>>> = OnceCell::new();
    LOADED.get_or_init(|| Mutex::new(Vec::new()))
}

fn is_already_loaded(path: impl AsRef<Path>) -> bool {
    let mut loaded_paths = loaded_binaries().lock().unwrap();
    if loaded_paths
        .iter()
        .any(|p| is_same_file(p, &path).unwrap_or(false))
    {
        true
    } else {
        loaded_paths.push(path.as_ref().to_path_buf());
        false
    }
}

/// A wrapper around [`Library`] that allows the same simulator binary to be opened by
/// more than one worker thread.
///
/// The dynamic loader returns the same handle (and the same global/static memory) for
/// every `open` of a given path within a process, which is exactly wrong for a
/// [`crate::DllResource`] that needs a private copy of that memory per worker. To get
/// around it, the binary is copied to a private temp file and that copy is loaded
/// instead, for every open after the first.
pub(crate) struct UniqueLibrary {
    // Must drop before `temp_path`: the temp file can't be removed while open.
    library: Library,
    original_path: PathBuf,
    temp_path: Option<TempPath>,
}

impl UniqueLibrary {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self, DllResourceError> {
        if is_already_loaded(&path) {
            let temp_file = tempfile::NamedTempFile::new()?;
            let contents = fs::read(&path)?;
            fs::write(temp_file.path(), contents)?;

            let temp_path = temp_file.into_temp_path();
            let library = Library::open(&temp_path)?;

            Ok(Self {
                library,
                original_path: path.as_ref().to_owned(),
                temp_path: Some(temp_path),
            })
        } else {
            let library = Library::open(path.as_ref())?;
            Ok(Self {
                library,
                original_path: path.as_ref().to_owned(),
                temp_path: None,
            })
        }
    }
}

impl Deref for UniqueLibrary {
    type Target = Library;

    fn deref(&self) -> &Self::Target {
        &self.library
    }
}

impl fmt::Debug for UniqueLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueLibrary")
            .field("original_path", &self.original_path)
            .field("temp_path", &self.temp_path)
            .finish_non_exhaustive()
    }
}
