use std::{
    collections::BTreeMap,
    fmt, fs,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use crate::{Frame, Inputs};

/// Magic number for a track file: "TRK1".
const MAGIC: [u8; 4] = [b'T', b'R', b'K', b'1'];
const HEADER_LEN: usize = 8;
const RECORD_LEN: usize = 4;

/// Errors loading or saving a track file.
#[derive(Debug, Clone)]
pub enum TrackError {
    /// The file couldn't be read.
    ReadError {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error.
        error: Arc<io::Error>,
    },
    /// The file couldn't be written.
    WriteError {
        /// Path that failed to write.
        path: String,
        /// Underlying IO error.
        error: Arc<io::Error>,
    },
    /// The file is missing the magic header or is truncated.
    InvalidHeader {
        /// Path of the offending file.
        path: String,
    },
    /// The record count in the header doesn't match the file's length.
    TruncatedRecords {
        /// Path of the offending file.
        path: String,
        /// Number of records the header claims.
        expected: u32,
        /// Number of records actually present.
        actual: usize,
    },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::ReadError { path, error } => write!(f, "failed to read {}: {}", path, error),
            TrackError::WriteError { path, error } => {
                write!(f, "failed to write {}: {}", path, error)
            }
            TrackError::InvalidHeader { path } => write!(f, "invalid track file header: {}", path),
            TrackError::TruncatedRecords {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{}: header claims {} records but file has {}",
                path, expected, actual
            ),
        }
    }
}

impl std::error::Error for TrackError {}

/// A read-only sparse mapping from frame to input, backed by a file.
///
/// Frames with no recorded entry resolve to [`Inputs::NONE`].
#[derive(Debug, Clone, Default)]
pub struct InputTrack {
    frames: BTreeMap<Frame, Inputs>,
}

impl InputTrack {
    /// An empty track: every frame resolves to the default input.
    pub fn empty() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    /// Build a track directly from a dense record list (frame 0 is `records[0]`).
    pub fn from_records(records: Vec<Inputs>) -> Self {
        let frames = records
            .into_iter()
            .enumerate()
            .map(|(frame, inputs)| (frame as Frame, inputs))
            .collect();
        Self { frames }
    }

    /// Load a track from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let path_str = path.as_ref().display().to_string();
        let bytes = fs::read(&path).map_err(|error| TrackError::ReadError {
            path: path_str.clone(),
            error: Arc::new(error),
        })?;

        if bytes.len() < HEADER_LEN || bytes[0..4] != MAGIC {
            return Err(TrackError::InvalidHeader { path: path_str });
        }
        let record_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let body = &bytes[HEADER_LEN..];
        if body.len() % RECORD_LEN != 0 || body.len() / RECORD_LEN != record_count as usize {
            return Err(TrackError::TruncatedRecords {
                path: path_str,
                expected: record_count,
                actual: body.len() / RECORD_LEN,
            });
        }

        let records = body
            .chunks_exact(RECORD_LEN)
            .map(|chunk| Inputs {
                buttons: u16::from_be_bytes([chunk[0], chunk[1]]),
                stick_x: chunk[2] as i8,
                stick_y: chunk[3] as i8,
            })
            .collect();

        Ok(Self::from_records(records))
    }

    /// Write the track to a file, in the same bit-exact layout [`InputTrack::load`] reads.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrackError> {
        let path_str = path.as_ref().display().to_string();
        self.save_impl(path.as_ref()).map_err(|error| TrackError::WriteError {
            path: path_str,
            error: Arc::new(error),
        })
    }

    fn save_impl(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let last_frame = self.frames.keys().next_back().copied().unwrap_or(0);
        let record_count = if self.frames.is_empty() { 0 } else { last_frame + 1 };

        let mut f = BufWriter::new(fs::File::create(path)?);
        f.write_all(&MAGIC)?;
        f.write_all(&(record_count as u32).to_le_bytes())?;

        for frame in 0..record_count {
            let inputs = self.frames.get(&frame).copied().unwrap_or(Inputs::NONE);
            f.write_all(&inputs.buttons.to_be_bytes())?;
            f.write_all(&[inputs.stick_x as u8])?;
            f.write_all(&[inputs.stick_y as u8])?;
        }

        Ok(())
    }

    /// Look up the recorded input at `frame`, falling back to [`Inputs::NONE`].
    pub fn get(&self, frame: Frame) -> Inputs {
        self.frames.get(&frame).copied().unwrap_or(Inputs::NONE)
    }

    /// True if no frame in the track has an explicit record past the default.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The highest frame with an explicit record, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_frame_defaults_to_none() {
        let track = InputTrack::from_records(vec![Inputs::new(1, 0, 0)]);
        assert_eq!(track.get(0), Inputs::new(1, 0, 0));
        assert_eq!(track.get(5), Inputs::NONE);
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("scatter_inputs_test_{:x}", std::process::id()));
        let path = dir.join("track.trk");

        let records = vec![
            Inputs::new(0, 0, 0),
            Inputs::new(0x8000, 127, -128),
            Inputs::new(1, 0, 0),
        ];
        let track = InputTrack::from_records(records.clone());
        track.save(&path).unwrap();

        let loaded = InputTrack::load(&path).unwrap();
        for (frame, expected) in records.into_iter().enumerate() {
            assert_eq!(loaded.get(frame as Frame), expected);
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
