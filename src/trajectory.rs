use crate::error::TrajError;
use crate::format::{FileFormat, Format, FormatKind};
use crate::frame::Frame;
use log::{debug, info};
use std::fs::{File, Permissions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

enum Mode {
    Read {
        reader: BufReader<File>,
    },
    /// Frames go to a temporary file next to `path`, renamed over it by
    /// [`Trajectory::finish`]. Dropping the trajectory discards everything.
    Write {
        output: NamedTempFile,
        writer: BufWriter<File>,
    },
}

/// A trajectory file opened either for reading or for writing frames.
pub struct Trajectory {
    path: PathBuf,
    kind: FormatKind,
    strategy: Format,
    mode: Mode,
    position: usize,
}

impl Trajectory {
    /// Opens `path` for reading, guessing the format from its name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrajError> {
        Self::open_with_format(path, FormatKind::Guess)
    }

    /// Opens `path` for reading with an explicit format.
    pub fn open_with_format(path: impl AsRef<Path>, kind: FormatKind) -> Result<Self, TrajError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TrajError::NotFound(path.to_path_buf()));
        }
        let kind = match kind {
            FormatKind::Guess => FormatKind::guess(path)?,
            kind => kind,
        };
        debug!("reading {} as {kind}", path.display());

        Ok(Trajectory {
            path: path.to_path_buf(),
            kind,
            strategy: Format::new(kind, path)?,
            mode: Mode::Read {
                reader: BufReader::new(File::open(path)?),
            },
            position: 0,
        })
    }

    /// Creates `path` for writing, guessing the format from its name.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TrajError> {
        Self::create_with_format(path, FormatKind::Guess)
    }

    /// Creates `path` for writing with an explicit format.
    ///
    /// Nothing is visible at `path` until [`Trajectory::finish`] succeeds.
    pub fn create_with_format(path: impl AsRef<Path>, kind: FormatKind) -> Result<Self, TrajError> {
        let path = path.as_ref();
        let kind = match kind {
            FormatKind::Guess => FormatKind::guess(path)?,
            kind => kind,
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let output = NamedTempFile::new_in(directory)?;
        let writer = BufWriter::new(output.reopen()?);
        debug!("writing {} as {kind}", path.display());

        Ok(Trajectory {
            path: path.to_path_buf(),
            kind,
            strategy: Format::new(kind, path)?,
            mode: Mode::Write { output, writer },
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FormatKind {
        self.kind
    }

    fn reading(&mut self) -> Result<(&mut Format, &mut BufReader<File>), TrajError> {
        match &mut self.mode {
            Mode::Read { reader } => Ok((&mut self.strategy, reader)),
            Mode::Write { .. } => Err(TrajError::Precondition(format!(
                "`{}` was opened for writing",
                self.path.display()
            ))),
        }
    }

    /// Reads the next frame, or `None` once the file is exhausted.
    pub fn read(&mut self) -> Result<Option<Frame>, TrajError> {
        let (strategy, reader) = self.reading()?;
        let frame = strategy.read(reader)?;
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn forward(&mut self) -> Result<bool, TrajError> {
        let (strategy, reader) = self.reading()?;
        let skipped = strategy.forward(reader)?.is_some();
        if skipped {
            self.position += 1;
        }
        Ok(skipped)
    }

    /// Starts reading again from the first frame.
    pub fn rewind(&mut self) -> Result<(), TrajError> {
        self.reading()?;
        self.strategy = Format::new(self.kind, &self.path)?;
        self.mode = Mode::Read {
            reader: BufReader::new(File::open(&self.path)?),
        };
        self.position = 0;
        Ok(())
    }

    /// Reads the frame at `index`. Following calls to [`Trajectory::read`]
    /// continue after it.
    pub fn read_at(&mut self, index: usize) -> Result<Frame, TrajError> {
        let out_of_range = |path: &Path, count: usize| {
            TrajError::InvalidArgument(format!(
                "frame {index} is out of range, `{}` has {count} frames",
                path.display()
            ))
        };

        self.rewind()?;
        while self.position < index {
            if !self.forward()? {
                return Err(out_of_range(&self.path, self.position));
            }
        }
        match self.read()? {
            Some(frame) => Ok(frame),
            None => Err(out_of_range(&self.path, index)),
        }
    }

    /// Counts the frames without moving the read cursor.
    pub fn size(&self) -> Result<usize, TrajError> {
        let mut strategy = Format::new(self.kind, &self.path)?;
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut count = 0;
        while strategy.forward(&mut reader)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Reads every frame of the file at `path`.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Frame>, TrajError> {
        let trajectory = Self::open(path)?;
        let frames = trajectory.collect::<Result<Vec<_>, _>>()?;
        Ok(frames)
    }

    /// Appends `frame` to the output.
    pub fn write(&mut self, frame: &Frame) -> Result<(), TrajError> {
        match &mut self.mode {
            Mode::Write { writer, .. } => self.strategy.write_next(writer, frame)?,
            Mode::Read { .. } => {
                return Err(TrajError::Precondition(format!(
                    "`{}` was opened for reading",
                    self.path.display()
                )))
            }
        }
        self.position += 1;
        Ok(())
    }

    /// Flushes the output and moves it to its final path.
    pub fn finish(self) -> Result<(), TrajError> {
        let Trajectory {
            path,
            mut strategy,
            mode,
            position,
            ..
        } = self;
        match mode {
            Mode::Write { output, mut writer } => {
                strategy.finalize(&mut writer)?;
                writer.flush()?;
                drop(writer);
                if let Some(permissions) = output_permissions(&path)? {
                    output.as_file().set_permissions(permissions)?;
                }
                output.persist(&path).map_err(|e| TrajError::Io(e.error))?;
                info!("wrote {position} frames to {}", path.display());
                Ok(())
            }
            Mode::Read { .. } => Ok(()),
        }
    }
}

/// Permissions for a finished output: those of the file it replaces, or
/// `rw-r--r--` for a new one. Temporary files start out owner-only.
fn output_permissions(path: &Path) -> Result<Option<Permissions>, TrajError> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(default_permissions()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

impl Iterator for Trajectory {
    type Item = Result<Frame, TrajError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;

    fn helium(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                let mut frame = Frame::new();
                frame.add_atom(Atom::new("He", [i as f64, 0.0, 0.0]));
                frame
            })
            .collect()
    }

    #[test]
    fn missing_file() {
        let err = Trajectory::open("./src/tests-data/xyz/nope.xyz").err().unwrap();
        assert!(matches!(err, TrajError::NotFound(_)));
    }

    #[test]
    fn output_appears_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("he.xyz");

        let mut output = Trajectory::create(&path).unwrap();
        assert_eq!(output.format(), FormatKind::ExtXYZ);
        for frame in helium(4) {
            output.write(&frame).unwrap();
        }
        assert!(!path.exists());
        output.finish().unwrap();

        let mut input = Trajectory::open(&path).unwrap();
        assert_eq!(input.size().unwrap(), 4);
        assert_eq!(input.read_at(2).unwrap().positions()[0][0], 2.0);
        assert_eq!(input.read().unwrap().unwrap().positions()[0][0], 3.0);
        assert!(input.read().unwrap().is_none());

        input.rewind().unwrap();
        assert_eq!(input.count(), 4);
    }

    #[test]
    fn dropped_output_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("he.xyz");
        {
            let mut output = Trajectory::create(&path).unwrap();
            output.write(&helium(1)[0]).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn finished_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("he.xyz");
        let mut output = Trajectory::create(&path).unwrap();
        output.write(&helium(1)[0]).unwrap();
        output.finish().unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        std::fs::set_permissions(&path, Permissions::from_mode(0o664)).unwrap();
        let mut output = Trajectory::create(&path).unwrap();
        output.write(&helium(2)[1]).unwrap();
        output.finish().unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
    }

    #[test]
    fn read_past_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("he.xyz");
        let mut output = Trajectory::create(&path).unwrap();
        output.write(&helium(1)[0]).unwrap();
        output.finish().unwrap();

        let mut input = Trajectory::open(&path).unwrap();
        assert!(matches!(input.read_at(3), Err(TrajError::InvalidArgument(_))));
        assert!(matches!(input.write(&helium(1)[0]), Err(TrajError::Precondition(_))));
    }
}
