// Media sources for the symphonia engine: files, file:// URIs and fd windows

use mediaplayer_core::{AudioError, DataSource, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

const FILE_SCHEME: &str = "file://";

/// A byte window `[offset, offset + length)` of a file
pub struct FdRangeSource {
    file: File,
    offset: u64,
    length: u64,
    position: u64,
}

impl FdRangeSource {
    /// `length < 0` extends the window to the end of the file
    pub fn new(file: File, offset: i64, length: i64) -> Result<Self> {
        if offset < 0 {
            return Err(AudioError::InvalidArgument(format!("Negative offset: {}", offset)));
        }
        let offset = offset as u64;
        let file_len = file.metadata()?.len();
        if offset > file_len {
            return Err(AudioError::InvalidArgument(format!(
                "Offset {} beyond end of file ({} bytes)",
                offset, file_len
            )));
        }

        let available = file_len - offset;
        let length = if length < 0 {
            available
        } else {
            (length as u64).min(available)
        };

        let mut source = Self {
            file,
            offset,
            length,
            position: 0,
        };
        source.file.seek(SeekFrom::Start(offset))?;
        Ok(source)
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl Read for FdRangeSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        if remaining == 0 {
            return Ok(0);
        }
        let to_read = (buf.len() as u64).min(remaining) as usize;
        let n = self.file.read(&mut buf[..to_read])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for FdRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.length as i64 + p,
            SeekFrom::Current(p) => self.position as i64 + p,
        };
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Seek before start of range",
            ));
        }

        let target = (target as u64).min(self.length);
        self.file.seek(SeekFrom::Start(self.offset + target))?;
        self.position = target;
        Ok(target)
    }
}

impl MediaSource for FdRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.length)
    }
}

/// Create a hint from file extension
pub fn create_hint_from_path(path: &str) -> Hint {
    let mut hint = Hint::new();
    if let Some(extension) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }
    hint
}

/// Local path of a `file://` URI
pub fn path_from_uri(uri: &str) -> Result<&str> {
    match uri.strip_prefix(FILE_SCHEME) {
        Some(path) if !path.is_empty() => Ok(path),
        Some(_) => Err(AudioError::InvalidArgument(format!("Empty file URI: {}", uri))),
        None => Err(AudioError::UnsupportedFormat(format!("Unsupported URI scheme: {}", uri))),
    }
}

/// Open `source` for probing
pub fn open_source(source: &DataSource) -> Result<(Box<dyn MediaSource>, Hint)> {
    match source {
        DataSource::Path(path) => open_path(path),
        DataSource::Uri(uri) => open_path(path_from_uri(uri)?),
        DataSource::Fd { fd, offset, length } => {
            let file = duplicate_fd(*fd)?;
            let range = FdRangeSource::new(file, *offset, *length)?;
            Ok((Box::new(range), Hint::new()))
        }
    }
}

fn open_path(path: &str) -> Result<(Box<dyn MediaSource>, Hint)> {
    let file = File::open(path)?;
    Ok((Box::new(file), create_hint_from_path(path)))
}

/// Independent `File` for a caller-owned descriptor; the caller keeps ownership of `fd`
#[cfg(unix)]
fn duplicate_fd(fd: i32) -> Result<File> {
    use std::os::fd::BorrowedFd;

    if fd < 0 {
        return Err(AudioError::InvalidArgument(format!("Invalid fd: {}", fd)));
    }
    // SAFETY: the caller guarantees `fd` stays open for the duration of this call;
    // the descriptor is duplicated before use, so no ownership is taken
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let owned = borrowed.try_clone_to_owned()?;
    Ok(File::from(owned))
}

#[cfg(not(unix))]
fn duplicate_fd(fd: i32) -> Result<File> {
    Err(AudioError::UnsupportedFormat(format!(
        "File descriptor sources are not supported on this platform (fd {})",
        fd
    )))
}
