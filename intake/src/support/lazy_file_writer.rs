use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// Append-only file writer that creates the file on first write
///
/// Handed to the non-blocking appender, so writes arrive from a single
/// worker thread and no locking is needed here.
#[derive(Debug)]
pub struct LazyFileWriter {
    path: PathBuf,
    file: Option<File>,
}

impl LazyFileWriter {
    pub const fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

impl Write for LazyFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Reopen when the file was removed underneath us
        if self.file.is_none() || !self.path.exists() {
            self.file = Some(self.open()?);
        }

        match self.file.as_mut().map(|file| file.write(buf)) {
            Some(Ok(bytes)) => Ok(bytes),
            _ => {
                let mut file = self.open()?;
                let bytes = file.write(buf)?;
                self.file = Some(file);
                Ok(bytes)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.as_mut().map_or(Ok(()), Write::flush)
    }
}
