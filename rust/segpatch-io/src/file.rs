use std::{
    fs::File,
    io::Write,
    ops::Range,
    path::Path,
    sync::{Arc, OnceLock},
};

use crate::{ReadAt, SealingWrite, verify};

pub struct FileReader {
    file: Arc<File>,
    size: OnceLock<u64>,
}

impl FileReader {
    pub fn new(file: impl Into<Arc<File>>) -> FileReader {
        FileReader {
            file: file.into(),
            size: Default::default(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<FileReader> {
        Ok(FileReader::new(File::open(path)?))
    }

    fn get_size(&self) -> std::io::Result<u64> {
        if let Some(&size) = self.size.get() {
            Ok(size)
        } else {
            let size = self.file.metadata()?.len();
            let _ = self.size.set(size);
            Ok(size)
        }
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> std::io::Result<u64> {
        self.get_size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        verify!(range.end >= range.start);
        let size = self.get_size()?;
        if range.start >= size || range.is_empty() {
            return Ok(Vec::new());
        }
        let range = range.start..std::cmp::min(range.end, size);
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file_read_at_exact(&self.file, range.start, &mut buf)?;
        Ok(buf)
    }
}

pub struct FileWriter {
    file: Option<File>,
}

impl FileWriter {
    pub fn new(file: File) -> FileWriter {
        FileWriter { file: Some(file) }
    }

    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<FileWriter> {
        Ok(FileWriter::new(File::create_new(path)?))
    }
}

impl SealingWrite for FileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?
            .write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(unix)]
pub fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
pub fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    if !buf.is_empty() {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
