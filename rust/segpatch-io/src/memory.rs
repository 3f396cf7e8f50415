use std::ops::Range;

use crate::{ReadAt, SealingWrite, verify};

impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        read_slice(self, range)
    }
}

impl ReadAt for Box<[u8]> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        read_slice(self, range)
    }
}

fn read_slice(content: &[u8], range: Range<u64>) -> std::io::Result<Vec<u8>> {
    verify!(range.end >= range.start);
    let pos = range.start as usize;
    if pos > content.len() {
        return Ok(Vec::new());
    }
    let len = std::cmp::min((range.end - range.start) as usize, content.len() - pos);
    Ok(content[pos..pos + len].to_vec())
}

impl SealingWrite for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
