//! In-memory file handle.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// One virtual file held fully in memory with a read/write cursor.
///
/// Writes at the cursor overwrite existing bytes and extend the buffer as
/// needed; seeking past the end and writing fills the gap with zeros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    data: Vec<u8>,
    position: u64,
}

impl FileHandle {
    /// Open a handle over existing content, cursor at 0.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            position: 0,
        }
    }

    /// Open an empty handle.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// File name relative to the directory root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full buffered content.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Length of the buffered content.
    pub fn length(&self) -> u64 {
        self.data.len() as u64
    }

    /// Current cursor position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn read_byte(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }

    /// Read exactly `len` bytes from the cursor.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Big-endian 32-bit integer.
    pub fn read_int(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn write_int(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Big-endian 64-bit integer.
    pub fn read_long(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn write_long(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Variable-length integer: 7 bits per byte, low bits first, high bit
    /// set on every byte but the last.
    pub fn read_vint(&mut self) -> io::Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift > 63 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "variable-length integer overflows 64 bits",
                ));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn write_vint(&mut self, mut value: u64) -> io::Result<()> {
        while value >= 0x80 {
            self.write_byte((value as u8 & 0x7f) | 0x80)?;
            value >>= 7;
        }
        self.write_byte(value as u8)
    }

    /// UTF-8 string prefixed with its byte length as a vint.
    pub fn read_string(&mut self) -> io::Result<String> {
        let len = usize::try_from(self.read_vint()?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn write_string(&mut self, value: &str) -> io::Result<()> {
        self.write_vint(value.len() as u64)?;
        self.write_all(value.as_bytes())
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = usize::try_from(self.position).unwrap_or(usize::MAX);
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let start = usize::try_from(self.position)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "write past the addressable end")
        })?;
        if self.data.len() < end {
            self.data
                .try_reserve(end - self.data.len())
                .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    /// Persistence happens when the owning directory flushes the handle.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.length().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut handle = FileHandle::empty("seg0");
        handle.write_all(b"hello world").unwrap();
        assert_eq!(handle.tell(), 11);
        assert_eq!(handle.length(), 11);

        handle.rewind().unwrap();
        let mut out = String::new();
        handle.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn write_in_middle_overwrites() {
        let mut handle = FileHandle::new("f", b"abcdef".to_vec());
        handle.seek(SeekFrom::Start(2)).unwrap();
        handle.write_all(b"XY").unwrap();
        assert_eq!(handle.data(), b"abXYef");
        assert_eq!(handle.tell(), 4);
    }

    #[test]
    fn write_past_end_zero_fills() {
        let mut handle = FileHandle::new("f", b"ab".to_vec());
        handle.seek(SeekFrom::Start(4)).unwrap();
        handle.write_byte(b'z').unwrap();
        assert_eq!(handle.data(), b"ab\0\0z");
    }

    #[test]
    fn read_at_end_returns_zero() {
        let mut handle = FileHandle::new("f", b"ab".to_vec());
        handle.seek(SeekFrom::End(0)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(handle.read(&mut buf).unwrap(), 0);
        assert!(handle.read_byte().is_err());
    }

    #[test]
    fn seek_relative_and_negative() {
        let mut handle = FileHandle::new("f", vec![0; 10]);
        assert_eq!(handle.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(handle.seek(SeekFrom::Current(-2)).unwrap(), 5);
        assert!(handle.seek(SeekFrom::Current(-6)).is_err());
        assert_eq!(handle.tell(), 5);
    }

    #[test]
    fn write_at_unaddressable_offset_fails_cleanly() {
        let mut handle = FileHandle::new("f", b"ab".to_vec());
        handle.seek(SeekFrom::Start(u64::MAX)).unwrap();
        let err = handle.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(handle.tell(), u64::MAX);

        handle.seek(SeekFrom::Start(u64::MAX / 2)).unwrap();
        assert!(handle.write_all(b"xyz").is_err());
        assert_eq!(handle.tell(), u64::MAX / 2);
        assert_eq!(handle.data(), b"ab");
    }

    #[test]
    fn fixed_width_integers() {
        let mut handle = FileHandle::empty("f");
        handle.write_int(0xDEAD_BEEF).unwrap();
        handle.write_long(u64::MAX - 1).unwrap();
        assert_eq!(&handle.data()[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        handle.rewind().unwrap();
        assert_eq!(handle.read_int().unwrap(), 0xDEAD_BEEF);
        assert_eq!(handle.read_long().unwrap(), u64::MAX - 1);
    }

    #[test]
    fn vint_encoding() {
        let mut handle = FileHandle::empty("f");
        handle.write_vint(127).unwrap();
        handle.write_vint(128).unwrap();
        handle.write_vint(16_384).unwrap();
        assert_eq!(handle.data(), &[0x7f, 0x80, 0x01, 0x80, 0x80, 0x01]);

        handle.rewind().unwrap();
        assert_eq!(handle.read_vint().unwrap(), 127);
        assert_eq!(handle.read_vint().unwrap(), 128);
        assert_eq!(handle.read_vint().unwrap(), 16_384);
    }

    #[test]
    fn strings_are_length_prefixed() {
        let mut handle = FileHandle::empty("f");
        handle.write_string("héllo").unwrap();
        assert_eq!(handle.data()[0], 6);
        handle.rewind().unwrap();
        assert_eq!(handle.read_string().unwrap(), "héllo");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut handle = FileHandle::new("f", vec![2, 0xff, 0xfe]);
        let err = handle.read_string().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
