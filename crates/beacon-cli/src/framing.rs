//! Length-prefixed packet files: each frame is a big-endian `u32` length
//! followed by that many bytes.

use std::io::{self, ErrorKind, Read, Write};

/// Frames above this size are treated as corruption.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub fn write_frame<W: Write>(w: &mut W, frame: &[u8]) -> io::Result<()> {
    let len = u32::try_from(frame.len())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "frame too large"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(frame)
}

/// Iterates frames until a clean end of input. A stream cut inside a frame
/// yields `UnexpectedEof`.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader { inner }
    }

    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut len = [0u8; 4];
        loop {
            match self.inner.read(&mut len[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.inner.read_exact(&mut len[1..])?;

        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("frame length {len} exceeds {MAX_FRAME_LEN}"),
            ));
        }
        let mut frame = vec![0u8; len];
        self.inner.read_exact(&mut frame)?;
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
