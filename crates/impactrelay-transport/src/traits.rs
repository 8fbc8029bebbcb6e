use std::io::{Read, Write};

use crate::error::Result;

/// A connected, bidirectional byte link.
///
/// This is the fundamental I/O type the acquisition loop and the relay
/// transmitter are written against. Reads are expected to be gated on
/// [`Link::bytes_available`] so that callers never block on an idle link.
pub trait Link: Read + Write + Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Open a second handle onto the same underlying link.
    ///
    /// Used to split a link into independently locked read and write halves.
    fn try_clone_link(&self) -> Result<Box<dyn Link>>;

    /// Human-readable name for diagnostics (port path, `memory`, ...).
    fn describe(&self) -> String;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn try_clone_link(&self) -> Result<Box<dyn Link>> {
        (**self).try_clone_link()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Read everything currently buffered on `link`, without blocking.
///
/// Returns an empty vector when nothing is pending.
pub fn read_available<L: Link + ?Sized>(link: &mut L) -> Result<Vec<u8>> {
    let pending = link.bytes_available()?;
    if pending == 0 {
        return Ok(Vec::new());
    }

    let mut chunk = vec![0u8; pending];
    let mut filled = 0usize;
    while filled < pending {
        match link.read(&mut chunk[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => break,
            Err(err) => return Err(err.into()),
        }
    }
    chunk.truncate(filled);
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLink;

    #[test]
    fn read_available_drains_pending_bytes() {
        let link = MemoryLink::new();
        link.inject(b"abc");

        let mut boxed: Box<dyn Link> = Box::new(link.clone());
        assert_eq!(read_available(&mut boxed).unwrap(), b"abc");
        assert!(read_available(&mut boxed).unwrap().is_empty());
    }

    #[test]
    fn boxed_link_forwards_description() {
        let boxed: Box<dyn Link> = Box::new(MemoryLink::new());
        assert_eq!(boxed.describe(), "memory");
    }
}
