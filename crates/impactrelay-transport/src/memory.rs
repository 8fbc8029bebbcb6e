use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TransportError};
use crate::traits::Link;

/// In-memory duplex link.
///
/// Every clone shares the same state: bytes injected with [`MemoryLink::inject`]
/// become readable, bytes written through [`Write`] are collected and can be
/// drained with [`MemoryLink::take_written`]. Closing the link makes every
/// subsequent read, write and poll fail with a broken-pipe error.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

impl MemoryLink {
    /// Create an empty, open link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the reading side.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes.iter().copied());
    }

    /// Drain everything written to the link so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().outbound)
    }

    /// Copy of everything written to the link so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().outbound.clone()
    }

    /// Mark the link as closed.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Whether [`MemoryLink::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::new(ErrorKind::BrokenPipe, "memory link closed")
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(closed_error());
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(closed_error());
        }
        state.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        Ok(())
    }
}

impl Link for MemoryLink {
    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        Ok(state.inbound.len())
    }

    fn try_clone_link(&self) -> Result<Box<dyn Link>> {
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_bytes_are_readable() {
        let mut link = MemoryLink::new();
        link.inject(b"hello");

        assert_eq!(link.bytes_available().unwrap(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(link.bytes_available().unwrap(), 2);
    }

    #[test]
    fn clones_share_written_bytes() {
        let link = MemoryLink::new();
        let mut writer = link.clone();
        writer.write_all(b"PKT").unwrap();

        assert_eq!(link.written(), b"PKT");
        assert_eq!(link.take_written(), b"PKT");
        assert!(link.written().is_empty());
    }

    #[test]
    fn closed_link_fails_everything() {
        let mut link = MemoryLink::new();
        link.close();

        assert!(matches!(
            link.bytes_available(),
            Err(TransportError::Closed)
        ));
        assert_eq!(
            link.write(b"x").unwrap_err().kind(),
            ErrorKind::BrokenPipe
        );
        let mut buf = [0u8; 1];
        assert_eq!(link.read(&mut buf).unwrap_err().kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn cloned_link_handle_reads_same_queue() {
        let link = MemoryLink::new();
        let mut other = link.try_clone_link().unwrap();
        link.inject(b"SET:a");

        assert_eq!(other.bytes_available().unwrap(), 5);
    }
}
