use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_relay_frame, RelayFrame};
use crate::error::{RelayError, Result};
use crate::line::LINE_END;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes relay frames and text lines to any `Write` stream.
pub struct RelayWriter<T> {
    inner: T,
    buf: BytesMut,
    lead_in: Option<u8>,
}

impl<T: Write> RelayWriter<T> {
    /// Create a writer that sends frames without a lead-in byte.
    pub fn new(inner: T) -> Self {
        Self::with_lead_in(inner, None)
    }

    /// Create a writer that sends `lead_in` immediately before each frame.
    ///
    /// A lone `\r` ahead of the tag lets a line-oriented receiver terminate
    /// whatever partial line it holds before binary data starts.
    pub fn with_lead_in(inner: T, lead_in: Option<u8>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            lead_in,
        }
    }

    /// Encode and send one relay frame (blocking).
    pub fn send_frame(&mut self, frame: &RelayFrame) -> Result<()> {
        self.buf.clear();
        if let Some(byte) = self.lead_in {
            self.buf.extend_from_slice(&[byte]);
        }
        encode_relay_frame(frame, &mut self.buf)?;
        self.write_buffered()
    }

    /// Send a text line, appending CRLF when missing.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(line.as_bytes());
        if !line.ends_with(LINE_END) {
            self.buf.extend_from_slice(LINE_END.as_bytes());
        }
        self.write_buffered()
    }

    /// Send raw bytes as-is.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(RelayError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::decode_relay_frame;

    fn frame(samples: Vec<i32>) -> RelayFrame {
        RelayFrame {
            seq: 1,
            offset: 0,
            compression: 4,
            samples,
        }
    }

    #[test]
    fn frame_is_preceded_by_lead_in() {
        let mut writer = RelayWriter::with_lead_in(Cursor::new(Vec::new()), Some(b'\r'));
        writer.send_frame(&frame(vec![1, 2])).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire[0], b'\r');
        let mut rest = BytesMut::from(&wire[1..]);
        assert_eq!(
            decode_relay_frame(&mut rest).unwrap(),
            Some(frame(vec![1, 2]))
        );
    }

    #[test]
    fn frame_without_lead_in_starts_with_tag() {
        let mut writer = RelayWriter::new(Cursor::new(Vec::new()));
        writer.send_frame(&frame(vec![])).unwrap();
        assert!(writer.get_ref().get_ref().starts_with(b"PKT"));
    }

    #[test]
    fn lines_get_a_single_crlf() {
        let mut writer = RelayWriter::new(Cursor::new(Vec::new()));
        writer.send_line("hello").unwrap();
        writer.send_line("again\r\n").unwrap();
        assert_eq!(writer.get_ref().get_ref().as_slice(), b"hello\r\nagain\r\n");
    }

    #[test]
    fn every_send_flushes() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = RelayWriter::new(sink);

        writer.send_raw(&[0x11]).unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(writer.get_mut().data, vec![0x11]);
    }

    #[test]
    fn retries_interrupted_write_and_flush() {
        let mut writer = RelayWriter::new(InterruptedOnce::default());
        writer.send_line("retry").unwrap();
        assert_eq!(writer.into_inner().data, b"retry\r\n");
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = RelayWriter::new(ZeroWriter);
        let err = writer.send_line("x").unwrap_err();
        assert!(matches!(err, RelayError::Closed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InterruptedOnce {
        wrote_once: bool,
        flushed_once: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flushed_once {
                self.flushed_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
