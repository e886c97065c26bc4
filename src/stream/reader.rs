/*!
 * Input Stream
 * Read-ahead buffered byte stream over a backend file handle
 */

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::backend::Handle;
use crate::connection::Connection;
use crate::error::{FsError, FsResult};

/// Buffered reader over one backend handle
///
/// Application reads of any size are served from a read-ahead buffer of
/// `min(file length, buffer size)` bytes that is refilled with one bulk
/// backend read whenever it runs dry. The handle is released on `close`
/// or, failing that, when the stream is dropped.
pub struct RgwInputStream {
    conn: Arc<Connection>,
    handle: Handle,
    file_length: u64,
    buffer: Vec<u8>,
    /// Next unread byte in `buffer`
    buffer_pos: usize,
    /// Bytes of `buffer` holding file data
    buffer_valid: usize,
    /// File offset the backend cursor has reached
    backend_pos: u64,
    closed: bool,
}

impl RgwInputStream {
    pub fn new(conn: Arc<Connection>, handle: Handle, file_length: u64, buffer_size: usize) -> Self {
        let capacity = file_length.min(buffer_size.max(1) as u64) as usize;
        debug!(
            handle,
            file_length, capacity, "Initializing input stream"
        );

        Self {
            conn,
            handle,
            file_length,
            buffer: vec![0u8; capacity],
            buffer_pos: 0,
            buffer_valid: 0,
            backend_pos: 0,
            closed: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// File length fixed at open time
    #[inline]
    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Logical stream position; never touches the backend
    #[inline]
    pub fn position(&self) -> u64 {
        self.backend_pos - self.buffer_valid as u64 + self.buffer_pos as u64
    }

    /// Bytes left before the recorded file length
    pub fn available(&self) -> FsResult<u64> {
        self.ensure_open()?;
        Ok(self.file_length.saturating_sub(self.position()))
    }

    /// Read one byte; `None` at end of stream
    pub fn read_byte(&mut self) -> FsResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read_into(&mut byte)? {
            Some(1) => Ok(Some(byte[0])),
            _ => Ok(None),
        }
    }

    /// Read up to `buf.len()` bytes
    ///
    /// Returns `None` once the position has reached the file length. A
    /// count shorter than requested means the backend ran out of data
    /// early (the file shrank after open), which is not an error.
    pub fn read_into(&mut self, buf: &mut [u8]) -> FsResult<Option<usize>> {
        self.ensure_open()?;

        let pos = self.position();
        if pos >= self.file_length {
            debug!(
                handle = self.handle,
                pos,
                file_length = self.file_length,
                "Read at end of stream"
            );
            return Ok(None);
        }

        let wanted = (buf.len() as u64).min(self.file_length - pos) as usize;
        let mut total = 0;
        loop {
            let n = (wanted - total).min(self.buffer_valid - self.buffer_pos);
            buf[total..total + n]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + n]);
            self.buffer_pos += n;
            total += n;

            if total == wanted || !self.fill_buffer()? {
                break;
            }
        }

        trace!(
            handle = self.handle,
            requested = buf.len(),
            read = total,
            "Read from input stream"
        );
        Ok(Some(total))
    }

    /// Move to `target`; the next read refills the buffer unless the
    /// target lies inside the bytes already buffered
    pub fn seek_to(&mut self, target: u64) -> FsResult<()> {
        self.ensure_open()?;
        trace!(handle = self.handle, target, "Seeking input stream");

        if target > self.file_length {
            return Err(FsError::InvalidSeek {
                target,
                length: self.file_length,
            });
        }

        let window_start = self.backend_pos - self.buffer_valid as u64;
        if self.buffer_valid > 0 && (window_start..=self.backend_pos).contains(&target) {
            self.buffer_pos = (target - window_start) as usize;
            return Ok(());
        }

        self.backend_pos = target;
        self.buffer_valid = 0;
        self.buffer_pos = 0;
        Ok(())
    }

    /// Release the backend handle; later calls are no-ops
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer = Vec::new();
        self.buffer_pos = 0;
        self.buffer_valid = 0;
        debug!(handle = self.handle, "Closing input stream");

        self.conn
            .backend()?
            .close(self.handle)
            .map_err(|e| FsError::Backend {
                op: "close".into(),
                code: e.code(),
            })
    }

    /// Refill from the backend; false when the backend has no more data
    fn fill_buffer(&mut self) -> FsResult<bool> {
        let backend = self.conn.backend()?;
        self.buffer_pos = 0;
        match backend.read(self.handle, self.backend_pos, &mut self.buffer) {
            Ok(n) => {
                debug!(
                    handle = self.handle,
                    offset = self.backend_pos,
                    filled = n,
                    "Filled read buffer"
                );
                self.buffer_valid = n;
                self.backend_pos += n as u64;
                Ok(n != 0)
            }
            Err(e) => {
                self.buffer_valid = 0;
                Err(FsError::BackendRead {
                    handle: self.handle,
                    code: e.code(),
                })
            }
        }
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::ClosedStream {
                handle: self.handle,
            });
        }
        Ok(())
    }
}

impl Read for RgwInputStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.read_into(buf)?.unwrap_or(0))
    }
}

impl Seek for RgwInputStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.file_length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
        }
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;

        self.seek_to(target)?;
        Ok(target)
    }
}

impl std::fmt::Debug for RgwInputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgwInputStream")
            .field("handle", &self.handle)
            .field("file_length", &self.file_length)
            .field("capacity", &self.buffer.len())
            .field("buffer_pos", &self.buffer_pos)
            .field("buffer_valid", &self.buffer_valid)
            .field("backend_pos", &self.backend_pos)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for RgwInputStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!(handle = self.handle, error = %e, "Input stream close failed during drop");
            }
        }
    }
}
