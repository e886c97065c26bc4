/*!
 * Output Stream
 * Write-behind buffered byte stream over a backend file handle
 */

use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::backend::Handle;
use crate::connection::Connection;
use crate::error::{FsError, FsResult};

/// Buffered writer over one backend handle
///
/// Bytes are accumulated in a fixed-size buffer and pushed to the backend
/// when it fills, on `flush`, and on `close`. A byte counts as written only
/// once a backend write call has accepted it.
pub struct RgwOutputStream {
    conn: Arc<Connection>,
    handle: Handle,
    buffer: Vec<u8>,
    buffer_used: usize,
    /// File offset up to which bytes were accepted by the backend
    backend_pos: u64,
    closed: bool,
}

impl RgwOutputStream {
    /// Create a stream whose first byte lands at `start_position`
    pub fn new(
        conn: Arc<Connection>,
        handle: Handle,
        start_position: u64,
        buffer_size: usize,
    ) -> Self {
        debug!(handle, start_position, buffer_size, "Initializing output stream");
        Self {
            conn,
            handle,
            buffer: vec![0u8; buffer_size.max(1)],
            buffer_used: 0,
            backend_pos: start_position,
            closed: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bytes held locally, not yet accepted by the backend
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer_used
    }

    /// Logical stream position
    pub fn position(&self) -> FsResult<u64> {
        self.ensure_open()?;
        Ok(self.backend_pos + self.buffer_used as u64)
    }

    pub fn write_byte(&mut self, byte: u8) -> FsResult<()> {
        self.write_bytes(&[byte])
    }

    /// Absorb all of `data`, pushing each full buffer to the backend
    ///
    /// On error, the bytes of `data` absorbed before the failing flush stay
    /// buffered; `Write::write` reports that count exactly.
    pub fn write_bytes(&mut self, data: &[u8]) -> FsResult<()> {
        self.ensure_open()?;
        let mut remaining = data;
        while !remaining.is_empty() {
            let n = self.absorb(remaining)?;
            remaining = &remaining[n..];
        }
        Ok(())
    }

    /// Copy as much of `data` as fits, flushing a full buffer first
    ///
    /// Either absorbs at least one byte or fails having absorbed none.
    fn absorb(&mut self, data: &[u8]) -> FsResult<usize> {
        self.ensure_open()?;
        if self.buffer_used == self.buffer.len() {
            self.flush_buffer()?;
        }

        let n = data.len().min(self.buffer.len() - self.buffer_used);
        self.buffer[self.buffer_used..self.buffer_used + n].copy_from_slice(&data[..n]);
        self.buffer_used += n;
        trace!(handle = self.handle, requested = data.len(), absorbed = n, "Write to output stream");
        Ok(n)
    }

    /// Drain the buffer and ask the backend to make accepted bytes durable
    pub fn flush(&mut self) -> FsResult<()> {
        self.ensure_open()?;
        self.flush_buffer()?;
        self.conn
            .backend()?
            .fsync(self.handle)
            .map_err(|e| FsError::Backend {
                op: "fsync".into(),
                code: e.code(),
            })
    }

    /// Flush, then release the handle; later calls are no-ops
    ///
    /// A failed flush leaves the stream open so the close can be retried.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.release()
    }

    /// Push buffered bytes until the backend has accepted all of them
    ///
    /// Short writes retry with the unaccepted remainder moved to the front
    /// of the buffer. On a backend error the remainder stays buffered.
    fn flush_buffer(&mut self) -> FsResult<()> {
        while self.buffer_used > 0 {
            let backend = self.conn.backend()?;
            let accepted = backend
                .write(self.handle, self.backend_pos, &self.buffer[..self.buffer_used])
                .map_err(|e| FsError::BackendWrite {
                    handle: self.handle,
                    code: e.code(),
                })?;
            if accepted == 0 {
                return Err(FsError::BackendWrite {
                    handle: self.handle,
                    code: 0,
                });
            }

            let accepted = accepted.min(self.buffer_used);
            debug!(
                handle = self.handle,
                offset = self.backend_pos,
                requested = self.buffer_used,
                accepted,
                "Flushed write buffer"
            );
            self.backend_pos += accepted as u64;
            if accepted < self.buffer_used {
                self.buffer.copy_within(accepted..self.buffer_used, 0);
            }
            self.buffer_used -= accepted;
        }
        Ok(())
    }

    fn release(&mut self) -> FsResult<()> {
        self.closed = true;
        debug!(handle = self.handle, position = self.backend_pos, "Closing output stream");
        self.conn
            .backend()?
            .close(self.handle)
            .map_err(|e| FsError::Backend {
                op: "close".into(),
                code: e.code(),
            })
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

impl Write for RgwOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            self.ensure_open()?;
            return Ok(0);
        }
        Ok(self.absorb(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        RgwOutputStream::flush(self).map_err(Into::into)
    }
}

impl std::fmt::Debug for RgwOutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgwOutputStream")
            .field("handle", &self.handle)
            .field("capacity", &self.buffer.len())
            .field("buffer_used", &self.buffer_used)
            .field("backend_pos", &self.backend_pos)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for RgwOutputStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            warn!(
                handle = self.handle,
                unflushed = self.buffer_used,
                error = %e,
                "Output stream close failed during drop"
            );
            if !self.closed {
                if let Err(e) = self.release() {
                    warn!(handle = self.handle, error = %e, "Handle release failed during drop");
                }
            }
        }
    }
}
