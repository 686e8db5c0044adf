//! Line-buffered reading of child process pipes.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Splits a pipe into lines, buffering partial reads until a newline arrives.
///
/// A marker split across two reads is therefore always seen whole. Invalid
/// UTF-8 is replaced rather than rejected, and a trailing `\r` is stripped.
///
/// `next_line` is cancel safe: bytes read before the future is dropped stay in
/// the internal buffer and are returned by the next call.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wraps a pipe.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Returns the next complete line, or the unterminated tail at EOF.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
