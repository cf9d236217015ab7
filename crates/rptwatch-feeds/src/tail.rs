//! Byte-offset file follower.
//!
//! [`FileTail`] remembers how far into a file it has read. Each
//! [`read_appended`](FileTail::read_appended) call reads from that offset to
//! the current end of file and returns the complete lines found. A trailing
//! fragment without a newline stays buffered until the rest of the line
//! arrives, so a line is never emitted in two halves.
//!
//! Replaying a file and tailing it are the same operation: a tail created
//! with [`FileTail::from_start`] returns the whole file on its first read and
//! then keeps following it, with no window between the two.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
}

impl FileTail {
    /// Follow `path` from its first byte.
    pub fn from_start(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pending: Vec::new(),
        }
    }

    /// Follow `path` from its current end, skipping existing content.
    pub async fn at_end(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let offset = tokio::fs::metadata(&path).await?.len();
        Ok(Self {
            path,
            offset,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far, including any buffered partial line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read everything appended since the last call and return the complete
    /// lines, trimmed of trailing whitespace. Blank lines are dropped.
    ///
    /// If the file shrank below the saved offset it was truncated in place;
    /// reading restarts from the beginning.
    pub async fn read_appended(&mut self) -> std::io::Result<Vec<String>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        if len < self.offset {
            tracing::debug!(path = %self.path.display(), len, offset = self.offset, "file truncated, rereading");
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        self.consume(&mut file).await
    }

    /// Read `reader` to its end and fold the bytes into the buffered line.
    /// On error neither the offset nor the buffered fragment changes, so the
    /// next call reads the same bytes again.
    async fn consume<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> std::io::Result<Vec<String>> {
        let mut chunk = Vec::new();
        let read = reader.read_to_end(&mut chunk).await?;
        self.offset += read as u64;

        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(&chunk);
        let complete = match buf.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                self.pending = buf.split_off(last_newline + 1);
                buf
            }
            None => {
                self.pending = buf;
                return Ok(Vec::new());
            }
        };

        Ok(split_lines(&complete))
    }

    /// Flush a buffered partial line. Called when the file is abandoned and
    /// its last line will never be terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        split_lines(&rest).pop()
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim_end().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// A reader that fails every read.
    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("device went away")))
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn from_start_reads_whole_file_then_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "one\ntwo\n");

        let mut tail = FileTail::from_start(&path);
        assert_eq!(tail.read_appended().await.unwrap(), ["one", "two"]);
        assert!(tail.read_appended().await.unwrap().is_empty());

        append(&path, "three\n");
        assert_eq!(tail.read_appended().await.unwrap(), ["three"]);
    }

    #[tokio::test]
    async fn at_end_skips_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "old\n");

        let mut tail = FileTail::at_end(&path).await.unwrap();
        append(&path, "new\n");
        assert_eq!(tail.read_appended().await.unwrap(), ["new"]);
    }

    #[tokio::test]
    async fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "first\nsec");

        let mut tail = FileTail::from_start(&path);
        assert_eq!(tail.read_appended().await.unwrap(), ["first"]);
        append(&path, "ond\r\n");
        assert_eq!(tail.read_appended().await.unwrap(), ["second"]);
    }

    #[tokio::test]
    async fn failed_read_keeps_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "first\nDMR Slot 1, au");

        let mut tail = FileTail::from_start(&path);
        assert_eq!(tail.read_appended().await.unwrap(), ["first"]);
        let offset = tail.offset();

        assert!(tail.consume(&mut BrokenReader).await.is_err());
        assert_eq!(tail.offset(), offset);

        append(&path, "dio sequence no. 3\n");
        assert_eq!(
            tail.read_appended().await.unwrap(),
            ["DMR Slot 1, audio sequence no. 3"]
        );
    }

    #[tokio::test]
    async fn finish_flushes_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "first\nunterminated");

        let mut tail = FileTail::from_start(&path);
        tail.read_appended().await.unwrap();
        assert_eq!(tail.finish().as_deref(), Some("unterminated"));
        assert_eq!(tail.finish(), None);
    }

    #[tokio::test]
    async fn truncation_restarts_from_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "a long first line\n");

        let mut tail = FileTail::from_start(&path);
        tail.read_appended().await.unwrap();
        std::fs::write(&path, "x\n").unwrap();
        assert_eq!(tail.read_appended().await.unwrap(), ["x"]);
    }

    #[tokio::test]
    async fn blank_lines_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "a\n\n   \nb\n");

        let mut tail = FileTail::from_start(&path);
        assert_eq!(tail.read_appended().await.unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let mut tail = FileTail::from_start("/nonexistent/a.log");
        assert!(tail.read_appended().await.is_err());
    }
}
