//! Bounded pipe readers for child stdout and stderr.

use std::{
    io::{self, Read},
    thread,
    time::{Duration, Instant},
};

const PIPE_CHUNK_SIZE: usize = 8192;
const READER_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(super) type ReaderHandle = thread::JoinHandle<io::Result<CapturedStream>>;

/// Which child output stream a capture belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Lower-case stream name.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Bytes captured from one stream, never more than the capture limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedStream {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedStream {
    /// Captured bytes in arrival order.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether bytes were discarded because the limit was reached.
    #[must_use]
    pub const fn truncated(&self) -> bool {
        self.truncated
    }

    /// Append as much of `chunk` as fits under `limit`, discarding the rest.
    fn record(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        let (kept, dropped) = chunk.split_at(room.min(chunk.len()));
        self.bytes.extend_from_slice(kept);
        if !dropped.is_empty() {
            self.truncated = true;
        }
    }
}

/// Read `reader` to the end, keeping at most `limit` bytes.
///
/// Surplus output is still read and discarded so the child never blocks on
/// a full pipe.
pub(super) fn read_pipe_capture<R>(mut reader: R, limit: usize) -> io::Result<CapturedStream>
where
    R: Read,
{
    let mut captured = CapturedStream::default();
    let mut chunk = [0_u8; PIPE_CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let data = chunk
            .get(..read)
            .ok_or_else(|| io::Error::other("reader returned out-of-range byte count"))?;
        captured.record(data, limit);
    }
    Ok(captured)
}

pub(super) fn spawn_pipe_reader<R>(pipe: Option<R>, limit: usize) -> Option<ReaderHandle>
where
    R: Read + Send + 'static,
{
    pipe.map(|reader| thread::spawn(move || read_pipe_capture(reader, limit)))
}

pub(super) fn join_reader(
    reader_handle: Option<ReaderHandle>,
    stream: OutputStream,
) -> io::Result<CapturedStream> {
    let Some(join_handle) = reader_handle else {
        return Ok(CapturedStream::default());
    };
    let captured = join_handle
        .join()
        .map_err(|_| io::Error::other(format!("{} reader panicked", stream.describe())))??;
    if captured.truncated() {
        tracing::debug!(
            stream = stream.describe(),
            kept = captured.bytes().len(),
            "capture limit reached; discarded surplus output"
        );
    }
    Ok(captured)
}

/// Wait until every reader has hit end of file, giving up at `deadline`.
///
/// A reader only finishes once every process holding the write end has
/// closed it, which includes descendants of the direct child.
pub(super) fn readers_finished_by(deadline: Instant, readers: &[Option<&ReaderHandle>]) -> bool {
    loop {
        if readers.iter().flatten().all(|handle| handle.is_finished()) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(READER_POLL_INTERVAL.min(deadline.saturating_duration_since(now)));
    }
}

/// Release readers without waiting for them.
///
/// Used once a child has been killed: a grandchild that inherited the pipe
/// may keep it open, and the reader threads finish on their own when the
/// last writer closes.
pub(super) fn detach_readers(stdout: Option<ReaderHandle>, stderr: Option<ReaderHandle>) {
    for (stream, handle) in [(OutputStream::Stdout, stdout), (OutputStream::Stderr, stderr)] {
        if let Some(reader) = handle
            && reader.is_finished()
            && let Ok(Err(err)) = reader.join()
        {
            tracing::debug!(stream = stream.describe(), %err, "pipe reader failed after timeout");
        }
    }
}
