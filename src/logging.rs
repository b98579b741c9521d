use std::io;
use std::sync::Arc;

use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

type SinkFn = dyn Fn(Level, &str) + Send + Sync;

/// Hands each formatted event, one line at a time, to a callback along with
/// the event's level.
///
/// The browser build routes these lines to `console.error`/`warn`/`info`/`debug`.
#[derive(Clone)]
pub struct LineSink {
    sink: Arc<SinkFn>,
}

impl LineSink {
    pub fn new(sink: impl Fn(Level, &str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }
}

/// Buffers one event and emits it on drop.
pub struct LineWriter {
    sink: Arc<SinkFn>,
    level: Level,
    buf: Vec<u8>,
}

impl io::Write for LineWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let line = text.trim_end();
        if !line.is_empty() {
            (self.sink)(self.level, line);
        }
    }
}

impl<'a> MakeWriter<'a> for LineSink {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> LineWriter {
        LineWriter {
            sink: Arc::clone(&self.sink),
            level: Level::INFO,
            buf: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> LineWriter {
        LineWriter {
            sink: Arc::clone(&self.sink),
            level: *meta.level(),
            buf: Vec::new(),
        }
    }
}

/// A plain-text `fmt` subscriber writing to `sink`.
///
/// No timestamps: the wasm32 target has no system clock.
pub fn subscriber(sink: LineSink, max_level: Level) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_writer(sink)
        .with_max_level(max_level)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish()
}
