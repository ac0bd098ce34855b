//! Output sinks shared by the session, the read loop and helpers.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Cloneable handle on standard output and standard error
#[derive(Clone)]
pub struct Console {
    out: Sink,
    err: Sink,
}

impl std::fmt::Debug for Console {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl Console {
    pub fn new(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
    ) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
            err: Arc::new(Mutex::new(Box::new(err))),
        }
    }

    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }

    /// Console writing into memory, readable through the returned [`Capture`]
    pub fn capture() -> (Self, Capture) {
        let capture = Capture::default();
        let console = Self::new(
            SharedBuffer(capture.out.clone()),
            SharedBuffer(capture.err.clone()),
        );
        (console, capture)
    }

    /// Write `text` to stdout without a line break
    pub fn print(
        &self,
        text: &str,
    ) {
        let mut out = self.out.lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn println(
        &self,
        line: &str,
    ) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    pub fn eprintln(
        &self,
        line: &str,
    ) {
        let mut err = self.err.lock();
        let _ = writeln!(err, "{line}");
        let _ = err.flush();
    }
}

/// Text written to a captured [`Console`]
#[derive(Debug, Clone, Default)]
pub struct Capture {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.out.lock()).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.err.lock()).into_owned()
    }

    /// Forget everything captured so far
    pub fn clear(&self) {
        self.out.lock().clear();
        self.err.lock().clear();
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
