use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

/// Operator-facing output (prompt text, confirmations, listings).
///
/// Cloned into every task that reports back to the operator. Diagnostic
/// logging goes through `tracing` instead.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer(w: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(w))),
        }
    }

    /// In-memory console; the returned buffer accumulates everything printed.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (Self::from_writer(buf.clone()), buf)
    }

    pub fn line(&self, msg: impl AsRef<str>) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        // Nothing sensible to do if the terminal is gone.
        let _ = writeln!(sink, "{}", msg.as_ref());
        let _ = sink.flush();
    }
}

#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
