// output.rs — Writable destinations for formatted artifacts
//
// Formatters never open files themselves; they write through `Output`.
// `StringOutput` is a cheap clonable handle onto a shared buffer, so a
// caller can give one clone to a solution (e.g. as its debug sink) and
// read the accumulated text through another.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Result, StencilError};

/// A destination for generated text.
pub trait Output {
    fn write_str(&mut self, text: &str) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<O: Output + ?Sized> Output for Box<O> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        (**self).write_str(text)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

// ── In-memory ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StringOutput {
    buf: Rc<RefCell<String>>,
}

impl StringOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, across all clones of this handle.
    pub fn get_string(&self) -> String {
        self.buf.borrow().clone()
    }

    pub fn discard(&self) {
        self.buf.borrow_mut().clear();
    }
}

impl Output for StringOutput {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.buf.borrow_mut().push_str(text);
        Ok(())
    }
}

// ── File ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FileOutput {
    filename: PathBuf,
    writer: BufWriter<File>,
}

impl FileOutput {
    /// Create (or truncate) the named file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let filename = path.as_ref().to_path_buf();
        let file = File::create(&filename).map_err(|source| StencilError::Io {
            path: filename.clone(),
            source,
        })?;
        Ok(FileOutput {
            filename,
            writer: BufWriter::new(file),
        })
    }

    pub fn get_filename(&self) -> &Path {
        &self.filename
    }

    fn io_err(&self, source: std::io::Error) -> StencilError {
        StencilError::Io {
            path: self.filename.clone(),
            source,
        }
    }
}

impl Output for FileOutput {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .map_err(|e| self.io_err(e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| self.io_err(e))
    }
}

// ── Standard output ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutOutput;

impl StdoutOutput {
    fn io_err(source: std::io::Error) -> StencilError {
        StencilError::Io {
            path: PathBuf::from("<stdout>"),
            source,
        }
    }
}

impl Output for StdoutOutput {
    fn write_str(&mut self, text: &str) -> Result<()> {
        std::io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .map_err(Self::io_err)
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().lock().flush().map_err(Self::io_err)
    }
}

// ── Discard ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl Output for NullOutput {
    fn write_str(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}
