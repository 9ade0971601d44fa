// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution context configuration

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tidepool_engine::DEFAULT_STACK_BUDGET;

/// Configuration for an [`crate::Context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Root search origin and the value of `process.cwd()`
    pub basedir: PathBuf,
    /// Environment snapshot exposed as `process.env`
    pub env: BTreeMap<String, String>,
    /// Value of `process.title`
    pub title: String,
    /// Destination of `process.stdout.write`
    pub stdout: Output,
    /// Destination of `process.stderr.write`
    pub stderr: Output,
    /// Directory whose `*.js` files replace the bundled builtins
    pub builtin_dir: Option<PathBuf>,
    /// Executable location used to derive the `lib/node` search path
    pub exec_path: Option<PathBuf>,
    /// Bytes of native stack that parsing, evaluation and nested `require`
    /// may use before failing with a `RangeError`. Must be below the stack
    /// size of the thread the context runs on.
    pub stack_budget: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            basedir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env: std::env::vars().collect(),
            title: std::env::args()
                .next()
                .unwrap_or_else(|| "tidepool".to_string()),
            stdout: Output::stdout(),
            stderr: Output::stderr(),
            builtin_dir: None,
            exec_path: std::env::current_exe().ok(),
            stack_budget: DEFAULT_STACK_BUDGET,
        }
    }
}

impl ContextOptions {
    /// Default options rooted at `basedir`.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            ..Self::default()
        }
    }
}

enum Sink {
    Stdout,
    Stderr,
    Buffer(Vec<u8>),
    Writer(Box<dyn Write>),
}

/// A shared output stream.
///
/// Clones write to the same destination, so a clone kept by the embedder
/// can read back whatever scripts wrote into a [`Output::buffer`].
#[derive(Clone)]
pub struct Output(Rc<RefCell<Sink>>);

impl Output {
    /// The process standard output.
    pub fn stdout() -> Self {
        Self(Rc::new(RefCell::new(Sink::Stdout)))
    }

    /// The process standard error.
    pub fn stderr() -> Self {
        Self(Rc::new(RefCell::new(Sink::Stderr)))
    }

    /// An in-memory buffer.
    pub fn buffer() -> Self {
        Self(Rc::new(RefCell::new(Sink::Buffer(Vec::new()))))
    }

    /// Any other writer.
    pub fn from_writer(writer: impl Write + 'static) -> Self {
        Self(Rc::new(RefCell::new(Sink::Writer(Box::new(writer)))))
    }

    /// Writes a whole chunk and flushes it.
    pub fn write(&self, chunk: &[u8]) -> io::Result<()> {
        match &mut *self.0.borrow_mut() {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(chunk)?;
                out.flush()
            }
            Sink::Stderr => io::stderr().lock().write_all(chunk),
            Sink::Buffer(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            Sink::Writer(writer) => {
                writer.write_all(chunk)?;
                writer.flush()
            }
        }
    }

    /// Everything written so far, for buffers. Other sinks return an empty
    /// string.
    pub fn contents(&self) -> String {
        match &*self.0.borrow() {
            Sink::Buffer(buf) => String::from_utf8_lossy(buf).into_owned(),
            _ => String::new(),
        }
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.0.borrow() {
            Sink::Stdout => "stdout",
            Sink::Stderr => "stderr",
            Sink::Buffer(_) => "buffer",
            Sink::Writer(_) => "writer",
        };
        write!(f, "Output({})", kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_clones_share_contents() {
        let out = Output::buffer();
        let handle = out.clone();
        out.write(b"hello ").unwrap();
        out.write(b"world").unwrap();
        assert_eq!(handle.contents(), "hello world");
    }

    #[test]
    fn test_new_keeps_basedir() {
        let options = ContextOptions::new("/srv/app");
        assert_eq!(options.basedir, PathBuf::from("/srv/app"));
        assert!(options.builtin_dir.is_none());
    }
}
