//! File objects returned by `open`, usable as context managers.

use std::{
    fs,
    io::Write,
};

use crate::{
    exception::{ExcType, RunError, RunResult},
    value::Value,
};

/// Supported open modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

impl FileMode {
    pub fn parse(mode: &str) -> RunResult<Self> {
        match mode {
            "r" | "rt" | "tr" => Ok(Self::Read),
            "w" | "wt" | "tw" => Ok(Self::Write),
            "a" | "at" | "ta" => Ok(Self::Append),
            other => Err(ExcType::value_error(format!("invalid mode: '{other}'"))),
        }
    }
}

/// An open file. Reads are buffered whole at `open` time; writes stream
/// through the underlying handle and the handle is released on `close` (or by
/// `with`'s `__exit__` on any exit path).
#[derive(Debug)]
pub struct FileObject {
    pub path: String,
    pub mode: FileMode,
    closed: bool,
    /// Remaining unread content (read mode).
    content: String,
    cursor: usize,
    /// Write handle (write/append modes).
    handle: Option<fs::File>,
}

impl FileObject {
    pub fn open(path: &str, mode: FileMode) -> RunResult<Self> {
        match mode {
            FileMode::Read => {
                let content = fs::read_to_string(path).map_err(|_| {
                    RunError::new(
                        ExcType::FileNotFoundError,
                        format!("[Errno 2] No such file or directory: '{path}'"),
                    )
                })?;
                Ok(Self {
                    path: path.to_owned(),
                    mode,
                    closed: false,
                    content,
                    cursor: 0,
                    handle: None,
                })
            }
            FileMode::Write | FileMode::Append => {
                let handle = if mode == FileMode::Write {
                    fs::File::create(path)
                } else {
                    fs::OpenOptions::new().create(true).append(true).open(path)
                }
                .map_err(|e| RunError::new(ExcType::OSError, format!("cannot open '{path}': {e}")))?;
                Ok(Self {
                    path: path.to_owned(),
                    mode,
                    closed: false,
                    content: String::new(),
                    cursor: 0,
                    handle: Some(handle),
                })
            }
        }
    }

    fn check_open(&self) -> RunResult<()> {
        if self.closed {
            return Err(ExcType::value_error("I/O operation on closed file"));
        }
        Ok(())
    }

    /// `read()`: the rest of the file from the cursor.
    pub fn read(&mut self) -> RunResult<String> {
        self.check_open()?;
        let out = self.content[self.cursor..].to_owned();
        self.cursor = self.content.len();
        Ok(out)
    }

    /// `readline()`: next line including its newline; empty string at EOF.
    pub fn readline(&mut self) -> RunResult<String> {
        self.check_open()?;
        let rest = &self.content[self.cursor..];
        match rest.find('\n') {
            Some(pos) => {
                let line = rest[..=pos].to_owned();
                self.cursor += pos + 1;
                Ok(line)
            }
            None => {
                let line = rest.to_owned();
                self.cursor = self.content.len();
                Ok(line)
            }
        }
    }

    /// `readlines()`: remaining lines, newlines retained.
    pub fn readlines(&mut self) -> RunResult<Vec<Value>> {
        self.check_open()?;
        let mut out = Vec::new();
        loop {
            let line = self.readline()?;
            if line.is_empty() {
                break;
            }
            out.push(Value::str(line));
        }
        Ok(out)
    }

    /// `write(s)`: returns the number of characters written.
    pub fn write(&mut self, text: &str) -> RunResult<usize> {
        self.check_open()?;
        let Some(handle) = self.handle.as_mut() else {
            return Err(RunError::new(
                ExcType::OSError,
                "not writable".to_owned(),
            ));
        };
        handle
            .write_all(text.as_bytes())
            .map_err(|e| RunError::new(ExcType::OSError, format!("write failed: {e}")))?;
        Ok(text.chars().count())
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.handle = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        let mode = match self.mode {
            FileMode::Read => "r",
            FileMode::Write => "w",
            FileMode::Append => "a",
        };
        format!("<file '{}' mode '{mode}'>", self.path)
    }
}
