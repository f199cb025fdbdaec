use njord_core::ids::Symbol;
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Append-only writer over line-delimited JSON.
///
/// Each [`append`](Journal::append) writes exactly one complete `\n`-terminated
/// line and hands it to the OS before returning; there is no in-memory batching
/// across calls. Rotation, compression and retention are external concerns.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (creating if absent) the journal at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `record` and append it as one line.
    pub fn append<T>(&mut self, record: &T) -> Result<(), JournalError>
    where
        T: Serialize,
    {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        // The file is unbuffered, so write_all hands the full line to the OS.
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Names and opens the per-stream journal files of one service directory.
///
/// Stream files follow the `{stream}.ndjson` scheme; symbol-scoped streams embed
/// the symbol with `/` mapped to `-` so `BASE/QUOTE` tokens stay filesystem-safe
/// (`fills.ATOM-USDT.ndjson`). Bus payloads keep the verbatim symbol form.
#[derive(Debug, Clone)]
pub struct JournalDir {
    dir: PathBuf,
}

impl JournalDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_stream(&self, stream: &str) -> Result<Journal, JournalError> {
        Journal::open(self.dir.join(format!("{stream}.ndjson")))
    }

    pub fn open_symbol_stream(&self, stream: &str, symbol: &Symbol) -> Result<Journal, JournalError> {
        let token = symbol.as_str().replace('/', "-");
        self.open_stream(&format!("{stream}.{token}"))
    }
}
