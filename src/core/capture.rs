//! Raw text captured from the management session during one run.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{MonitorError, Result};

/// Append-only, ordered sequence of raw reply lines.
///
/// The sampler is the only writer; the parser reads it once sampling is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureRecord {
    lines: Vec<String>,
}

impl CaptureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line. Embedded newlines would break line framing, so a
    /// multi-line string is split into several entries.
    pub fn append<S: Into<String>>(&mut self, line: S) {
        let line = line.into();
        if line.contains('\n') {
            self.lines
                .extend(line.split('\n').map(|l| l.trim_end_matches('\r').to_string()));
        } else {
            self.lines.push(line);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Write the record as plain text, one captured line per file line
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(fs::File::create(path)?);
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        log::info!(
            "Capture record saved to {} ({} lines)",
            path.display(),
            self.lines.len()
        );
        Ok(())
    }

    /// Load a record saved by [`CaptureRecord::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Decode raw capture bytes. Invalid UTF-8 means the file is not a capture.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| {
            let line = data[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
            MonitorError::malformed(line, "capture is not valid UTF-8 text")
        })?;

        Ok(Self::from_text(text))
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(|l| l.trim_end_matches('\r').to_string())
                .collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for CaptureRecord {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut record = CaptureRecord::new();
        for line in iter {
            record.append(line);
        }
        record
    }
}
