//! Streaming mbox reader.
//!
//! Splits an mbox stream into raw messages line by line, never holding more
//! than one message in memory. Tolerant of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ArchiveError, Result};

/// Read buffer for file-backed readers.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Messages larger than this are truncated.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// One message as it appears in the mbox, `From ` line included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Byte offset of the `From ` line.
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// Iterator over the messages of an mbox stream.
///
/// Tolerates:
///
/// - mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logged)
/// - a truncated last message
/// - a UTF-8 BOM at the start of the stream
pub struct MboxReader<R> {
    reader: R,
    label: PathBuf,
    offset: u64,
    pending: Option<RawMessage>,
    prev_line_was_blank: bool,
    line: Vec<u8>,
    done: bool,
}

impl MboxReader<BufReader<File>> {
    /// Open an mbox file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArchiveError::FileNotFound(path.to_path_buf())
            } else {
                ArchiveError::io(path, e)
            }
        })?;
        let mut reader = Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file));
        reader.label = path.to_path_buf();
        Ok(reader)
    }
}

impl<R: BufRead> MboxReader<R> {
    /// Wrap any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            label: PathBuf::from("<stream>"),
            offset: 0,
            pending: None,
            prev_line_was_blank: true,
            line: Vec::with_capacity(4096),
            done: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_line(&mut self) -> Result<usize> {
        self.line.clear();
        self.reader
            .read_until(b'\n', &mut self.line)
            .map_err(|e| ArchiveError::io(&self.label, e))
    }
}

impl<R: BufRead> Iterator for MboxReader<R> {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let len = match self.read_line() {
                Ok(len) => len,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if len == 0 {
                self.done = true;
                return self.pending.take().map(Ok);
            }

            let line_offset = self.offset;
            self.offset += len as u64;

            let mut finished = None;
            if is_mbox_separator(&self.line) {
                if !self.prev_line_was_blank {
                    warn!(offset = line_offset, "'From ' separator without preceding blank line");
                }
                finished = self.pending.replace(RawMessage {
                    offset: line_offset,
                    bytes: self.line.clone(),
                });
            } else {
                match self.pending.as_mut() {
                    Some(message) if message.bytes.len() + len <= MAX_MESSAGE_SIZE => {
                        message.bytes.extend_from_slice(&self.line);
                    }
                    Some(message) => {
                        if message.bytes.len() < MAX_MESSAGE_SIZE {
                            warn!(offset = message.offset, "Message exceeds maximum size, truncating");
                            message.bytes.resize(MAX_MESSAGE_SIZE, b'\n');
                        }
                    }
                    None if !is_blank_line(&self.line) => {
                        // Content before the first separator: treat it as a message.
                        warn!(offset = line_offset, "Data before first 'From ' separator");
                        self.pending = Some(RawMessage {
                            offset: line_offset,
                            bytes: self.line.clone(),
                        });
                    }
                    None => {}
                }
            }

            self.prev_line_was_blank = is_blank_line(&self.line);

            if let Some(message) = finished {
                return Some(Ok(message));
            }
        }
    }
}

/// A line starting with `From ` (after an optional BOM).
fn is_mbox_separator(line: &[u8]) -> bool {
    line.strip_prefix(&[0xEF, 0xBB, 0xBF])
        .unwrap_or(line)
        .starts_with(b"From ")
}

fn is_blank_line(line: &[u8]) -> bool {
    line.iter().all(|&b| matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(data: &[u8]) -> Vec<RawMessage> {
        MboxReader::new(data).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(b"From user@example.com Thu Jan 01 00:00:00 2024\n"));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));

        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&bom));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_splits_messages_with_offsets() {
        let data = b"From a@x Thu Jan  4 10:00:00 2024\nSubject: one\n\nbody one\n\n\
From b@x Thu Jan  4 11:00:00 2024\nSubject: two\n\nbody two\n";
        let messages = read_all(data);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].offset, 0);
        assert!(messages[0].bytes.ends_with(b"body one\n\n"));
        let second = &data[messages[1].offset as usize..];
        assert!(second.starts_with(b"From b@x"));
        assert_eq!(messages[1].bytes, second);
    }

    #[test]
    fn test_offset_through_mutable_borrow() {
        let data = b"From a@x Thu Jan  4 10:00:00 2024\nSubject: one\n\nbody one\n";
        let mut reader = MboxReader::new(&data[..]);
        let borrowed = &mut reader;
        assert_eq!(borrowed.offset(), 0);
        while borrowed.next().is_some() {}
        assert_eq!(borrowed.offset(), data.len() as u64);
    }

    #[test]
    fn test_separator_without_blank_line() {
        let data = b"From a@x Mon Jan  1 00:00:00 2024\nSubject: one\n\nbody\n\
From b@x Mon Jan  1 00:00:00 2024\nSubject: two\n\nbody\n";
        assert_eq!(read_all(data).len(), 2);
    }

    #[test]
    fn test_crlf_and_empty_input() {
        let data = b"From a@x Mon Jan  1 00:00:00 2024\r\nSubject: one\r\n\r\nbody\r\n";
        let messages = read_all(data);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].bytes.ends_with(b"body\r\n"));
        assert!(read_all(b"").is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let err = MboxReader::open("/nonexistent/archive.mbox").err().unwrap();
        assert!(matches!(err, ArchiveError::FileNotFound(_)));
    }
}
