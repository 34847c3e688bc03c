//! Immutable text snapshot history.
//!
//! Every open document owns one [`EditableBuffer`]. Each text replacement produces a new
//! immutable [`Snapshot`] (content + monotonically increasing stamp) and appends one
//! [`Edit`] record to an append-only log. For any ordered pair of snapshots of the same
//! buffer, [`EditableBuffer::edits_between`] yields exactly the edits that transform the
//! older content into the newer one, as a lazy [`EditReplay`] iterator - consumers that
//! only care about a prefix of the chain can stop early without paying for the rest.
//!
//! Snapshots are reference counted; an in-flight analysis or adjustment keeps its snapshot
//! alive however many edits have superseded it. Stamps are dense per buffer: the edit at
//! log index `i` transforms stamp `i` into stamp `i + 1`, which makes ancestry checks a
//! plain stamp comparison.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use ropey::Rope;

use crate::error::{Error, Result};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A single text replacement: remove `removed_len` bytes at `offset`, insert `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Byte offset of the replacement in the pre-edit snapshot.
    pub offset: usize,
    /// Number of removed bytes.
    pub removed_len: usize,
    /// Inserted text (may be empty).
    pub text: String,
}

impl Edit {
    /// Byte length of the inserted text.
    pub fn inserted_len(&self) -> usize {
        self.text.len()
    }

    /// Exclusive end of the removed span in the pre-edit snapshot.
    pub fn removed_end(&self) -> usize {
        self.offset + self.removed_len
    }

    /// Signed size change of the document.
    pub fn delta(&self) -> isize {
        self.inserted_len() as isize - self.removed_len as isize
    }
}

/// An immutable, versioned view of the buffer content.
///
/// Two snapshots of the same buffer with equal stamps have identical content. All offsets
/// on the snapshot API are byte offsets; lines and columns are 1-based.
#[derive(Debug)]
pub struct Snapshot {
    buffer_id: u64,
    stamp: u64,
    rope: Rope,
}

impl Snapshot {
    fn new(buffer_id: u64, stamp: u64, rope: Rope) -> Self {
        Self {
            buffer_id,
            stamp,
            rope,
        }
    }

    /// The version stamp. Strictly increasing per buffer.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Identifier of the buffer this snapshot belongs to.
    pub fn buffer_id(&self) -> u64 {
        self.buffer_id
    }

    /// Total length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    /// Number of lines (a trailing newline starts a final empty line, like the rope).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Full content as an owned string.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Content of the byte range as an owned string.
    pub fn text_slice(&self, start: usize, end: usize) -> String {
        self.rope.byte_slice(start..end).to_string()
    }

    /// 1-based line containing `offset`. `offset` may equal the buffer length.
    pub fn line_of_byte(&self, offset: usize) -> usize {
        self.rope.byte_to_line(offset.min(self.rope.len_bytes())) + 1
    }

    /// Byte offset of the start of the 1-based `line`. Lines past the end clamp to the
    /// buffer length.
    pub fn byte_of_line(&self, line: usize) -> usize {
        let idx = line.saturating_sub(1);
        if idx >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        self.rope.line_to_byte(idx)
    }

    /// 1-based `(line, column)` of a byte offset; the column counts bytes from the line
    /// start, starting at 1.
    pub fn line_and_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.rope.len_bytes());
        let line = self.line_of_byte(offset);
        let line_start = self.byte_of_line(line);
        (line, offset - line_start + 1)
    }

    /// Content of the 1-based `line`, without its trailing newline.
    pub fn line_text(&self, line: usize) -> String {
        let idx = line.saturating_sub(1);
        if idx >= self.rope.len_lines() {
            return String::new();
        }
        let slice = self.rope.line(idx);
        let mut s = slice.to_string();
        while s.ends_with('\n') || s.ends_with('\r') {
            s.pop();
        }
        s
    }

    /// Returns `true` if `self` precedes `other` or is the same version of the same
    /// buffer. This is the ancestry predicate used by the adjuster.
    pub fn precedes_or_same(&self, other: &Snapshot) -> bool {
        self.buffer_id == other.buffer_id && self.stamp <= other.stamp
    }
}

/// Append-only log of the edits applied to one buffer.
#[derive(Debug, Default)]
struct EditLog {
    entries: RwLock<Vec<Arc<Edit>>>,
}

/// A lazy, restartable walk over the edit chain between two snapshots.
///
/// Yields the edits in application order. No lock is held between steps, so the consumer
/// can suspend or drop the replay at any point; [`EditReplay::restart`] rewinds to the
/// first edit.
pub struct EditReplay {
    log: Arc<EditLog>,
    start: u64,
    next: u64,
    end: u64,
}

impl EditReplay {
    /// Number of edits in the full replay.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Returns `true` if the replay covers no edits (identical snapshots).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Rewind to the first edit.
    pub fn restart(&mut self) {
        self.next = self.start;
    }
}

impl Iterator for EditReplay {
    type Item = Arc<Edit>;

    fn next(&mut self) -> Option<Arc<Edit>> {
        if self.next >= self.end {
            return None;
        }
        let entry = self.log.entries.read()[self.next as usize].clone();
        self.next += 1;
        Some(entry)
    }
}

/// The mutable head of a snapshot history.
pub struct EditableBuffer {
    id: u64,
    log: Arc<EditLog>,
    current: Mutex<Arc<Snapshot>>,
}

impl EditableBuffer {
    /// Open a buffer with initial content. The initial snapshot has stamp 0.
    pub fn open(text: &str) -> Self {
        let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);
        let snapshot = Arc::new(Snapshot::new(id, 0, Rope::from_str(text)));
        Self {
            id,
            log: Arc::new(EditLog::default()),
            current: Mutex::new(snapshot),
        }
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.lock().clone()
    }

    /// Replace `removed_len` bytes at `offset` with `text`, producing the next snapshot.
    ///
    /// Fails with [`Error::InvalidRange`] when the range reaches past the end of the
    /// buffer or does not fall on character boundaries; the buffer is unchanged in that
    /// case.
    pub fn replace(&self, offset: usize, removed_len: usize, text: &str) -> Result<Arc<Snapshot>> {
        let mut current = self.current.lock();
        let rope = &current.rope;
        let buffer_len = rope.len_bytes();
        let end = offset.checked_add(removed_len).unwrap_or(usize::MAX);
        let invalid = Error::InvalidRange {
            offset,
            length: removed_len,
            buffer_len,
        };
        if end > buffer_len {
            return Err(invalid);
        }
        let start_char = rope.try_byte_to_char(offset).map_err(|_| invalid.clone())?;
        let end_char = rope.try_byte_to_char(end).map_err(|_| invalid.clone())?;
        // Reject offsets inside a multi-byte character.
        if rope.char_to_byte(start_char) != offset || rope.char_to_byte(end_char) != end {
            return Err(invalid);
        }

        let mut next_rope = rope.clone();
        next_rope.remove(start_char..end_char);
        next_rope.insert(start_char, text);

        let next = Arc::new(Snapshot::new(self.id, current.stamp + 1, next_rope));
        self.log.entries.write().push(Arc::new(Edit {
            offset,
            removed_len,
            text: text.to_string(),
        }));
        *current = next.clone();
        Ok(next)
    }

    /// Edits from `old` to the current snapshot, or `None` when `old` is not an ancestor
    /// (it belongs to another buffer, or a newer snapshot was observed before an older
    /// consumer finished).
    pub fn edits_since(&self, old: &Snapshot) -> Option<EditReplay> {
        let current = self.snapshot();
        self.edits_between(old, &current)
    }

    /// Edits from `old` to `new`, or `None` when `old` does not precede `new` in this
    /// buffer's history.
    pub fn edits_between(&self, old: &Snapshot, new: &Snapshot) -> Option<EditReplay> {
        if old.buffer_id != self.id || new.buffer_id != self.id {
            return None;
        }
        if !old.precedes_or_same(new) {
            return None;
        }
        Some(EditReplay {
            log: self.log.clone(),
            start: old.stamp,
            next: old.stamp,
            end: new.stamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_replace_produce_increasing_stamps() {
        let buffer = EditableBuffer::open("let x = 1\n");
        assert_eq!(buffer.snapshot().stamp(), 0);

        let s1 = buffer.replace(8, 1, "42").unwrap();
        assert_eq!(s1.stamp(), 1);
        assert_eq!(s1.text(), "let x = 42\n");

        let s2 = buffer.replace(4, 1, "y").unwrap();
        assert_eq!(s2.stamp(), 2);
        assert_eq!(s2.text(), "let y = 42\n");

        // The older snapshot stays valid after the buffer moved on.
        assert_eq!(s1.text(), "let x = 42\n");
    }

    #[test]
    fn test_replace_rejects_out_of_bounds() {
        let buffer = EditableBuffer::open("abc");
        let err = buffer.replace(2, 5, "x").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidRange {
                offset: 2,
                length: 5,
                buffer_len: 3
            }
        );
        // Unchanged after the failed request.
        assert_eq!(buffer.snapshot().text(), "abc");
        assert_eq!(buffer.snapshot().stamp(), 0);
    }

    #[test]
    fn test_replace_rejects_split_multibyte_char() {
        let buffer = EditableBuffer::open("aé b");
        // 'é' occupies bytes 1..3; offset 2 is inside it.
        assert!(buffer.replace(2, 1, "x").is_err());
    }

    #[test]
    fn test_edits_between_yields_chain_in_order() {
        let buffer = EditableBuffer::open("abc");
        let s0 = buffer.snapshot();
        buffer.replace(0, 0, "x").unwrap();
        let s2 = buffer.replace(1, 1, "yz").unwrap();

        let replay = buffer.edits_between(&s0, &s2).unwrap();
        let edits: Vec<_> = replay.collect();
        assert_eq!(edits.len(), 2);
        assert_eq!((edits[0].offset, edits[0].removed_len), (0, 0));
        assert_eq!(edits[0].text, "x");
        assert_eq!((edits[1].offset, edits[1].removed_len), (1, 1));
        assert_eq!(edits[1].text, "yz");
    }

    #[test]
    fn test_edits_since_supports_early_stop_and_restart() {
        let buffer = EditableBuffer::open("");
        let s0 = buffer.snapshot();
        for i in 0..5 {
            buffer.replace(i, 0, "a").unwrap();
        }

        let mut replay = buffer.edits_since(&s0).unwrap();
        assert_eq!(replay.len(), 5);
        // Early termination: take only two edits.
        assert!(replay.next().is_some());
        assert!(replay.next().is_some());
        replay.restart();
        assert_eq!(replay.count(), 5);
    }

    #[test]
    fn test_non_ancestor_is_rejected() {
        let buffer = EditableBuffer::open("abc");
        buffer.replace(0, 0, "x").unwrap();
        let newer = buffer.snapshot();
        let other = EditableBuffer::open("abc");

        // Snapshot from a different buffer.
        assert!(buffer.edits_since(&other.snapshot()).is_none());
        // Newer snapshot is not an ancestor of an older one.
        let older = buffer
            .edits_between(&newer, &buffer.snapshot())
            .map(|r| r.len());
        assert_eq!(older, Some(0));
        buffer.replace(0, 0, "y").unwrap();
        assert!(buffer.edits_between(&buffer.snapshot(), &newer).is_none());
    }

    #[test]
    fn test_line_and_column_queries() {
        let buffer = EditableBuffer::open("fn main() {\n    body\n}\n");
        let snap = buffer.snapshot();
        assert_eq!(snap.line_count(), 4);
        assert_eq!(snap.line_of_byte(0), 1);
        assert_eq!(snap.byte_of_line(2), 12);
        assert_eq!(snap.line_and_column(16), (2, 5));
        assert_eq!(snap.line_text(2), "    body");
        assert_eq!(snap.text_slice(3, 7), "main");
    }
}
