// SPDX-License-Identifier: MPL-2.0

//! Fixed-capacity circular buffer of tagged input words.
//!
//! Grounded on the fixed-capacity, head/tail/count ring shape used across
//! the pack (e.g. `r3bl` `RingBuffer<T, N>`), adapted to runtime capacity
//! and to expose the random access reprint/erase need by logical offset.

use bitflags::bitflags;

bitflags! {
    pub struct WordFlags: u8 {
        /// Ends a deliverable unit: a newline in canonical mode, or any byte in raw mode.
        const EOT = 0b001;
        /// Marker word, consumed but never delivered to the user.
        const EOF = 0b010;
        /// Literal-next protection: suppress interpretation on re-entry.
        const ESC = 0b100;
    }
}

impl Default for WordFlags {
    fn default() -> Self {
        WordFlags::empty()
    }
}

/// One received byte plus its per-byte tag bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputWord {
    pub ch: u8,
    pub flags: WordFlags,
    /// Width of the echoed representation, 0..=7. Meaningful only for
    /// canonical non-EOT entries that may need visual erasure.
    pub len: u8,
}

impl InputWord {
    pub fn new(ch: u8) -> Self {
        InputWord { ch, flags: WordFlags::empty(), len: 0 }
    }

    pub fn is_eot(&self) -> bool {
        self.flags.contains(WordFlags::EOT)
    }

    pub fn is_eof(&self) -> bool {
        self.flags.contains(WordFlags::EOF)
    }

    pub fn is_esc(&self) -> bool {
        self.flags.contains(WordFlags::ESC)
    }
}

/// Circular buffer of tagged input words with a running count of
/// EOT-tagged words (`eotct`), used for canonical-delivery readiness.
pub struct InputRing {
    slots: Vec<Option<InputWord>>,
    capacity: usize,
    head: usize,
    count: usize,
    eotct: usize,
}

impl InputRing {
    pub fn new(capacity: usize) -> Self {
        InputRing {
            slots: vec![None; capacity],
            capacity,
            head: 0,
            count: 0,
            eotct: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    pub fn eotct(&self) -> usize {
        self.eotct
    }

    /// Appends a word at the tail. Returns `false` (word rejected) if the
    /// ring is already full; the caller decides drop-vs-stop.
    pub fn push_back(&mut self, word: InputWord) -> bool {
        if self.is_full() {
            return false;
        }
        let idx = (self.head + self.count) % self.capacity;
        if word.is_eot() {
            self.eotct += 1;
        }
        self.slots[idx] = Some(word);
        self.count += 1;
        true
    }

    pub fn peek_front(&self) -> Option<InputWord> {
        if self.count == 0 {
            None
        } else {
            self.slots[self.head]
        }
    }

    pub fn pop_front(&mut self) -> Option<InputWord> {
        if self.count == 0 {
            return None;
        }
        let word = self.slots[self.head].take();
        if let Some(w) = word {
            if w.is_eot() {
                self.eotct -= 1;
            }
        }
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        word
    }

    /// Removes and returns the most recently pushed word, used by
    /// `back_over`. Never pops an EOT word (line breaks are never erased);
    /// returns `None` in that case or when the ring is empty.
    pub fn pop_newest(&mut self) -> Option<InputWord> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.head + self.count - 1) % self.capacity;
        let word = self.slots[idx]?;
        if word.is_eot() {
            return None;
        }
        self.slots[idx] = None;
        self.count -= 1;
        Some(word)
    }

    /// Logical offset (0 = oldest) of the most recent EOT word, i.e. the
    /// start of the "committed" region. `None` if no EOT is present.
    fn last_eot_offset(&self) -> Option<usize> {
        for offset in (0..self.count).rev() {
            let idx = (self.head + offset) % self.capacity;
            if self.slots[idx].map(|w| w.is_eot()).unwrap_or(false) {
                return Some(offset);
            }
        }
        None
    }

    /// Logical offsets of the words typed since the last EOT (the
    /// not-yet-terminated current line), oldest first.
    pub fn offsets_since_last_eot(&self) -> Vec<usize> {
        let start = self.last_eot_offset().map(|o| o + 1).unwrap_or(0);
        (start..self.count).collect()
    }

    pub fn word_at(&self, offset: usize) -> Option<InputWord> {
        if offset >= self.count {
            return None;
        }
        self.slots[(self.head + offset) % self.capacity]
    }

    pub fn set_len_at(&mut self, offset: usize, len: u8) {
        if offset >= self.count {
            return;
        }
        let idx = (self.head + offset) % self.capacity;
        if let Some(word) = &mut self.slots[idx] {
            word.len = len;
        }
    }

    /// Stamps EOT on every word currently in the ring, used by `setattr`
    /// when canonical mode is turned off so raw mode can deliver typeahead
    /// immediately.
    pub fn stamp_all_eot(&mut self) {
        for offset in 0..self.count {
            let idx = (self.head + offset) % self.capacity;
            if let Some(word) = &mut self.slots[idx] {
                if !word.is_eot() {
                    word.flags |= WordFlags::EOT;
                    self.eotct += 1;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.count = 0;
        self.eotct = 0;
    }
}
