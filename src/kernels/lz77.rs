//! Hash-chain LZ77 match finder with a sliding 32 KiB window.
//!
//! The finder is stateful across calls: every byte handed to `tokenize` or `preload`
//! joins the history, so matches of a later chunk can reach back into earlier chunks
//! or into a preset dictionary. Matches never extend past the end of the slice passed
//! to a single `tokenize` call.
//!
//! `begin_journal` records what the following calls overwrite, so a chunk that is not
//! committed can be undone with `rollback` in time proportional to the chunk rather
//! than to the window.

use bitvec::prelude::*;

use crate::types::levels::DEFLATE_WINDOW;

pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 258;

const HASH_BITS: u32 = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const WINDOW_MASK: usize = DEFLATE_WINDOW - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Match { length: u16, distance: u16 },
}

impl Token {
    /// Number of input bytes the token stands for.
    pub fn span(&self) -> usize {
        match self {
            Token::Literal(_) => 1,
            Token::Match { length, .. } => *length as usize,
        }
    }
}

/// Search parameters of the match finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEffort {
    /// Candidates examined per position.
    pub max_chain: usize,
    /// A match at least this long ends the search.
    pub nice_length: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub lazy: bool,
    /// Farthest distance a match may reach.
    pub max_distance: usize,
}

impl Default for MatchEffort {
    fn default() -> Self {
        Self {
            max_chain: 32,
            nice_length: 128,
            lazy: false,
            max_distance: DEFLATE_WINDOW,
        }
    }
}

/// First-touch record of everything a chunk changes in the finder.
#[derive(Debug, Clone)]
struct Journal {
    base: usize,
    window_len: usize,
    hashed_upto: usize,
    /// Bytes slid out of the window, in order.
    drained: Vec<u8>,
    /// Buckets whose old head is already saved.
    touched: BitVec,
    head: Vec<(usize, usize)>,
    /// Old `prev` values of the positions hashed since `hashed_upto`, first lap only.
    prev: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct MatchFinder {
    effort: MatchEffort,
    /// History bytes; `window[0]` sits at absolute position `base`.
    window: Vec<u8>,
    base: usize,
    /// Absolute position + 1 of the newest entry per hash, 0 for none.
    head: Vec<usize>,
    /// Previous entry of the chain, indexed by absolute position modulo the window.
    prev: Vec<usize>,
    /// Absolute positions below this one are in the hash chains.
    hashed_upto: usize,
    journal: Option<Journal>,
}

impl MatchFinder {
    pub fn new(effort: MatchEffort) -> Self {
        Self {
            effort: MatchEffort {
                max_distance: effort.max_distance.clamp(1, DEFLATE_WINDOW),
                nice_length: effort.nice_length.clamp(MIN_MATCH, MAX_MATCH),
                ..effort
            },
            window: Vec::with_capacity(2 * DEFLATE_WINDOW),
            base: 0,
            head: vec![0; HASH_SIZE],
            prev: vec![0; DEFLATE_WINDOW],
            hashed_upto: 0,
            journal: None,
        }
    }

    pub fn effort(&self) -> MatchEffort {
        self.effort
    }

    fn end(&self) -> usize {
        self.base + self.window.len()
    }

    #[inline]
    fn byte(&self, abs: usize) -> u8 {
        self.window[abs - self.base]
    }

    #[inline]
    fn hash(&self, abs: usize) -> usize {
        let i = abs - self.base;
        let v = (self.window[i] as u32) << 16 | (self.window[i + 1] as u32) << 8 | self.window[i + 2] as u32;
        (v.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
    }

    fn insert(&mut self, abs: usize) {
        let h = self.hash(abs);
        let slot = abs & WINDOW_MASK;
        if let Some(j) = self.journal.as_mut() {
            if !j.touched[h] {
                j.touched.set(h, true);
                j.head.push((h, self.head[h]));
            }
            if j.prev.len() < DEFLATE_WINDOW {
                j.prev.push(self.prev[slot]);
            }
        }
        self.prev[slot] = self.head[h];
        self.head[h] = abs + 1;
    }

    /// Starts recording changes so the next calls can be undone. Replaces any open journal.
    pub fn begin_journal(&mut self) {
        self.journal = Some(Journal {
            base: self.base,
            window_len: self.window.len(),
            hashed_upto: self.hashed_upto,
            drained: Vec::new(),
            touched: bitvec![0; HASH_SIZE],
            head: Vec::new(),
            prev: Vec::new(),
        });
    }

    /// Keeps the changes made since `begin_journal`.
    pub fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Restores the state of the last `begin_journal`. Without a journal this is a no-op.
    pub fn rollback(&mut self) {
        let Some(j) = self.journal.take() else {
            return;
        };
        for (k, &old) in j.prev.iter().enumerate() {
            self.prev[(j.hashed_upto + k) & WINDOW_MASK] = old;
        }
        for &(h, old) in &j.head {
            self.head[h] = old;
        }
        let mut window = j.drained;
        window.extend_from_slice(&self.window);
        window.truncate(j.window_len);
        self.window = window;
        self.base = j.base;
        self.hashed_upto = j.hashed_upto;
    }

    /// Hashes every position that now has three bytes available, up to `limit`.
    fn catch_up(&mut self, limit: usize) {
        let last_hashable = self.end().saturating_sub(MIN_MATCH - 1);
        let upto = limit.min(last_hashable);
        while self.hashed_upto < upto {
            self.insert(self.hashed_upto);
            self.hashed_upto += 1;
        }
    }

    fn append(&mut self, data: &[u8]) {
        if self.window.len() + data.len() > 2 * DEFLATE_WINDOW && self.window.len() > DEFLATE_WINDOW {
            let drop = self.window.len() - DEFLATE_WINDOW;
            if let Some(j) = self.journal.as_mut() {
                j.drained.extend_from_slice(&self.window[..drop]);
            }
            self.window.drain(..drop);
            self.base += drop;
        }
        self.window.extend_from_slice(data);
    }

    /// Adds history that will not be tokenized, such as a preset dictionary.
    pub fn preload(&mut self, history: &[u8]) {
        let tail = &history[history.len().saturating_sub(DEFLATE_WINDOW)..];
        if self.window.is_empty() {
            self.base += history.len() - tail.len();
            self.hashed_upto = self.base;
        }
        self.append(tail);
        let end = self.end();
        self.catch_up(end);
    }

    /// Longest match for `pos` limited to `max_len` bytes, as (length, distance).
    fn longest_match(&self, pos: usize, max_len: usize) -> Option<(usize, usize)> {
        if max_len < MIN_MATCH || pos + MIN_MATCH > self.end() {
            return None;
        }
        let lowest = pos.saturating_sub(self.effort.max_distance).max(self.base);
        let mut candidate = self.head[self.hash(pos)];
        let mut best: Option<(usize, usize)> = None;
        let mut chain = self.effort.max_chain;

        while candidate > 0 && chain > 0 {
            let cand = candidate - 1;
            if cand < lowest || cand >= pos {
                break;
            }
            let best_len = best.map_or(MIN_MATCH - 1, |(l, _)| l);
            if self.byte(cand + best_len) == self.byte(pos + best_len) {
                let mut len = 0;
                while len < max_len && self.byte(cand + len) == self.byte(pos + len) {
                    len += 1;
                }
                if len > best_len {
                    best = Some((len, pos - cand));
                    if len >= self.effort.nice_length || len == max_len {
                        break;
                    }
                }
            }
            let next = self.prev[cand & WINDOW_MASK];
            if next == 0 || next - 1 >= cand {
                break;
            }
            candidate = next;
            chain -= 1;
        }
        best.filter(|&(l, _)| l >= MIN_MATCH)
    }

    /// Appends `input` to the history and emits tokens covering exactly its bytes.
    pub fn tokenize(&mut self, input: &[u8], out: &mut Vec<Token>) {
        let start = self.end();
        self.append(input);
        let end = self.end();
        let mut pos = start;

        while pos < end {
            self.catch_up(pos);
            let max_len = (end - pos).min(MAX_MATCH);
            let found = self.longest_match(pos, max_len);

            let found = match found {
                Some((len, dist)) if self.effort.lazy && len < self.effort.nice_length && pos + 1 < end => {
                    self.catch_up(pos + 1);
                    let next_max = (end - pos - 1).min(MAX_MATCH);
                    match self.longest_match(pos + 1, next_max) {
                        Some((next_len, _)) if next_len > len => {
                            out.push(Token::Literal(self.byte(pos)));
                            pos += 1;
                            continue;
                        }
                        _ => Some((len, dist)),
                    }
                }
                other => other,
            };

            match found {
                Some((len, dist)) => {
                    out.push(Token::Match {
                        length: len as u16,
                        distance: dist as u16,
                    });
                    pos += len;
                }
                None => {
                    out.push(Token::Literal(self.byte(pos)));
                    pos += 1;
                }
            }
        }
        self.catch_up(end);
    }
}

/// Literal-only tokenization.
pub fn literals(input: &[u8], out: &mut Vec<Token>) {
    out.extend(input.iter().map(|&b| Token::Literal(b)));
}

/// Expands tokens back to bytes against `history`. Test helper for the finder.
#[cfg(test)]
pub(crate) fn expand(history: &[u8], tokens: &[Token]) -> Vec<u8> {
    let mut buf = history.to_vec();
    for t in tokens {
        match *t {
            Token::Literal(b) => buf.push(b),
            Token::Match { length, distance } => {
                let from = buf.len() - distance as usize;
                for i in 0..length as usize {
                    let b = buf[from + i];
                    buf.push(b);
                }
            }
        }
    }
    buf.split_off(history.len())
}
