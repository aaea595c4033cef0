//! Double-buffered source input with sentinels.
//!
//! One contiguous region of `2 * BLOCK + 2` bytes holds two halves of
//! `BLOCK` bytes each, with a NUL sentinel after each half:
//!
//! ```text
//! [ half1: BLOCK bytes ][0][ half2: BLOCK bytes ][0]
//! ```
//!
//! The scanner's inner loop needs only a single test against the
//! sentinel to detect a boundary. When the cursor lands on a NUL there
//! are three cases: end of half1 (refill half2 and continue there), end
//! of half2 (refill half1 and wrap), or genuine end of input. A short
//! read marks its half with an EOF flag and writes the sentinel
//! immediately after the last byte, so an interior NUL and the written
//! end marker both read as end of input.
//!
//! Position tracking advances per input byte: `\n` increments the line
//! and resets the column to 1, `\r` is silently consumed, every other
//! byte increments the column. Completed lines are cached so the
//! diagnostic renderer never re-reads the file.

use crate::source::Source;

/// Bytes per half.
pub const BLOCK: usize = 4096;

const SENTINEL: u8 = 0;
const HALF1_START: usize = 0;
const HALF1_SENTINEL: usize = BLOCK;
const HALF2_START: usize = BLOCK + 1;
const HALF2_SENTINEL: usize = 2 * BLOCK + 1;

#[derive(Clone, Copy)]
struct Half {
    start: usize,
    /// Whether this half holds unconsumed data. A short read needs no
    /// extra bookkeeping here: it writes the sentinel right after the
    /// last byte, which the scanner reads as end of input.
    valid: bool,
}

/// The two-half sentinel buffer.
pub struct SourceBuffer {
    buf: Vec<u8>,
    source: Source,
    forward: usize,
    lexeme_begin: usize,
    halves: [Half; 2],
    line: u32,
    column: u32,
    lines: Vec<String>,
    current_line: Vec<u8>,
    tail_flushed: bool,
}

impl SourceBuffer {
    /// Create a buffer over a source and prime the first half.
    ///
    /// A failing first read is treated the same as an empty stream;
    /// open failures surface earlier, from [`Source::open`].
    pub fn new(mut source: Source) -> Self {
        let mut buf = vec![SENTINEL; 2 * BLOCK + 2];
        fill_half(&mut source, &mut buf, HALF1_START);

        let mut buffer = Self {
            buf,
            source,
            forward: HALF1_START,
            lexeme_begin: HALF1_START,
            halves: [
                Half {
                    start: HALF1_START,
                    valid: true,
                },
                Half {
                    start: HALF2_START,
                    valid: false,
                },
            ],
            line: 1,
            column: 1,
            lines: Vec::new(),
            current_line: Vec::new(),
            tail_flushed: false,
        };
        buffer.normalize_forward();
        buffer
    }

    /// Convenience constructor over an in-memory string.
    pub fn from_str(text: &str) -> Self {
        Self::new(Source::from_str(text))
    }

    /// The byte under the cursor, or the sentinel at true EOF.
    #[inline]
    pub fn current(&self) -> u8 {
        self.buf[self.forward]
    }

    /// True once the cursor sits on the end of input.
    #[inline]
    pub fn at_eof(&self) -> bool {
        self.buf[self.forward] == SENTINEL
    }

    /// Look ahead `k` bytes without advancing. `peek(0)` is
    /// [`current`](Self::current). Lookahead may cross one buffer
    /// boundary (loading the next half on demand); anything past a
    /// second boundary reads as the sentinel.
    pub fn peek(&mut self, k: usize) -> u8 {
        let mut index = self.forward;
        let mut crossed = false;
        let mut remaining = k;

        loop {
            if self.buf[index] == SENTINEL {
                match index {
                    HALF1_SENTINEL if !crossed => {
                        self.ensure_filled(1);
                        index = HALF2_START;
                        crossed = true;
                        continue;
                    }
                    HALF2_SENTINEL if !crossed => {
                        self.ensure_filled(0);
                        index = HALF1_START;
                        crossed = true;
                        continue;
                    }
                    _ => return SENTINEL,
                }
            }
            if remaining == 0 {
                return self.buf[index];
            }
            remaining -= 1;
            index += 1;
        }
    }

    /// Consume the byte under the cursor, updating position tracking.
    /// A no-op at EOF.
    pub fn advance(&mut self) {
        let byte = self.buf[self.forward];
        if byte == SENTINEL {
            return;
        }

        match byte {
            b'\n' => {
                self.complete_line();
                self.line += 1;
                self.column = 1;
            }
            b'\r' => {}
            _ => {
                self.column += 1;
                self.current_line.push(byte);
            }
        }

        self.forward += 1;
        self.normalize_forward();
    }

    /// Record the start of the current lexeme.
    pub fn mark_lexeme_start(&mut self) {
        self.lexeme_begin = self.forward;
    }

    /// The text between the lexeme mark and the cursor. Spans at most
    /// one buffer wrap.
    pub fn lexeme(&self) -> String {
        let mut bytes = Vec::new();
        let mut index = self.lexeme_begin;
        while index != self.forward {
            match index {
                HALF1_SENTINEL => index = HALF2_START,
                HALF2_SENTINEL => index = HALF1_START,
                _ => {
                    bytes.push(self.buf[index]);
                    index += 1;
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Current line number (1-based) of the byte under the cursor.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current byte column (1-based) of the byte under the cursor.
    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// The completed-line cache. At EOF this includes the final partial
    /// line.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Take ownership of the line cache (for handing to the renderer).
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Step over boundary sentinels, refilling halves as needed, until
    /// the cursor rests on data or on the true end of input.
    fn normalize_forward(&mut self) {
        loop {
            if self.buf[self.forward] != SENTINEL {
                return;
            }
            match self.forward {
                HALF1_SENTINEL => {
                    self.ensure_filled(1);
                    self.halves[0].valid = false;
                    self.forward = HALF2_START;
                }
                HALF2_SENTINEL => {
                    self.ensure_filled(0);
                    self.halves[1].valid = false;
                    self.forward = HALF1_START;
                }
                _ => {
                    self.flush_tail();
                    return;
                }
            }
        }
    }

    /// Refill the given half unless it already holds unconsumed data
    /// (a lookahead may have loaded it before the cursor arrived).
    fn ensure_filled(&mut self, half: usize) {
        if self.halves[half].valid {
            return;
        }
        let start = self.halves[half].start;
        fill_half(&mut self.source, &mut self.buf, start);
        self.halves[half].valid = true;
    }

    fn complete_line(&mut self) {
        let text = String::from_utf8_lossy(&self.current_line).into_owned();
        self.lines.push(text);
        self.current_line.clear();
    }

    fn flush_tail(&mut self) {
        if !self.tail_flushed {
            self.tail_flushed = true;
            if !self.current_line.is_empty() {
                self.complete_line();
            }
        }
    }
}

/// Read one block into the half starting at `start`. A short read
/// writes the sentinel immediately after the last byte; a read failure
/// mid-stream is treated as EOF.
fn fill_half(source: &mut Source, buf: &mut [u8], start: usize) {
    let n = source.read_block(&mut buf[start..start + BLOCK]).unwrap_or(0);
    if n < BLOCK {
        buf[start + n] = SENTINEL;
    }
}
