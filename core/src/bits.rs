use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;

/// Mask with the `n` lowest bits set, `n <= 32`.
const fn ones(n: usize) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

/// Growable sequence of bits addressed from the least significant end.
///
/// Index 0 is the least significant bit of the conceptual integer. Bits at or
/// above `len` are logically zero, and the storage upholds that: shrinking the
/// buffer masks the now-out-of-range high bits so a later grow re-reads them
/// as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitBuffer {
    words: Vec<u32>,
    len: usize,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    fn grow_to(&mut self, end: usize) {
        if end > self.len {
            let needed = end.div_ceil(32);
            if needed > self.words.len() {
                self.words.resize(needed, 0);
            }
            self.len = end;
        }
    }

    /// Reads the span `[start, end)` of at most 32 bits. Bits beyond the
    /// current length read as zero.
    pub fn get_bits(&self, start: usize, end: usize) -> u32 {
        assert!(end >= start, "bit span end before start");
        let span = end - start;
        assert!(span <= 32, "bit span wider than 32");
        if span == 0 {
            return 0;
        }

        let word = start / 32;
        let offset = start % 32;
        let mut value = self.word(word) >> offset;
        if offset + span > 32 {
            value |= self.word(word + 1) << (32 - offset);
        }
        value & ones(span)
    }

    /// Writes `value` into the span `[start, end)` of at most 32 bits,
    /// growing the buffer when `end` exceeds the current length. `value`
    /// must fit in the span.
    pub fn set_bits(&mut self, value: u32, start: usize, end: usize) {
        assert!(end >= start, "bit span end before start");
        let span = end - start;
        assert!(span <= 32, "bit span wider than 32");
        assert!(
            span == 32 || value <= ones(span),
            "value does not fit bit span"
        );
        if span == 0 {
            return;
        }
        self.grow_to(end);

        let word = start / 32;
        let offset = start % 32;
        let low_bits = (32 - offset).min(span);
        let low_mask = ones(low_bits) << offset;
        self.words[word] = (self.words[word] & !low_mask) | ((value << offset) & low_mask);
        if span > low_bits {
            let high_bits = span - low_bits;
            let high_mask = ones(high_bits);
            self.words[word + 1] =
                (self.words[word + 1] & !high_mask) | ((value >> low_bits) & high_mask);
        }
    }

    pub fn get_bit(&self, index: usize) -> bool {
        self.get_bits(index, index + 1) != 0
    }

    pub fn set_bit(&mut self, index: usize, bit: bool) {
        self.set_bits(bit as u32, index, index + 1);
    }

    pub fn append_bit(&mut self, bit: bool) {
        let at = self.len;
        self.set_bit(at, bit);
    }

    /// Reads the span `[start, end)` of arbitrary width as an unsigned value.
    pub fn get_big(&self, start: usize, end: usize) -> BigUint {
        assert!(end >= start, "bit span end before start");
        let mut digits = Vec::with_capacity((end - start).div_ceil(32));
        let mut at = start;
        while at < end {
            let chunk = (end - at).min(32);
            digits.push(self.get_bits(at, at + chunk));
            at += chunk;
        }
        BigUint::from_slice(&digits)
    }

    /// Reads the span `[start, end)` as a two's-complement signed value.
    pub fn get_big_signed(&self, start: usize, end: usize) -> BigInt {
        let width = end - start;
        let raw = self.get_big(start, end);
        if width > 0 && self.get_bit(end - 1) {
            BigInt::from(raw) - (BigInt::one() << width)
        } else {
            BigInt::from(raw)
        }
    }

    /// Writes `value` starting at `start`. A present `end` fixes the width
    /// (negative values are sign-extended two's complement across it); an
    /// omitted `end` infers the width from the value's significant bits, one
    /// extra sign bit for negatives. Returns the end of the written span.
    pub fn set_big(&mut self, value: &BigInt, start: usize, end: Option<usize>) -> usize {
        let magnitude_bits = value.magnitude().bits() as usize;
        let width = match end {
            Some(end) => {
                assert!(end >= start, "bit span end before start");
                end - start
            }
            None => match value.sign() {
                Sign::Minus => magnitude_bits + 1,
                _ => magnitude_bits,
            },
        };
        let end = start + width;

        let unsigned = match value.sign() {
            Sign::Minus => {
                assert!(
                    width > 0
                        && (magnitude_bits < width || *value == -(BigInt::one() << (width - 1))),
                    "value does not fit bit span"
                );
                ((BigInt::one() << width) + value)
                    .to_biguint()
                    .expect("two's complement is non-negative")
            }
            _ => {
                assert!(magnitude_bits <= width, "value does not fit bit span");
                value.to_biguint().expect("non-negative")
            }
        };

        let digits: Vec<u32> = unsigned.to_u32_digits();
        let mut at = start;
        let mut index = 0;
        while at < end {
            let chunk = (end - at).min(32);
            let word = digits.get(index).copied().unwrap_or(0);
            self.set_bits(word & ones(chunk), at, at + chunk);
            at += chunk;
            index += 1;
        }
        end
    }

    /// Convenience for writing an unsigned arbitrary-precision value.
    pub fn set_big_unsigned(&mut self, value: &BigUint, start: usize, end: Option<usize>) -> usize {
        self.set_big(&BigInt::from(value.clone()), start, end)
    }

    /// Drops trailing zero high-order bits, recomputing the length from the
    /// leading zeros of the top word.
    pub fn trim(&mut self) {
        while matches!(self.words.last(), Some(0)) {
            self.words.pop();
        }
        self.len = match self.words.last() {
            Some(&top) => self.words.len() * 32 - top.leading_zeros() as usize,
            None => 0,
        };
    }

    /// Shrinks the buffer to `new_len` bits, masking out-of-range high bits.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }
        self.words.truncate(new_len.div_ceil(32));
        if let Some(top) = self.words.last_mut() {
            let keep = new_len % 32;
            if keep != 0 {
                *top &= ones(keep);
            }
        }
        self.len = new_len;
    }

    pub fn as_biguint(&self) -> BigUint {
        self.get_big(0, self.len)
    }
}

/// Cursor-based view over a [`BitBuffer`], optionally bounded.
///
/// An unbounded reader synthesizes zero bits past the end of the backing
/// buffer forever; a bounded one reports exhaustion instead. The backing
/// buffer must not change length while a reader is live. Nothing in this
/// crate mutates concurrently, so this is a usage constraint rather than a
/// runtime guard.
#[derive(Debug)]
pub struct BitReader<'a> {
    buf: &'a BitBuffer,
    pos: usize,
    end: Option<usize>,
}

impl<'a> BitReader<'a> {
    /// Reader over the buffer's current contents, bounded by its length.
    pub fn new(buf: &'a BitBuffer) -> Self {
        let end = Some(buf.len());
        Self { buf, pos: 0, end }
    }

    /// Unbounded reader: past the buffer's length it yields zeros forever.
    pub fn padded(buf: &'a BitBuffer) -> Self {
        Self {
            buf,
            pos: 0,
            end: None,
        }
    }

    pub fn starting_at(mut self, pos: usize) -> Self {
        self.pos = pos;
        self
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Remaining bits, or `None` when unbounded.
    pub fn count(&self) -> Option<usize> {
        self.end.map(|end| end.saturating_sub(self.pos))
    }

    /// Bits immediately available without crossing a word boundary. An
    /// efficiency hint only.
    pub fn pending(&self) -> usize {
        let to_boundary = 32 - self.pos % 32;
        match self.count() {
            Some(remaining) => to_boundary.min(remaining),
            None => to_boundary,
        }
    }

    /// Next bit, or `None` when a bounded reader is exhausted.
    pub fn read_bit(&mut self) -> Option<bool> {
        if let Some(end) = self.end {
            if self.pos >= end {
                return None;
            }
        }
        let bit = self.buf.get_bit(self.pos);
        self.pos += 1;
        Some(bit)
    }

    /// Skips `n` bits without reading them.
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Appending writer that owns its [`BitBuffer`].
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: BitBuffer,
    pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues appending after the buffer's current contents.
    pub fn from_buffer(buf: BitBuffer) -> Self {
        let pos = buf.len();
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits until the next word boundary. An efficiency hint only.
    pub fn pending(&self) -> usize {
        32 - self.pos % 32
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.buf.set_bit(self.pos, bit);
        self.pos += 1;
    }

    pub fn into_inner(self) -> BitBuffer {
        self.buf
    }
}
