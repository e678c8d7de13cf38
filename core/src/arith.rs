use crate::bits::{BitBuffer, BitReader, BitWriter};
use crate::error::{CodecError, Result};

/// The coder works on 31-bit interval bounds so every intermediate value,
/// including `high << 1 | 1`, stays inside a `u32`.
pub const RANGE_MAX: u32 = (1 << 31) - 1;
const HALF: u32 = 1 << 30;
const QUARTER: u32 = 1 << 29;

/// Binary arithmetic encoder over an explicit per-bit probability.
///
/// `p` is always the probability that the encoded bit is zero. The interval
/// invariant is `0 <= low <= high <= RANGE_MAX`; renormalization keeps
/// `high - low >= QUARTER` ahead of every split. Zero bits are deferred in
/// `trailing_zeros` so a non-terminated close can drop the all-zero tail.
#[derive(Debug)]
pub struct ArithEncoder {
    out: BitWriter,
    low: u32,
    high: u32,
    pending_bits: u32,
    trailing_zeros: usize,
}

impl ArithEncoder {
    pub fn new(out: BitWriter) -> Self {
        Self {
            out,
            low: 0,
            high: RANGE_MAX,
            pending_bits: 0,
            trailing_zeros: 0,
        }
    }

    /// Logical bits emitted so far, deferred zeros included.
    pub fn position(&self) -> usize {
        self.out.position() + self.trailing_zeros
    }

    fn push_raw(&mut self, bit: bool) {
        if bit {
            for _ in 0..self.trailing_zeros {
                self.out.write_bit(false);
            }
            self.trailing_zeros = 0;
            self.out.write_bit(true);
        } else {
            self.trailing_zeros += 1;
        }
    }

    fn emit(&mut self, bit: bool) {
        self.push_raw(bit);
        for _ in 0..self.pending_bits {
            self.push_raw(!bit);
        }
        self.pending_bits = 0;
    }

    /// One interval rescale when the interval sits inside a half: emits (or
    /// defers) a bit and doubles precision. Returns false once the interval
    /// is too wide for any zoom case.
    fn zoom_step(&mut self) -> bool {
        if self.high < HALF {
            self.emit(false);
            self.low <<= 1;
            self.high = self.high << 1 | 1;
        } else if self.low >= HALF {
            self.emit(true);
            self.low = (self.low - HALF) << 1;
            self.high = (self.high - HALF) << 1 | 1;
        } else if self.low >= QUARTER && self.high < HALF + QUARTER {
            // straddling the middle, both bounds within a quarter of it
            self.pending_bits += 1;
            self.low = (self.low - QUARTER) << 1;
            self.high = (self.high - QUARTER) << 1 | 1;
        } else {
            return false;
        }
        true
    }

    fn renormalize(&mut self) {
        while self.high - self.low < QUARTER {
            let zoomed = self.zoom_step();
            debug_assert!(zoomed);
        }
    }

    /// Encodes one bit against `p = P(bit == 0)`.
    ///
    /// `p <= 0` and `p >= 1` carry no information: the bit is forced and
    /// nothing is written, but encoding the impossible value is a caller bug.
    pub fn encode_bit(&mut self, p: f64, bit: bool) {
        assert!((0.0..=1.0).contains(&p), "probability out of range");
        if p <= 0.0 {
            assert!(bit, "encoded an impossible zero bit");
            return;
        }
        if p >= 1.0 {
            assert!(!bit, "encoded an impossible one bit");
            return;
        }

        self.renormalize();
        let mid = split(self.low, self.high, p);
        if bit {
            self.low = mid;
        } else {
            self.high = mid - 1;
        }
    }

    /// Closes the stream.
    ///
    /// Terminating drives the interval back to `(0, RANGE_MAX)` and flushes every
    /// deferred bit so the section's exact length is on the wire and more
    /// data may follow in the same stream; the encoder is reset and stays
    /// usable. A non-terminated close instead picks the code point in
    /// `[low, high]` with the most trailing zeros and drops the zero tail;
    /// shorter, but the decoder must then run padded.
    pub fn close(&mut self, terminate: bool) {
        if terminate {
            self.close_terminated();
        } else {
            self.close_padded();
        }
    }

    fn close_terminated(&mut self) {
        if self.low != 0 || self.high != RANGE_MAX || self.pending_bits != 0 {
            // Zoom until no case applies: the interval then spans at least a
            // full quarter-aligned block, so two bits pin the code value no
            // matter what data follows in the stream.
            while self.zoom_step() {}
            if self.low < QUARTER {
                self.emit(false);
                self.emit(true);
            } else {
                self.emit(true);
                self.emit(false);
            }
        }
        while self.trailing_zeros > 0 {
            self.out.write_bit(false);
            self.trailing_zeros -= 1;
        }
        self.low = 0;
        self.high = RANGE_MAX;
        self.pending_bits = 0;
    }

    fn close_padded(&mut self) {
        let mut v = 0u32;
        let mut t = 31;
        if self.low > 0 {
            loop {
                t -= 1;
                let step = 1u32 << t;
                let candidate = (self.low + step - 1) & !(step - 1);
                if candidate <= self.high {
                    v = candidate;
                    break;
                }
            }
        }
        if v == 0 {
            if self.pending_bits > 0 {
                self.emit(false);
            }
        } else {
            for i in (t..31).rev() {
                self.emit(v >> i & 1 == 1);
            }
        }
    }

    pub fn into_inner(self) -> BitBuffer {
        self.out.into_inner()
    }
}

/// Splits `[low, high]` at the zero/one boundary for `p = P(0)`.
///
/// Shared by encoder and decoder: both must compute the identical split from
/// identical state, or the streams silently desynchronize.
fn split(low: u32, high: u32, p: f64) -> u32 {
    (low + 1 + (p * f64::from(high - low)) as u32).min(high)
}

/// Binary arithmetic decoder mirroring [`ArithEncoder`].
///
/// `value` holds the code-value bits read so far, high bits first;
/// `range_mask` has ones at the still-unread low positions, so the true code
/// value lies in `[value, value | range_mask]`. Bits are fetched only when a
/// split cannot be decided from the known prefix. A padded reader synthesizes
/// zeros forever; a bounded reader exhausting mid-decision closes the decoder
/// for good.
#[derive(Debug)]
pub struct ArithDecoder<'a> {
    reader: BitReader<'a>,
    low: u32,
    high: u32,
    value: u32,
    range_mask: u32,
    pending_bits: u32,
    emitted: usize,
    fetched: usize,
    closed: bool,
}

impl<'a> ArithDecoder<'a> {
    pub fn new(reader: BitReader<'a>) -> Self {
        Self {
            reader,
            low: 0,
            high: RANGE_MAX,
            value: 0,
            range_mask: RANGE_MAX,
            pending_bits: 0,
            emitted: 0,
            fetched: 0,
            closed: false,
        }
    }

    fn fetch_bit(&mut self) -> Result<()> {
        if self.closed {
            return Err(CodecError::DecoderClosed);
        }
        let bit = match self.reader.read_bit() {
            Some(bit) => bit,
            None => {
                self.closed = true;
                return Err(CodecError::StreamExhausted);
            }
        };
        debug_assert!(self.range_mask > 0);
        self.range_mask >>= 1;
        if bit {
            self.value |= self.range_mask + 1;
        }
        self.fetched += 1;
        Ok(())
    }

    /// Mirrors the encoder's [`ArithEncoder::zoom_step`], including its
    /// emission count: `emitted`/`pending_bits` track exactly what the
    /// encoder put on the wire, which is what lets a terminated close
    /// consume a section's bits precisely.
    fn zoom_step(&mut self) -> bool {
        let shift = if self.high < HALF {
            self.emitted += 1 + self.pending_bits as usize;
            self.pending_bits = 0;
            0
        } else if self.low >= HALF {
            self.emitted += 1 + self.pending_bits as usize;
            self.pending_bits = 0;
            HALF
        } else if self.low >= QUARTER && self.high < HALF + QUARTER {
            self.pending_bits += 1;
            QUARTER
        } else {
            return false;
        };
        self.low = (self.low - shift) << 1;
        self.high = (self.high - shift) << 1 | 1;
        self.value = (self.value - shift) << 1;
        self.range_mask = self.range_mask << 1 | 1;
        true
    }

    fn renormalize(&mut self) {
        while self.high - self.low < QUARTER {
            let zoomed = self.zoom_step();
            debug_assert!(zoomed);
        }
    }

    /// Decodes one bit against `p = P(bit == 0)`.
    pub fn decode_bit(&mut self, p: f64) -> Result<bool> {
        assert!((0.0..=1.0).contains(&p), "probability out of range");
        if p <= 0.0 {
            return Ok(true);
        }
        if p >= 1.0 {
            return Ok(false);
        }

        self.renormalize();
        let mid = split(self.low, self.high, p);
        let bit = loop {
            if self.value >= mid {
                break true;
            }
            if (self.value | self.range_mask) < mid {
                break false;
            }
            self.fetch_bit()?;
        };
        if bit {
            self.low = mid;
        } else {
            self.high = mid - 1;
        }
        Ok(bit)
    }

    /// Closes a section. A terminated close mirrors the encoder's: it skips
    /// the remainder of the section's bits and resets, ready for the data
    /// that follows. A non-terminated close is a no-op, since the caller's
    /// own stop condition ends the stream.
    pub fn close(&mut self, terminate: bool) -> Result<()> {
        if !terminate {
            return Ok(());
        }
        if self.closed {
            return Err(CodecError::DecoderClosed);
        }

        if self.low != 0 || self.high != RANGE_MAX || self.pending_bits != 0 {
            while self.zoom_step() {}
            self.emitted += 2 + self.pending_bits as usize;
            self.pending_bits = 0;
        }
        debug_assert!(self.emitted >= self.fetched);
        self.reader.skip(self.emitted - self.fetched);

        self.low = 0;
        self.high = RANGE_MAX;
        self.value = 0;
        self.range_mask = RANGE_MAX;
        self.pending_bits = 0;
        self.emitted = 0;
        self.fetched = 0;
        Ok(())
    }
}
