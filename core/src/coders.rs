use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::arith::{ArithDecoder, ArithEncoder};
use crate::error::{CodecError, Result};

/// Common shape of the value coders: a fixed, closed set of codecs that
/// serialize one integer through an arithmetic coder.
pub trait IntCoder {
    fn encode_int(&self, enc: &mut ArithEncoder, value: u64);
    fn decode_int(&self, dec: &mut ArithDecoder<'_>) -> Result<u64>;
}

/// Balanced coder for an integer in `[min, max)`.
///
/// Bits go most-significant first. While the running prefix still matches the
/// top value's prefix, each bit's probability is the exact share of remaining
/// in-range values having that bit zero; once the prefix falls strictly
/// below, the rest is a free 50/50 suffix. Costs `~ceil(log2(max - min))`
/// bits, the fixed-range optimum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NumberCoder {
    min: u64,
    max: u64,
}

impl NumberCoder {
    pub fn new(min: u64, max: u64) -> Self {
        assert!(max > min, "empty coder range");
        Self { min, max }
    }

    fn top(&self) -> u64 {
        self.max - self.min - 1
    }

    fn bit_width(&self) -> u32 {
        64 - self.top().leading_zeros()
    }

    /// P(bit == 0) at position `i` when the prefix is still tight and the
    /// top value has a one there.
    fn tight_zero_probability(top: u64, i: u32) -> f64 {
        let zeros = 1u64 << i;
        let ones = (top & (zeros - 1)) + 1;
        zeros as f64 / (zeros as f64 + ones as f64)
    }
}

impl IntCoder for NumberCoder {
    fn encode_int(&self, enc: &mut ArithEncoder, value: u64) {
        assert!(
            (self.min..self.max).contains(&value),
            "value outside coder range"
        );
        let rel = value - self.min;
        let top = self.top();
        let mut tight = true;
        for i in (0..self.bit_width()).rev() {
            let bit = rel >> i & 1 == 1;
            if !tight {
                enc.encode_bit(0.5, bit);
            } else if top >> i & 1 == 1 {
                enc.encode_bit(Self::tight_zero_probability(top, i), bit);
                tight = bit;
            } else {
                // tight prefix and the top value has a zero: the bit is forced
                enc.encode_bit(1.0, bit);
            }
        }
    }

    fn decode_int(&self, dec: &mut ArithDecoder<'_>) -> Result<u64> {
        let top = self.top();
        let mut rel = 0u64;
        let mut tight = true;
        for i in (0..self.bit_width()).rev() {
            let bit = if !tight {
                dec.decode_bit(0.5)?
            } else if top >> i & 1 == 1 {
                let bit = dec.decode_bit(Self::tight_zero_probability(top, i))?;
                tight = bit;
                bit
            } else {
                dec.decode_bit(1.0)?
            };
            rel |= (bit as u64) << i;
        }
        Ok(self.min + rel)
    }
}

/// Extension coder for values expected small but unbounded.
///
/// `payload_bits` raw halves, one 0.5 continuation bit, then alternating
/// "next bit (0.5)" / "more data" decisions where the terminal stop bit
/// carries probability `stop_p`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BitExtendCoder {
    payload_bits: u32,
    stop_p: f64,
}

impl BitExtendCoder {
    pub fn new(payload_bits: u32, stop_p: f64) -> Self {
        assert!((0.0..=1.0).contains(&stop_p), "probability out of range");
        Self {
            payload_bits,
            stop_p,
        }
    }

    pub fn encode_big(&self, enc: &mut ArithEncoder, value: &BigUint) {
        for i in 0..self.payload_bits {
            enc.encode_bit(0.5, value.bit(i as u64));
        }
        let mut rest = value >> self.payload_bits;
        let mut more = !rest.is_zero();
        enc.encode_bit(0.5, more);
        while more {
            enc.encode_bit(0.5, rest.bit(0));
            rest >>= 1;
            more = !rest.is_zero();
            enc.encode_bit(self.stop_p, more);
        }
    }

    pub fn decode_big(&self, dec: &mut ArithDecoder<'_>) -> Result<BigUint> {
        let mut value = BigUint::zero();
        for i in 0..self.payload_bits {
            if dec.decode_bit(0.5)? {
                value |= BigUint::one() << i;
            }
        }
        let mut position = self.payload_bits as u64;
        let mut more = dec.decode_bit(0.5)?;
        while more {
            if dec.decode_bit(0.5)? {
                value |= BigUint::one() << position;
            }
            position += 1;
            more = dec.decode_bit(self.stop_p)?;
        }
        Ok(value)
    }
}

impl IntCoder for BitExtendCoder {
    fn encode_int(&self, enc: &mut ArithEncoder, value: u64) {
        self.encode_big(enc, &BigUint::from(value));
    }

    fn decode_int(&self, dec: &mut ArithDecoder<'_>) -> Result<u64> {
        self.decode_big(dec)?
            .to_u64()
            .ok_or(CodecError::ValueOutOfRange)
    }
}

/// Fixed-population bit coder: with `zeros` zero bits known to remain among
/// `remaining` total, each bit is coded at `p = zeros / remaining`.
///
/// Bit for bit this reproduces the compression of the full combinatorial
/// rank without ever materializing it, and both ends become fully determined
/// (zero cost) once either count runs out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CountCoder {
    remaining: u64,
    zeros: u64,
}

impl CountCoder {
    pub fn new(total: u64, zeros: u64) -> Self {
        assert!(zeros <= total, "more zeros than bits");
        Self {
            remaining: total,
            zeros,
        }
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    fn zero_probability(&self) -> f64 {
        self.zeros as f64 / self.remaining as f64
    }

    fn consume(&mut self, bit: bool) {
        if !bit {
            self.zeros -= 1;
        }
        self.remaining -= 1;
    }

    pub fn encode_next(&mut self, enc: &mut ArithEncoder, bit: bool) {
        assert!(self.remaining > 0, "population coder exhausted");
        enc.encode_bit(self.zero_probability(), bit);
        self.consume(bit);
    }

    pub fn decode_next(&mut self, dec: &mut ArithDecoder<'_>) -> Result<bool> {
        assert!(self.remaining > 0, "population coder exhausted");
        let bit = dec.decode_bit(self.zero_probability())?;
        self.consume(bit);
        Ok(bit)
    }
}

/// Interleaves the sign so near-zero signed deltas become small unsigned
/// values.
pub const fn zigzag(value: i64) -> u64 {
    ((value as u64) << 1) ^ ((value >> 63) as u64)
}

pub const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{BitReader, BitWriter};
    use crate::combin::combinations;

    fn encode_with(f: impl FnOnce(&mut ArithEncoder)) -> crate::bits::BitBuffer {
        let mut enc = ArithEncoder::new(BitWriter::new());
        f(&mut enc);
        enc.close(false);
        let mut buf = enc.into_inner();
        buf.trim();
        buf
    }

    #[test]
    fn number_coder_round_trips_every_value() {
        for (min, max) in [(0u64, 2u64), (0, 7), (3, 20), (100, 1125), (0, 4096)] {
            let coder = NumberCoder::new(min, max);
            for value in (min..max).step_by(1.max((max - min) as usize / 97)) {
                let buf = encode_with(|enc| coder.encode_int(enc, value));
                let mut dec = ArithDecoder::new(BitReader::padded(&buf));
                assert_eq!(
                    coder.decode_int(&mut dec).unwrap(),
                    value,
                    "range [{min},{max})"
                );
            }
        }
    }

    #[test]
    fn number_coder_single_value_range_costs_nothing() {
        let coder = NumberCoder::new(9, 10);
        let buf = encode_with(|enc| coder.encode_int(enc, 9));
        assert_eq!(buf.len(), 0);
        let mut dec = ArithDecoder::new(BitReader::padded(&buf));
        assert_eq!(coder.decode_int(&mut dec).unwrap(), 9);
    }

    #[test]
    fn number_coder_stays_near_the_entropy_bound() {
        // 100 values in [0, 1000): ~10 bits each plus a bounded tail
        let coder = NumberCoder::new(0, 1000);
        let buf = encode_with(|enc| {
            for i in 0..100u64 {
                coder.encode_int(enc, i * 9 + 7);
            }
        });
        assert!(buf.len() <= 1005, "got {} bits", buf.len());
    }

    #[test]
    #[should_panic(expected = "outside coder range")]
    fn number_coder_rejects_out_of_range_value() {
        let coder = NumberCoder::new(0, 4);
        let mut enc = ArithEncoder::new(BitWriter::new());
        coder.encode_int(&mut enc, 4);
    }

    #[test]
    fn bit_extend_coder_round_trips() {
        let coder = BitExtendCoder::new(3, 0.5);
        for value in [0u64, 1, 7, 8, 100, 12345, u32::MAX as u64 + 17] {
            let buf = encode_with(|enc| coder.encode_int(enc, value));
            let mut dec = ArithDecoder::new(BitReader::padded(&buf));
            assert_eq!(coder.decode_int(&mut dec).unwrap(), value);
        }
    }

    #[test]
    fn bit_extend_coder_handles_arbitrary_precision() {
        let coder = BitExtendCoder::new(7, 0.3);
        let value = BigUint::parse_bytes(b"987654321098765432109876543210", 10).unwrap();
        let buf = encode_with(|enc| coder.encode_big(enc, &value));
        let mut dec = ArithDecoder::new(BitReader::padded(&buf));
        assert_eq!(coder.decode_big(&mut dec).unwrap(), value);
    }

    #[test]
    fn count_coder_round_trips_and_matches_rank_cost() {
        let mask: Vec<bool> = (0..64u32).map(|i| i % 7 == 0).collect();
        let ones = mask.iter().filter(|&&b| b).count() as u64;
        let zeros = mask.len() as u64 - ones;

        let buf = encode_with(|enc| {
            let mut coder = CountCoder::new(mask.len() as u64, zeros);
            for &bit in &mask {
                coder.encode_next(enc, bit);
            }
            assert!(coder.is_done());
        });

        // cost tracks log2(C(64, 10)), within the coder's constant slack
        let exact = combinations(mask.len() as u64, ones)
            .to_f64()
            .unwrap()
            .log2()
            .ceil() as usize;
        assert!(buf.len() <= exact + 2, "{} vs {}", buf.len(), exact);

        let mut dec = ArithDecoder::new(BitReader::padded(&buf));
        let mut coder = CountCoder::new(mask.len() as u64, zeros);
        let decoded: Vec<bool> = mask
            .iter()
            .map(|_| coder.decode_next(&mut dec).unwrap())
            .collect();
        assert_eq!(decoded, mask);
    }

    #[test]
    fn count_coder_extremes_cost_nothing() {
        for zeros in [0u64, 16] {
            let buf = encode_with(|enc| {
                let mut coder = CountCoder::new(16, zeros);
                for _ in 0..16 {
                    coder.encode_next(enc, zeros == 0);
                }
            });
            assert_eq!(buf.len(), 0, "zeros={zeros}");
        }
    }

    #[test]
    fn zigzag_is_symmetric_and_small_for_small_magnitudes() {
        for value in [-5i64, -1, 0, 1, 5, i64::MIN, i64::MAX] {
            assert_eq!(unzigzag(zigzag(value)), value);
        }
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
    }
}
