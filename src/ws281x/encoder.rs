use crate::rpi::{regs::pwm::PWM_CHANNELS, SYMBOLS_PER_BIT};

/// Length of the low period that latches the data into the LEDs.
pub const LED_RESET_US: u64 = 55;

const SYMBOL_BITS_PER_BYTE: u32 = 8 * SYMBOLS_PER_BIT;

/// Moves bit `k` of `x` to bit `3 * k`.
const fn spread3(x: u8) -> u32 {
    let mut x = x as u32;

    x = (x | (x << 16)) & 0xFF0000FF;
    x = (x | (x << 8)) & 0x0300F00F;
    x = (x | (x << 4)) & 0x030C30C3;
    x = (x | (x << 2)) & 0x09249249;

    x
}

const fn symbol_table() -> [u32; 256] {
    // The leading high bit of all eight symbols.
    const HIGH: u32 = 0x0092_4924;

    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (spread3(i as u8) << 1) | HIGH;
        i += 1;
    }
    table
}

/// The 24 symbol bits of every byte value, MSB first.
static SYMBOLS: [u32; 256] = symbol_table();

/// Bytes of symbol buffer needed for a strip, including the reset gap, for
/// both PWM channels.
pub fn pwm_byte_count(num_pixels: usize, num_colors: usize, frequency: u32) -> usize {
    let data_bits = SYMBOLS_PER_BIT as usize * num_colors * num_pixels * 8;

    // The reset gap at `frequency` bits per second, in PWM bits.
    let reset_bits =
        (LED_RESET_US * u64::from(frequency) * u64::from(SYMBOLS_PER_BIT) + 999_999) / 1_000_000;

    let bytes = (data_bits + reset_bits as usize) / 8;

    // Round up to the next whole word; always leaves at least one zero word.
    let bytes = bytes - bytes % 4 + 4;

    bytes * PWM_CHANNELS
}

/// Writes bits MSB first into every other word of a buffer.
struct SymbolWriter<'a> {
    words: &'a mut [u32],
    index: usize,
    free: u32,
}

impl<'a> SymbolWriter<'a> {
    fn new(words: &'a mut [u32], channel: usize) -> Self {
        Self {
            words,
            index: channel,
            free: 32,
        }
    }

    /// Appends the lowest `count` bits of `bits`, overwriting what was there.
    fn push(&mut self, bits: u32, mut count: u32) {
        while count > 0 {
            let take = count.min(self.free);
            let mask = u32::MAX >> (32 - take);
            let chunk = (bits >> (count - take)) & mask;
            let shift = self.free - take;

            if let Some(word) = self.words.get_mut(self.index) {
                *word = (*word & !(mask << shift)) | (chunk << shift);
            }

            count -= take;
            self.free -= take;
            if self.free == 0 {
                self.index += PWM_CHANNELS;
                self.free = 32;
            }
        }
    }
}

/// Encodes `pixels` into `symbols`, once per PWM channel.
///
/// Words past the encoded data are left as they are; a too short `symbols`
/// buffer truncates the stream.
///
/// Both channels carry the same data.
pub fn encode(pixels: &[u8], symbols: &mut [u32]) {
    for channel in 0..PWM_CHANNELS {
        let mut writer = SymbolWriter::new(symbols, channel);
        for &byte in pixels {
            writer.push(SYMBOLS[usize::from(byte)], SYMBOL_BITS_PER_BYTE);
        }
    }
}

/// Reads `len` bytes of channel `channel` back from a symbol stream.
///
/// Returns `None` if a symbol is malformed.
#[cfg(test)]
pub(crate) fn decode(symbols: &[u32], channel: usize, len: usize) -> Option<Vec<u8>> {
    let mut bits = symbols
        .iter()
        .skip(channel)
        .step_by(PWM_CHANNELS)
        .flat_map(|word| (0..32).rev().map(move |i| (word >> i) & 1));

    let mut bytes = Vec::with_capacity(len);
    for _ in 0..len {
        let mut byte = 0u8;
        for _ in 0..8 {
            let symbol = [bits.next()?, bits.next()?, bits.next()?];
            byte <<= 1;
            match symbol {
                [1, 1, 0] => byte |= 1,
                [1, 0, 0] => {}
                _ => return None,
            }
        }
        bytes.push(byte);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols() {
        assert_eq!(SYMBOLS[0x00], 0b100_100_100_100_100_100_100_100);
        assert_eq!(SYMBOLS[0xff], 0b110_110_110_110_110_110_110_110);
        assert_eq!(SYMBOLS[0x81], 0b110_100_100_100_100_100_100_110);
        assert_eq!(SYMBOLS[0x40], 0b100_110_100_100_100_100_100_100);
    }

    #[test]
    fn byte_count_reference() {
        // 72 data bits + 132 reset bits = 204 bits = 25 bytes -> 28, two channels.
        assert_eq!(pwm_byte_count(1, 3, 800_000), 56);
        // 3 * 4 * 8 * 10 = 960 data bits + 66 reset bits = 128 bytes -> 132.
        assert_eq!(pwm_byte_count(10, 4, 400_000), 264);
    }

    #[test]
    fn byte_count_is_monotonic() {
        let mut last = 0;
        for pixels in 0..300 {
            let count = pwm_byte_count(pixels, 3, 800_000);
            assert!(count >= last);
            assert_eq!(count % 8, 0);
            last = count;
        }
        for colors in 3..=4 {
            assert!(pwm_byte_count(10, colors, 800_000) >= pwm_byte_count(10, colors - 1, 800_000));
        }
        let mut last = 0;
        for frequency in (400_000..=1_200_000).step_by(1_000) {
            let count = pwm_byte_count(10, 3, frequency);
            assert!(count >= last);
            last = count;
        }
    }

    #[test]
    fn every_byte_round_trips() {
        let pixels: Vec<u8> = (0..=255).collect();
        let mut symbols = vec![0; pwm_byte_count(256, 1, 800_000) / 4];
        encode(&pixels, &mut symbols);

        for channel in 0..PWM_CHANNELS {
            assert_eq!(decode(&symbols, channel, pixels.len()).as_deref(), Some(&pixels[..]));
        }
    }

    #[test]
    fn channels_interleave() {
        let mut symbols = vec![0; 8];
        encode(&[0xff], &mut symbols);
        // 24 symbol bits fill the top of word 0 (channel 0) and word 1 (channel 1).
        assert_eq!(symbols[0], 0xdb6d_b600);
        assert_eq!(symbols[1], 0xdb6d_b600);
        assert!(symbols[2..].iter().all(|&w| w == 0));
    }

    #[test]
    fn reencoding_overwrites_stale_bits() {
        let mut symbols = vec![u32::MAX; 16];
        encode(&[0x00, 0x00], &mut symbols);
        assert_eq!(decode(&symbols, 0, 2), Some(vec![0x00, 0x00]));
        assert_eq!(decode(&symbols, 1, 2), Some(vec![0x00, 0x00]));
        // Past the 48 encoded bits, nothing is touched.
        assert_eq!(symbols[2] & 0xffff, 0xffff);
    }

    #[test]
    fn short_buffers_truncate() {
        let mut symbols = vec![0; 2];
        encode(&[0xff; 8], &mut symbols);
        assert_eq!(symbols, [0xdb6d_b6db, 0xdb6d_b6db]);
    }
}
