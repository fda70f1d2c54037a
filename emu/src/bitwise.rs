use std::fmt::Debug;
use std::ops::RangeInclusive;

/// Bit twiddling over the unsigned integers the core works with.
/// Bit 0 is the least significant one.
pub trait Bits
where
    Self: Copy + Into<u64> + TryFrom<u64>,
    <Self as TryFrom<u64>>::Error: Debug,
{
    const SIZE: u8;

    fn is_bit_on(self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < Self::SIZE, "bit index out of range");

        let mask = 1 << bit_idx;
        self.into() & mask != 0
    }

    fn is_bit_off(self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    #[must_use]
    fn set_bit_on(self, bit_idx: u8) -> Self {
        debug_assert!(bit_idx < Self::SIZE, "bit index out of range");

        let mask: u64 = 1 << bit_idx;
        // Can't overflow Self since the mask is in range.
        Self::try_from(self.into() | mask).unwrap()
    }

    #[must_use]
    fn set_bit_off(self, bit_idx: u8) -> Self {
        debug_assert!(bit_idx < Self::SIZE, "bit index out of range");

        let mask: u64 = 1 << bit_idx;
        Self::try_from(self.into() & !mask).unwrap()
    }

    #[must_use]
    fn set_bit(self, bit_idx: u8, value: bool) -> Self {
        if value {
            self.set_bit_on(bit_idx)
        } else {
            self.set_bit_off(bit_idx)
        }
    }

    /// Extracts an inclusive range of bits, shifted down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
        debug_assert!(*bits_range.end() < Self::SIZE, "bit range out of range");

        let start = *bits_range.start();
        let length = bits_range.end() - start + 1;
        let mask = if length == 64 {
            u64::MAX
        } else {
            (1_u64 << length) - 1
        };

        Self::try_from((self.into() >> start) & mask).unwrap()
    }

    /// Sign extends the lowest `number_of_bits` bits over the whole width.
    #[must_use]
    fn sign_extended(self, number_of_bits: u8) -> Self {
        debug_assert!(number_of_bits > 0 && number_of_bits <= Self::SIZE);

        let mask = 1_u64 << (number_of_bits - 1);
        let value = self.into() & (mask | (mask - 1));
        let extended = (value ^ mask).wrapping_sub(mask);

        let keep = if Self::SIZE == 64 {
            u64::MAX
        } else {
            (1_u64 << Self::SIZE) - 1
        };
        Self::try_from(extended & keep).unwrap()
    }
}

impl Bits for u8 {
    const SIZE: u8 = 8;
}

impl Bits for u16 {
    const SIZE: u8 = 16;
}

impl Bits for u32 {
    const SIZE: u8 = 32;
}
