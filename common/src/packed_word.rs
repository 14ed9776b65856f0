//! Fixed-width packed words.
//!
//! A [`PackedWord`] is a 512-bit value made of `u64` limbs. Streams of pixel
//! samples and histogram counts travel as packed words: a [`PackLayout`]
//! splits a word into `fields` equally sized sub-values of `field_bits` bits,
//! field `k` occupying bits `[k * field_bits, (k + 1) * field_bits)`.
//! A field may straddle two limbs.

/// Number of bits per storage limb.
const BITS_PER_LIMB: usize = 64;

/// Number of limbs in a word.
const LIMBS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PackedWord {
    limbs: [u64; LIMBS],
}

#[inline]
fn low_mask(width: usize) -> u64 {
    if width >= BITS_PER_LIMB {
        !0u64
    } else {
        (1u64 << width) - 1
    }
}

impl PackedWord {
    /// Total number of bits a word can hold.
    pub const CAPACITY_BITS: usize = BITS_PER_LIMB * LIMBS;

    pub const ZERO: Self = Self { limbs: [0; LIMBS] };

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    /// Reads `width` bits starting at bit `lo`.
    #[inline]
    pub fn range(&self, lo: usize, width: usize) -> u64 {
        debug_assert!(width > 0 && width <= BITS_PER_LIMB);
        debug_assert!(lo + width <= Self::CAPACITY_BITS);

        let limb = lo / BITS_PER_LIMB;
        let shift = lo % BITS_PER_LIMB;
        let mut value = self.limbs[limb] >> shift;
        if shift + width > BITS_PER_LIMB {
            value |= self.limbs[limb + 1] << (BITS_PER_LIMB - shift);
        }
        value & low_mask(width)
    }

    /// Writes the low `width` bits of `value` starting at bit `lo`.
    /// Higher bits of `value` are discarded.
    #[inline]
    pub fn set_range(&mut self, lo: usize, width: usize, value: u64) {
        debug_assert!(width > 0 && width <= BITS_PER_LIMB);
        debug_assert!(lo + width <= Self::CAPACITY_BITS);

        let mask = low_mask(width);
        let value = value & mask;
        let limb = lo / BITS_PER_LIMB;
        let shift = lo % BITS_PER_LIMB;

        self.limbs[limb] &= !(mask << shift);
        self.limbs[limb] |= value << shift;

        if shift + width > BITS_PER_LIMB {
            let spill = shift + width - BITS_PER_LIMB;
            let next = &mut self.limbs[limb + 1];
            *next &= !low_mask(spill);
            *next |= value >> (BITS_PER_LIMB - shift);
        }
    }
}

/// How a [`PackedWord`] is divided into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackLayout {
    pub field_bits: usize,
    pub fields: usize,
}

impl PackLayout {
    pub const fn new(field_bits: usize, fields: usize) -> Self {
        Self { field_bits, fields }
    }

    pub const fn total_bits(&self) -> usize {
        self.field_bits * self.fields
    }

    /// Whether the layout can be represented by a single word.
    pub fn fits(&self) -> bool {
        self.field_bits > 0
            && self.field_bits <= BITS_PER_LIMB
            && self.fields > 0
            && self.total_bits() <= PackedWord::CAPACITY_BITS
    }

    /// Largest value a field can hold.
    pub fn max_value(&self) -> u64 {
        low_mask(self.field_bits)
    }

    #[inline]
    pub fn get(&self, word: &PackedWord, field: usize) -> u64 {
        debug_assert!(field < self.fields);
        word.range(field * self.field_bits, self.field_bits)
    }

    #[inline]
    pub fn set(&self, word: &mut PackedWord, field: usize, value: u64) {
        debug_assert!(field < self.fields);
        word.set_range(field * self.field_bits, self.field_bits, value);
    }

    /// Packs up to `fields` values, lowest field first. Missing fields stay zero.
    pub fn pack<I: IntoIterator<Item = u64>>(&self, values: I) -> PackedWord {
        let mut word = PackedWord::ZERO;
        for (field, value) in values.into_iter().enumerate() {
            debug_assert!(field < self.fields, "too many values for layout");
            self.set(&mut word, field, value);
        }
        word
    }

    pub fn unpack(self, word: PackedWord) -> impl Iterator<Item = u64> {
        (0..self.fields).map(move |field| self.get(&word, field))
    }
}
