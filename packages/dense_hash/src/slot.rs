//! Metadata slot layout and fingerprint arithmetic.
//!
//! A fingerprint packs the probe distance of an entry (in units of [`DISTANCE_UNIT`]) above an
//! 8-bit tag taken from the mixed hash. An entry in its home slot has distance 1, so every
//! occupied slot has a fingerprint of at least `DISTANCE_UNIT` and zero means "empty".
//!
//! Comparing fingerprints as plain integers therefore compares probe distances first, which is
//! what robin-hood probing needs: a probe that carries a larger fingerprint than the slot it is
//! looking at is "poorer" than the resident entry.

/// One step of probe distance in a fingerprint.
pub(crate) const DISTANCE_UNIT: u32 = 1 << 8;

/// Fingerprints at or above this belong to entries displaced from their home slot.
pub(crate) const DISPLACED: u32 = DISTANCE_UNIT << 1;

const TAG_MASK: u32 = DISTANCE_UNIT - 1;

// 2^32 divided by the golden ratio; odd, so the multiplication is a bijection.
const MIXER: u32 = 0x9E37_79B9;

/// Folds a 64-bit hash to 32 bits and multiplies it by a fixed odd constant.
///
/// The tag is taken from the low bits and the home slot from the high bits of the result, so
/// the multiplication keeps the two from being correlated.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "folding to 32 bits is intended, both halves are mixed in first"
)]
pub(crate) fn mix(hash: u64) -> u32 {
    let folded = (hash ^ (hash >> 32)) as u32;
    folded.wrapping_mul(MIXER)
}

/// The fingerprint of an entry with the given mixed hash when it sits in its home slot.
#[inline]
pub(crate) fn home_fingerprint(mixed: u32) -> u32 {
    DISTANCE_UNIT | (mixed & TAG_MASK)
}

/// The fingerprint one probe step further from home.
///
/// # Panics
///
/// Panics if the probe distance no longer fits in the fingerprint. This takes more than
/// 16 million consecutive colliding entries and indicates a degenerate hash function.
#[inline]
pub(crate) fn next_fingerprint(fingerprint: u32) -> u32 {
    fingerprint
        .checked_add(DISTANCE_UNIT)
        .expect("probe distance exceeds 2^24 slots; the key hash function is degenerate")
}

/// One entry of the metadata table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Slot {
    /// Distance and tag; zero for an empty slot.
    pub(crate) fingerprint: u32,

    /// Position of the entry in the dense key and value arrays.
    pub(crate) value_index: u32,
}

impl Slot {
    pub(crate) const EMPTY: Self = Self {
        fingerprint: 0,
        value_index: 0,
    };

    #[inline]
    pub(crate) fn is_empty(self) -> bool {
        self.fingerprint == 0
    }

    /// Probe distance, where 1 is the home slot and 0 means empty.
    #[inline]
    pub(crate) fn distance(self) -> u32 {
        self.fingerprint >> 8
    }

    #[inline]
    pub(crate) fn tag(self) -> u32 {
        self.fingerprint & TAG_MASK
    }

    #[inline]
    pub(crate) fn value_index(self) -> usize {
        self.value_index as usize
    }
}
