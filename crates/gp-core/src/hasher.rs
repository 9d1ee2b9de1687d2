use crate::constants::{DY_SHIFT, MAX_STEP, MIX_CURRENT, MIX_PREVIOUS};
use crate::position::Displacement;

/// Opaque token identifier.
pub type Token = u32;

/// Maps a two-token context window plus a column seed to a bounded
/// displacement.
///
/// The mix is `current * 31 + previous * 17 + seed` in wrapping `u32`
/// arithmetic. `dx` reduces the low bits, `dy` reduces the bits above
/// `DY_SHIFT`, each onto `[-max_step, max_step]`. Pure and total: every
/// input yields a result, identically across runs and platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextHasher {
    max_step: u32,
}

impl Default for ContextHasher {
    fn default() -> Self {
        Self { max_step: MAX_STEP }
    }
}

impl ContextHasher {
    /// Largest step whose span `2 * max_step + 1` still fits a `u32`.
    pub const MAX_SUPPORTED_STEP: u32 = (u32::MAX - 1) / 2;

    /// `max_step` is clamped into `1..=MAX_SUPPORTED_STEP`; config
    /// validation rejects 0 before it gets here.
    pub fn new(max_step: u32) -> Self {
        Self {
            max_step: max_step.clamp(1, Self::MAX_SUPPORTED_STEP),
        }
    }

    pub fn max_step(&self) -> u32 {
        self.max_step
    }

    /// Number of distinct values per axis: `2 * max_step + 1`.
    pub fn span(&self) -> u32 {
        2 * self.max_step + 1
    }

    /// The 32-bit mixed value for a context window.
    pub fn mix(previous: Token, current: Token, seed: u32) -> u32 {
        current
            .wrapping_mul(MIX_CURRENT)
            .wrapping_add(previous.wrapping_mul(MIX_PREVIOUS))
            .wrapping_add(seed)
    }

    pub fn displacement(&self, previous: Token, current: Token, seed: u32) -> Displacement {
        let mixed = Self::mix(previous, current, seed);
        let span = self.span();
        let m = self.max_step as i64;
        let dx = (mixed % span) as i64 - m;
        let dy = ((mixed >> DY_SHIFT) % span) as i64 - m;
        Displacement::new(dx as i32, dy as i32)
    }

    /// Hash a context window given as a slice; the last two tokens are used.
    /// Windows shorter than two tokens carry no movement.
    pub fn hash_window(&self, window: &[Token], seed: u32) -> Option<Displacement> {
        match window {
            [.., previous, current] => Some(self.displacement(*previous, *current, seed)),
            _ => None,
        }
    }
}

/// Reinterpret a signed seed as the `u32` the mix consumes (two's complement,
/// equivalent to masking to 32 bits).
pub fn seed_from_i64(seed: i64) -> u32 {
    seed as u32
}
