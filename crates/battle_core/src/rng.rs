//! Seeded randomness for combat rolls.
//!
//! Every random decision in a battle (dodge, damage spread, cooldown spread,
//! spawn jitter, knockback direction fallback) draws from one [`BattleRng`]
//! owned by the [`BattleWorld`](crate::simulation::BattleWorld). Values are
//! produced directly as [`Fixed`] from 32 random bits, so a seed fully
//! determines a battle.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::math::{Fixed, Vec2Fixed};

/// Deterministic random source for the simulation.
#[derive(Debug, Clone)]
pub struct BattleRng {
    inner: ChaCha8Rng,
}

impl BattleRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform value in `[0, 1)`.
    pub fn unit(&mut self) -> Fixed {
        // I32F32 has exactly 32 fractional bits
        Fixed::from_bits(i64::from(self.inner.gen::<u32>()))
    }

    /// Uniform value in `[min, max)`. Returns `min` for an empty range.
    pub fn range(&mut self, min: Fixed, max: Fixed) -> Fixed {
        if max <= min {
            return min;
        }
        min + (max - min) * self.unit()
    }

    /// Uniform value in `[-1, 1)`.
    pub fn signed_unit(&mut self) -> Fixed {
        self.range(-Fixed::ONE, Fixed::ONE)
    }

    /// Multiplicative spread factor in `[1 - percent, 1 + percent)`.
    ///
    /// Returns exactly one when `percent` is zero or negative, without
    /// consuming randomness.
    pub fn spread(&mut self, percent: Fixed) -> Fixed {
        if percent <= Fixed::ZERO {
            return Fixed::ONE;
        }
        self.range(Fixed::ONE - percent, Fixed::ONE + percent)
    }

    /// Bernoulli trial: `true` with probability `chance`.
    pub fn roll(&mut self, chance: Fixed) -> bool {
        if chance <= Fixed::ZERO {
            return false;
        }
        self.unit() < chance
    }

    /// Random unit-length direction on the ground plane.
    pub fn ground_direction(&mut self) -> Vec2Fixed {
        for _ in 0..8 {
            let candidate = Vec2Fixed::new(self.signed_unit(), self.signed_unit());
            if candidate.length_squared() > Fixed::from_num(0.01) {
                return candidate.normalize();
            }
        }
        Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)
    }

    /// Position in the underlying stream, used for state hashing.
    #[must_use]
    pub fn stream_position(&self) -> u128 {
        self.inner.get_word_pos()
    }
}
