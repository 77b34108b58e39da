//! Seedable, named random number streams.
//!
//! Every source of randomness in the simulation (initial placement, infection seeding,
//! activation order, movement, mortality and transmission) draws from its own stream. A stream
//! is keyed by a zero-sized type declared with [`define_rng!`] and seeded from the base seed
//! plus a hash of the type's name, so adding draws to one concern never shifts the numbers
//! another concern sees.
mod macros;

use std::any::{Any, TypeId};

use log::trace;

pub use macros::define_rng;

use crate::hashing::{hash_str, HashMap};
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::seq::{IndexedRandom, SliceRandom};
use crate::rand::{Rng, RngCore, SeedableRng};

pub trait RngId: Copy + Clone + 'static {
    type RngType: SeedableRng + RngCore + 'static;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

/// The injectable handle through which all simulation randomness flows.
///
/// Two sources built with the same base seed hand out identical sequences for every stream.
pub struct RandomSource {
    base_seed: u64,
    rng_holders: HashMap<TypeId, RngHolder>,
}

impl RandomSource {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        trace!("initializing random source with seed {base_seed}");
        RandomSource {
            base_seed,
            rng_holders: HashMap::default(),
        }
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Sets a new base seed. Existing rngs are dropped so they get re-seeded on next use.
    pub fn reseed(&mut self, base_seed: u64) {
        self.base_seed = base_seed;
        self.rng_holders.clear();
    }

    /// Gets a mutable reference to the random number generator associated with the given
    /// [`RngId`]. If the rng has not been used before, one will be created from the base seed.
    fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let base_seed = self.base_seed;
        self.rng_holders
            .entry(TypeId::of::<R>())
            // Create a new rng holder if it doesn't exist yet
            .or_insert_with(|| {
                trace!("creating new RNG (seed={base_seed}) for {}", R::get_name());
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .expect("rng holder keyed by TypeId always holds that RngId's RngType")
    }

    /// Gets a random sample from the generator associated with the given [`RngId`] by
    /// applying the specified sampler function.
    pub fn sample<R: RngId, T>(
        &mut self,
        _rng_id: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        sampler(self.get_rng::<R>())
    }

    /// Gets a random boolean value which is true with probability `p`.
    /// `p` must lie in `[0, 1]`; configuration validation guarantees this for model rates.
    pub fn sample_bool<R: RngId>(&mut self, rng_id: R, p: f64) -> bool {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    /// Gets a random sample within the range provided by `range`.
    pub fn sample_range<R, S, T>(&mut self, rng_id: R, range: S) -> T
    where
        R: RngId,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    /// Picks one element of `items` uniformly at random, or `None` if it is empty.
    pub fn choose<R: RngId, T: Copy>(&mut self, rng_id: R, items: &[T]) -> Option<T> {
        self.sample(rng_id, |rng| items.choose(rng).copied())
    }

    /// Shuffles `items` in place.
    pub fn shuffle<R: RngId, T>(&mut self, rng_id: R, items: &mut [T]) {
        self.sample(rng_id, |rng| items.shuffle(rng));
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        RandomSource::new(0)
    }
}
