//! Uniform random pairing.
//!
//! Shuffle, then take adjacent twos. An odd count leaves the last shuffled
//! element unpaired. No compatibility weighting happens here.

use rand::seq::SliceRandom;
use rand::RngCore;

#[derive(Debug, Clone, PartialEq)]
pub struct PairPlan<T> {
    pub pairs: Vec<(T, T)>,
    pub leftover: Option<T>,
}

impl<T> PairPlan<T> {
    /// Number of elements the plan accounts for.
    pub fn covered(&self) -> usize {
        self.pairs.len() * 2 + usize::from(self.leftover.is_some())
    }
}

pub fn pair<T>(mut candidates: Vec<T>, rng: &mut dyn RngCore) -> PairPlan<T> {
    candidates.shuffle(rng);
    let leftover = if candidates.len() % 2 == 1 {
        candidates.pop()
    } else {
        None
    };
    let mut pairs = Vec::with_capacity(candidates.len() / 2);
    let mut iter = candidates.into_iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        pairs.push((a, b));
    }
    PairPlan { pairs, leftover }
}
