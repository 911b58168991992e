use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dsp::indexed_sine;

const BUBBLE_PROBABILITY: f64 = 0.005;
const BUBBLE_HZ: f64 = 800.0;

/// Running water: two steady tones under broadband turbulence, with the odd
/// high bubble popping through.
pub struct StreamFlow {
    sample_rate: u32,
    index: u64,
    rng: StdRng,
}

impl StreamFlow {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    pub fn with_rng(sample_rate: u32, rng: StdRng) -> Self {
        Self {
            sample_rate,
            index: 0,
            rng,
        }
    }
}

impl Iterator for StreamFlow {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.index;
        self.index += 1;

        let mut sample = indexed_sine(i, 220.0, self.sample_rate) * 0.1
            + indexed_sine(i, 440.0, self.sample_rate) * 0.05
            + self.rng.gen_range(-1.0f32..1.0) * 0.2;

        if self.rng.gen_bool(BUBBLE_PROBABILITY) {
            sample += indexed_sine(i, BUBBLE_HZ, self.sample_rate) * 0.3;
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SAMPLE_RATE;

    #[test]
    fn stays_within_mixed_amplitude() {
        let samples: Vec<f32> = StreamFlow::with_rng(SAMPLE_RATE, StdRng::seed_from_u64(3))
            .take(SAMPLE_RATE as usize)
            .collect();
        assert!(samples.iter().all(|s| s.abs() <= 0.1 + 0.05 + 0.2 + 0.3 + 1e-6));

        let energy = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        assert!(energy > 0.01, "mean energy {energy}");
    }
}
