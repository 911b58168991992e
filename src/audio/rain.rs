use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DROPLET_PROBABILITY: f64 = 0.02;
const DROPLET_AMPLITUDE: f32 = 0.5;
const HISS_AMPLITUDE: f32 = 0.05;

/// Rain: sparse random droplets over a constant low hiss.
pub struct RainFall {
    rng: StdRng,
}

impl RainFall {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl Default for RainFall {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for RainFall {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let mut sample = 0.0;
        if self.rng.gen_bool(DROPLET_PROBABILITY) {
            sample = self.rng.gen_range(-1.0f32..1.0) * DROPLET_AMPLITUDE;
        }
        sample += self.rng.gen_range(-1.0f32..1.0) * HISS_AMPLITUDE;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn droplets_are_sparse_and_hiss_is_quiet() {
        let samples: Vec<f32> = RainFall::with_rng(StdRng::seed_from_u64(11))
            .take(100_000)
            .collect();

        assert!(samples.iter().all(|s| s.abs() <= DROPLET_AMPLITUDE + HISS_AMPLITUDE));

        // Anything above the hiss ceiling must be a droplet.
        let loud = samples.iter().filter(|s| s.abs() > HISS_AMPLITUDE).count();
        assert!(loud > 1_000 && loud < 2_200, "loud samples {loud}");
    }
}
