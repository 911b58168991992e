use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dsp::indexed_sine;

/// Frequency of the slow swell riding on top of the surf, in Hz.
const SWELL_HZ: f64 = 0.1;

/// Pink noise via Paul Kellet's refined filter: six leaky integrators plus a
/// one-sample delayed tap, giving roughly -3 dB per octave.
#[derive(Debug, Clone, Default)]
pub struct PinkNoise {
    b0: f32,
    b1: f32,
    b2: f32,
    b3: f32,
    b4: f32,
    b5: f32,
    b6: f32,
}

impl PinkNoise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sample(&mut self, white: f32) -> f32 {
        self.b0 = 0.99886 * self.b0 + white * 0.0555179;
        self.b1 = 0.99332 * self.b1 + white * 0.0750759;
        self.b2 = 0.96900 * self.b2 + white * 0.1538520;
        self.b3 = 0.86650 * self.b3 + white * 0.3104856;
        self.b4 = 0.55000 * self.b4 + white * 0.5329522;
        self.b5 = -0.7616 * self.b5 - white * 0.0168980;
        let pink =
            self.b0 + self.b1 + self.b2 + self.b3 + self.b4 + self.b5 + self.b6 + white * 0.5362;
        self.b6 = white * 0.115926;
        pink
    }
}

/// Ocean surf: quiet pink noise over a very slow swell.
pub struct OceanSurf {
    sample_rate: u32,
    index: u64,
    pink: PinkNoise,
    rng: StdRng,
}

impl OceanSurf {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    pub fn with_rng(sample_rate: u32, rng: StdRng) -> Self {
        Self {
            sample_rate,
            index: 0,
            pink: PinkNoise::new(),
            rng,
        }
    }
}

impl Iterator for OceanSurf {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        let pink = self.pink.next_sample(white);
        let swell = indexed_sine(self.index, SWELL_HZ, self.sample_rate) * 0.3;
        self.index += 1;
        Some(pink * 0.1 + swell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pink_noise_follows_kellet_recurrence() {
        let mut pink = PinkNoise::new();
        let first = pink.next_sample(1.0);
        let expected_first =
            0.0555179 + 0.0750759 + 0.1538520 + 0.3104856 + 0.5329522 - 0.0168980 + 0.5362;
        assert!((first - expected_first).abs() < 1e-6);

        // Silence afterwards leaves only the decaying poles plus the delayed tap.
        let second = pink.next_sample(0.0);
        let expected_second = 0.99886 * 0.0555179
            + 0.99332 * 0.0750759
            + 0.96900 * 0.1538520
            + 0.86650 * 0.3104856
            + 0.55000 * 0.5329522
            + (-0.7616 * -0.0168980)
            + 0.115926;
        assert!((second - expected_second).abs() < 1e-6);
    }

    #[test]
    fn surf_carries_the_swell() {
        let sr = 20_000;
        let samples: Vec<f32> = OceanSurf::with_rng(sr, StdRng::seed_from_u64(7))
            .take(sr as usize * 10)
            .collect();

        // First half of the 10 s swell period sits above zero on average.
        let rising: f32 = samples[..sr as usize * 5].iter().sum::<f32>() / (sr * 5) as f32;
        let falling: f32 = samples[sr as usize * 5..].iter().sum::<f32>() / (sr * 5) as f32;
        assert!(rising > 0.1, "rising mean {rising}");
        assert!(falling < -0.1, "falling mean {falling}");
    }
}
