use std::time::Duration;

use super::dsp::{Biquad, Oscillator, ParamAutomation};
use super::SAMPLE_RATE;

pub const DEFAULT_BOWL_FREQUENCY: f32 = 200.0;
const GOLDEN_RATIO: f64 = 1.618;

/// Singing bowl: a warm low-passed cluster with a slow swell and long release.
pub struct BowlTone {
    sample_rate: u32,
    index: u64,
    total_samples: u64,
    frequencies: [f64; 3],
    partials: [Oscillator; 3],
    warmth: Biquad,
    envelope: ParamAutomation,
}

impl BowlTone {
    pub fn new(frequency: f32, duration: Duration) -> Self {
        let sample_rate = SAMPLE_RATE;
        let f = f64::from(frequency);
        let end = duration.as_secs_f64();

        Self {
            sample_rate,
            index: 0,
            total_samples: (end * f64::from(sample_rate)).round() as u64,
            frequencies: [f, f * GOLDEN_RATIO, f * 2.5],
            partials: [
                Oscillator::sine(sample_rate),
                Oscillator::sine(sample_rate),
                Oscillator::triangle(sample_rate),
            ],
            warmth: Biquad::lowpass(sample_rate, f * 3.0, 2.0),
            envelope: ParamAutomation::new(0.0)
                .set_value_at(0.0, 0.0)
                .linear_ramp_to(1.0, 0.5)
                .linear_ramp_to(0.8, end / 2.0)
                .exponential_ramp_to(0.001, end),
        }
    }
}

impl Iterator for BowlTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total_samples {
            return None;
        }
        let t = self.index as f64 / f64::from(self.sample_rate);
        self.index += 1;

        let mixed: f32 = self
            .partials
            .iter_mut()
            .zip(self.frequencies)
            .map(|(partial, frequency)| partial.next_sample(frequency))
            .sum();

        Some(self.warmth.process(mixed) * self.envelope.value_at(t) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_peak(samples: &[f32], from_secs: f64, to_secs: f64) -> f32 {
        let sr = f64::from(SAMPLE_RATE);
        samples[(from_secs * sr) as usize..(to_secs * sr) as usize]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn swells_slowly_and_releases() {
        let samples: Vec<f32> = BowlTone::new(DEFAULT_BOWL_FREQUENCY, Duration::from_secs(3)).collect();
        assert_eq!(samples.len(), SAMPLE_RATE as usize * 3);

        let onset = window_peak(&samples, 0.0, 0.05);
        let body = window_peak(&samples, 0.5, 1.5);
        let tail = window_peak(&samples, 2.95, 3.0);
        assert!(body > onset * 4.0, "onset {onset} body {body}");
        assert!(tail < body / 10.0, "tail {tail} body {body}");
    }
}
