use std::time::Duration;

use super::dsp::{Biquad, Oscillator, ParamAutomation};
use super::SAMPLE_RATE;

pub const DEFAULT_BELL_FREQUENCY: f32 = 800.0;
/// How long the timer's own bells ring.
pub const BELL_DURATION_MS: u64 = 2000;

/// Struck bell: an inharmonic pair of sine partials with a fast attack and a
/// long exponential decay, both partials gliding slightly flat as it fades.
pub struct BellTone {
    sample_rate: u32,
    index: u64,
    total_samples: u64,
    fundamental: Oscillator,
    overtone: Oscillator,
    resonator: Biquad,
    envelope: ParamAutomation,
    fundamental_glide: ParamAutomation,
    overtone_glide: ParamAutomation,
}

impl BellTone {
    pub fn new(frequency: f32, duration: Duration) -> Self {
        let sample_rate = SAMPLE_RATE;
        let f = f64::from(frequency);
        let end = duration.as_secs_f64();

        Self {
            sample_rate,
            index: 0,
            total_samples: (end * f64::from(sample_rate)).round() as u64,
            fundamental: Oscillator::sine(sample_rate),
            overtone: Oscillator::sine(sample_rate),
            resonator: Biquad::bandpass(sample_rate, f, 10.0),
            envelope: ParamAutomation::new(0.0)
                .set_value_at(0.0, 0.0)
                .linear_ramp_to(0.8, 0.01)
                .exponential_ramp_to(0.3, 0.1)
                .exponential_ramp_to(0.001, end),
            fundamental_glide: ParamAutomation::new(f)
                .set_value_at(f, 0.0)
                .exponential_ramp_to(f * 0.98, end),
            overtone_glide: ParamAutomation::new(f * 2.1)
                .set_value_at(f * 2.1, 0.0)
                .exponential_ramp_to(f * 2.05, end),
        }
    }
}

impl Iterator for BellTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total_samples {
            return None;
        }
        let t = self.index as f64 / f64::from(self.sample_rate);
        self.index += 1;

        // Only the fundamental passes the resonator; the overtone is heard dry.
        let fundamental = self
            .fundamental
            .next_sample(self.fundamental_glide.value_at(t));
        let ringing = self.resonator.process(fundamental);
        let overtone = self.overtone.next_sample(self.overtone_glide.value_at(t));

        Some((ringing + overtone) * self.envelope.value_at(t) as f32)
    }
}
