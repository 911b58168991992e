//! Building blocks shared by the synthesized voices: biquad filters,
//! phase-accumulating oscillators and parameter automation curves.
//!
//! Conventions follow the Web Audio API so a voice renders the same curve
//! whatever backend eventually plays it.

use std::f64::consts::{PI, TAU};

/// Web Audio's default `Q` for filters that do not set one.
pub const DEFAULT_Q: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandPass,
}

/// Second-order IIR filter (RBJ cookbook, Direct Form I).
///
/// For low/high-pass `q` is a resonance in dB; for band-pass it is the
/// plain quality factor.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    pub fn new(kind: FilterKind, sample_rate: u32, frequency: f64, q: f64) -> Self {
        let nyquist = f64::from(sample_rate) / 2.0;
        let frequency = frequency.clamp(1.0, nyquist - 1.0);
        let w0 = TAU * frequency / f64::from(sample_rate);
        let (sin_w0, cos_w0) = w0.sin_cos();

        let alpha = match kind {
            FilterKind::LowPass | FilterKind::HighPass => {
                sin_w0 / (2.0 * 10f64.powf(q / 20.0))
            }
            FilterKind::BandPass => sin_w0 / (2.0 * q.max(1e-4)),
        };

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::HighPass => {
                let b1 = 1.0 + cos_w0;
                (b1 / 2.0, -b1, b1 / 2.0)
            }
            FilterKind::BandPass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn lowpass(sample_rate: u32, frequency: f64, q: f64) -> Self {
        Self::new(FilterKind::LowPass, sample_rate, frequency, q)
    }

    pub fn highpass(sample_rate: u32, frequency: f64, q: f64) -> Self {
        Self::new(FilterKind::HighPass, sample_rate, frequency, q)
    }

    pub fn bandpass(sample_rate: u32, frequency: f64, q: f64) -> Self {
        Self::new(FilterKind::BandPass, sample_rate, frequency, q)
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let x = f64::from(input);
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
}

/// Free-running oscillator whose frequency may change every sample.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: u32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            sample_rate: f64::from(sample_rate),
        }
    }

    pub fn sine(sample_rate: u32) -> Self {
        Self::new(Waveform::Sine, sample_rate)
    }

    pub fn triangle(sample_rate: u32) -> Self {
        Self::new(Waveform::Triangle, sample_rate)
    }

    pub fn next_sample(&mut self, frequency: f64) -> f32 {
        let p = self.phase;
        let value = match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
        };
        self.phase = (self.phase + frequency / self.sample_rate).fract();
        value as f32
    }
}

/// Sine of a fixed frequency evaluated at an absolute sample index.
pub fn indexed_sine(index: u64, frequency: f64, sample_rate: u32) -> f32 {
    (2.0 * PI * index as f64 * frequency / f64::from(sample_rate)).sin() as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Set,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    time: f64,
    value: f64,
    ramp: Ramp,
}

/// A value over time described by set/ramp events, like an `AudioParam`.
///
/// Ramps run from the previous event to their own time; after the last event
/// the value holds. Exponential ramps between values of different sign (or
/// touching zero) hold the start value instead, as Web Audio does.
#[derive(Debug, Clone)]
pub struct ParamAutomation {
    initial: f64,
    points: Vec<Breakpoint>,
}

impl ParamAutomation {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            points: Vec::new(),
        }
    }

    pub fn set_value_at(self, value: f64, time: f64) -> Self {
        self.push(value, time, Ramp::Set)
    }

    pub fn linear_ramp_to(self, value: f64, time: f64) -> Self {
        self.push(value, time, Ramp::Linear)
    }

    pub fn exponential_ramp_to(self, value: f64, time: f64) -> Self {
        self.push(value, time, Ramp::Exponential)
    }

    fn push(mut self, value: f64, time: f64, ramp: Ramp) -> Self {
        let time = time.max(0.0);
        let at = self.points.partition_point(|point| point.time <= time);
        self.points.insert(at, Breakpoint { time, value, ramp });
        self
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let next = self.points.partition_point(|point| point.time <= time);
        let (t0, v0) = match next.checked_sub(1) {
            Some(previous) => (self.points[previous].time, self.points[previous].value),
            None => (0.0, self.initial),
        };

        let Some(target) = self.points.get(next) else {
            return v0;
        };

        let span = target.time - t0;
        if span <= 0.0 {
            return v0;
        }
        let progress = ((time - t0) / span).clamp(0.0, 1.0);

        match target.ramp {
            Ramp::Set => v0,
            Ramp::Linear => v0 + (target.value - v0) * progress,
            Ramp::Exponential => {
                if v0 == 0.0 || target.value == 0.0 || (v0 < 0.0) != (target.value < 0.0) {
                    v0
                } else {
                    v0 * (target.value / v0).powf(progress)
                }
            }
        }
    }
}
