use serde::Serialize;
use std::time::Duration;

use super::bell::{BellTone, DEFAULT_BELL_FREQUENCY};
use super::bowl::{BowlTone, DEFAULT_BOWL_FREQUENCY};
use super::dsp::{Biquad, DEFAULT_Q};
use super::ocean::OceanSurf;
use super::rain::RainFall;
use super::stream::StreamFlow;
use super::{GainStage, SoundKind, SAMPLE_RATE};

pub type VoiceId = u64;

/// Caller-facing reference to a playing (or finished) voice.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct VoiceHandle {
    pub id: VoiceId,
    pub kind: SoundKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Play the rendered length once and finish.
    Once,
    /// Wrap the rendered buffer forever.
    Loop,
}

/// Tunable synthesis parameters that are not part of a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub bell_frequency: f32,
    pub bowl_frequency: f32,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            bell_frequency: DEFAULT_BELL_FREQUENCY,
            bowl_frequency: DEFAULT_BOWL_FREQUENCY,
        }
    }
}

/// Records a noise generator into a fixed-length buffer on the first pass
/// and replays that buffer afterwards, so a loop wraps without a seam.
///
/// The buffer grows as the first pass plays; nothing is reserved up front.
pub struct LoopBuffer<G> {
    generator: G,
    buffer: Vec<f32>,
    length: usize,
    position: usize,
}

impl<G: Iterator<Item = f32>> LoopBuffer<G> {
    pub fn new(generator: G, length: usize) -> Self {
        Self {
            generator,
            buffer: Vec::new(),
            length,
            position: 0,
        }
    }
}

impl<G: Iterator<Item = f32>> Iterator for LoopBuffer<G> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.length == 0 {
            return None;
        }
        if self.position == self.length {
            self.position = 0;
        }

        let sample = match self.buffer.get(self.position) {
            Some(sample) => *sample,
            None => {
                let fresh = self.generator.next()?;
                self.buffer.push(fresh);
                fresh
            }
        };
        self.position += 1;
        Some(sample)
    }
}

/// Runs a sample stream through a filter.
pub struct Filtered<I> {
    input: I,
    filter: Biquad,
}

impl<I> Filtered<I> {
    pub fn new(input: I, filter: Biquad) -> Self {
        Self { input, filter }
    }
}

impl<I: Iterator<Item = f32>> Iterator for Filtered<I> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.input.next().map(|sample| self.filter.process(sample))
    }
}

/// The tone-shaping filter each noise texture is heard through.
pub fn texture_filter(kind: SoundKind, sample_rate: u32) -> Option<Biquad> {
    match kind {
        SoundKind::Ocean => Some(Biquad::lowpass(sample_rate, 1000.0, DEFAULT_Q)),
        SoundKind::Rain => Some(Biquad::highpass(sample_rate, 200.0, DEFAULT_Q)),
        SoundKind::Stream => Some(Biquad::bandpass(sample_rate, 400.0, 0.5)),
        SoundKind::Bell | SoundKind::Bowl => None,
    }
}

/// Builds the raw (unity gain) sample stream for one voice.
///
/// Tonal kinds are struck once and last `length`. Noise textures either
/// stream `length` of material straight from the generator, or record it once
/// and loop it.
pub fn synthesize(
    kind: SoundKind,
    length: Duration,
    playback: Playback,
    params: &SynthParams,
) -> Box<dyn Iterator<Item = f32> + Send> {
    let sample_rate = SAMPLE_RATE;
    let frames = (length.as_secs_f64() * f64::from(sample_rate)).round() as usize;

    match kind {
        SoundKind::Bell => Box::new(BellTone::new(params.bell_frequency, length)),
        SoundKind::Bowl => Box::new(BowlTone::new(params.bowl_frequency, length)),
        SoundKind::Ocean => textured(kind, OceanSurf::new(sample_rate), frames, playback),
        SoundKind::Rain => textured(kind, RainFall::new(), frames, playback),
        SoundKind::Stream => textured(kind, StreamFlow::new(sample_rate), frames, playback),
    }
}

fn textured<G>(
    kind: SoundKind,
    generator: G,
    frames: usize,
    playback: Playback,
) -> Box<dyn Iterator<Item = f32> + Send>
where
    G: Iterator<Item = f32> + Send + 'static,
{
    let source: Box<dyn Iterator<Item = f32> + Send> = match playback {
        Playback::Once => Box::new(generator.take(frames)),
        Playback::Loop => Box::new(LoopBuffer::new(generator, frames)),
    };
    match texture_filter(kind, SAMPLE_RATE) {
        Some(filter) => Box::new(Filtered::new(source, filter)),
        None => source,
    }
}

/// A synthesized sample stream bound to the shared gain stage.
///
/// This is what gets handed to the output: mono `f32` at [`SAMPLE_RATE`],
/// already scaled by master and per-kind volume.
pub struct Voice {
    kind: SoundKind,
    samples: Box<dyn Iterator<Item = f32> + Send>,
    gain: GainStage,
    total_duration: Option<Duration>,
}

impl Voice {
    pub fn new(
        kind: SoundKind,
        samples: Box<dyn Iterator<Item = f32> + Send>,
        gain: GainStage,
        total_duration: Option<Duration>,
    ) -> Self {
        Self {
            kind,
            samples,
            gain,
            total_duration,
        }
    }

    pub fn kind(&self) -> SoundKind {
        self.kind
    }

    /// `None` for loops.
    pub fn total_duration(&self) -> Option<Duration> {
        self.total_duration
    }
}

impl Iterator for Voice {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let gain = self.gain.effective(self.kind);
        self.samples
            .next()
            .map(|sample| (sample * gain).clamp(-1.0, 1.0))
    }
}

#[cfg(feature = "playback")]
impl rodio::Source for Voice {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        self.total_duration
    }
}
