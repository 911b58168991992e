// Shared test double: an audio output that records what it was asked to
// play instead of touching a device.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use stillness_lib::audio::{AudioOutput, Voice, VoiceId};
use stillness_lib::{CoreError, CoreResult, SoundKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Start(VoiceId, SoundKind),
    Stop(VoiceId),
    StopAll,
}

#[derive(Clone)]
pub struct RecordingOutput {
    log: Arc<Mutex<Vec<OutputEvent>>>,
    available: bool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn starts_of(&self, kind: SoundKind) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, OutputEvent::Start(_, k) if *k == kind))
            .count()
    }

    pub fn boxed(&self) -> Box<dyn AudioOutput> {
        Box::new(self.clone())
    }
}

impl AudioOutput for RecordingOutput {
    fn start(&self, id: VoiceId, voice: Voice) -> CoreResult<()> {
        if !self.available {
            return Err(CoreError::UnsupportedAudioSink("test device unplugged".into()));
        }
        self.log
            .lock()
            .unwrap()
            .push(OutputEvent::Start(id, voice.kind()));
        Ok(())
    }

    fn stop(&self, id: VoiceId) {
        self.log.lock().unwrap().push(OutputEvent::Stop(id));
    }

    fn stop_all(&self) {
        self.log.lock().unwrap().push(OutputEvent::StopAll);
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
