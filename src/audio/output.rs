use crate::error::{CoreError, CoreResult};

use super::voice::{Voice, VoiceId};

/// Where voices end up. Implementations must tolerate `stop` for ids they
/// never saw or already released.
pub trait AudioOutput: Send + Sync {
    fn start(&self, id: VoiceId, voice: Voice) -> CoreResult<()>;

    fn stop(&self, id: VoiceId);

    fn stop_all(&self);

    fn is_available(&self) -> bool {
        true
    }
}

/// Output used when no device is usable: every voice is dropped unheard.
pub struct NullOutput {
    reason: String,
}

impl NullOutput {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioOutput for NullOutput {
    fn start(&self, _id: VoiceId, _voice: Voice) -> CoreResult<()> {
        Err(CoreError::UnsupportedAudioSink(self.reason.clone()))
    }

    fn stop(&self, _id: VoiceId) {}

    fn stop_all(&self) {}

    fn is_available(&self) -> bool {
        false
    }
}

/// The platform output when built with `playback`, silence otherwise.
pub fn default_output() -> Box<dyn AudioOutput> {
    #[cfg(feature = "playback")]
    {
        Box::new(rodio_output::RodioOutput::new())
    }

    #[cfg(not(feature = "playback"))]
    {
        Box::new(NullOutput::new("built without the `playback` feature"))
    }
}

#[cfg(feature = "playback")]
pub use rodio_output::RodioOutput;

#[cfg(feature = "playback")]
mod rodio_output {
    use rodio::{OutputStream, Sink};
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Mutex, PoisonError,
    };
    use std::thread;

    use super::AudioOutput;
    use crate::audio::voice::{Voice, VoiceId};
    use crate::error::{CoreError, CoreResult};

    const ENABLE_LOGS: bool = true;

    use crate::{log_error, log_info};

    enum OutputCommand {
        Start { id: VoiceId, voice: Voice },
        Stop(VoiceId),
        StopAll,
    }

    /// rodio output living on a dedicated thread, since `OutputStream` is not
    /// `Send`. The thread and device are opened on first use and kept for the
    /// lifetime of the process; each voice gets its own `Sink`.
    pub struct RodioOutput {
        tx: Mutex<Option<Sender<OutputCommand>>>,
        unavailable: AtomicBool,
        failure: Mutex<Option<String>>,
    }

    impl RodioOutput {
        pub fn new() -> Self {
            Self {
                tx: Mutex::new(None),
                unavailable: AtomicBool::new(false),
                failure: Mutex::new(None),
            }
        }

        fn unsupported(&self) -> CoreError {
            let reason = self
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_else(|| "audio output failed to open".to_string());
            CoreError::UnsupportedAudioSink(reason)
        }

        fn ensure_thread(&self) -> CoreResult<Sender<OutputCommand>> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(self.unsupported());
            }

            let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<OutputCommand>();
            let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

            thread::Builder::new()
                .name("audio-output".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(opened) => {
                            let _ = ready_tx.send(Ok(()));
                            opened
                        }
                        Err(e) => {
                            let _ = ready_tx
                                .send(Err(format!("Failed to create audio output stream: {e}")));
                            return;
                        }
                    };
                    let mut sinks: HashMap<VoiceId, Sink> = HashMap::new();

                    while let Ok(cmd) = rx.recv() {
                        sinks.retain(|_, sink| !sink.empty());
                        match cmd {
                            OutputCommand::Start { id, voice } => match Sink::try_new(&handle) {
                                Ok(sink) => {
                                    sink.append(voice);
                                    sinks.insert(id, sink);
                                }
                                Err(e) => log_error!("Failed to create audio sink: {e}"),
                            },
                            OutputCommand::Stop(id) => {
                                if let Some(sink) = sinks.remove(&id) {
                                    sink.stop();
                                }
                            }
                            OutputCommand::StopAll => {
                                for (_, sink) in sinks.drain() {
                                    sink.stop();
                                }
                            }
                        }
                    }
                })
                .map_err(|e| CoreError::UnsupportedAudioSink(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    log_info!("audio output opened");
                    *guard = Some(tx.clone());
                    Ok(tx)
                }
                Ok(Err(reason)) => {
                    self.unavailable.store(true, Ordering::SeqCst);
                    *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
                    Err(self.unsupported())
                }
                Err(_) => {
                    self.unavailable.store(true, Ordering::SeqCst);
                    Err(self.unsupported())
                }
            }
        }

        fn send_if_running(&self, cmd: OutputCommand) {
            let tx = self
                .tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(tx) = tx {
                let _ = tx.send(cmd);
            }
        }
    }

    impl Default for RodioOutput {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioOutput for RodioOutput {
        fn start(&self, id: VoiceId, voice: Voice) -> CoreResult<()> {
            let tx = self.ensure_thread()?;
            tx.send(OutputCommand::Start { id, voice })
                .map_err(|e| CoreError::UnsupportedAudioSink(e.to_string()))
        }

        fn stop(&self, id: VoiceId) {
            self.send_if_running(OutputCommand::Stop(id));
        }

        fn stop_all(&self) {
            self.send_if_running(OutputCommand::StopAll);
        }

        fn is_available(&self) -> bool {
            !self.unavailable.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{GainStage, SoundKind};
    use assert_matches::assert_matches;

    #[test]
    fn null_output_reports_unsupported_sink() {
        let output = NullOutput::new("no device");
        let voice = Voice::new(
            SoundKind::Bell,
            Box::new(std::iter::empty()),
            GainStage::default(),
            None,
        );
        assert!(!output.is_available());
        assert_matches!(
            output.start(1, voice),
            Err(CoreError::UnsupportedAudioSink(reason)) if reason == "no device"
        );
        output.stop(1);
        output.stop_all();
    }
}
