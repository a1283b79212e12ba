//! **VoiceOutput**: audio playback on a dedicated thread.
//!
//! `rodio::OutputStream` is not `Send`, so one thread owns the device and takes
//! commands over a channel. Each utterance gets its own `Sink`; its completion
//! is reported through a oneshot so async callers can await the end of speech.
//! `suspend` pauses the current sink and discards whatever is still queued.

use crate::error::{VoiceError, VoiceResult};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resolves when an utterance finished playing, failed, or was discarded.
pub type PlaybackDone = oneshot::Receiver<VoiceResult<()>>;

enum PlaybackCommand {
    Play {
        audio: Vec<u8>,
        done: oneshot::Sender<VoiceResult<()>>,
    },
    Suspend,
    Resume,
    Shutdown,
}

/// Handle to the playback thread.
pub struct VoiceOutput {
    commands: mpsc::Sender<PlaybackCommand>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl VoiceOutput {
    /// Open the default output device on a new playback thread.
    pub fn new() -> VoiceResult<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let playing = Arc::new(AtomicBool::new(false));
        let thread_playing = Arc::clone(&playing);
        let thread = std::thread::Builder::new()
            .name("waypoint-playback".to_string())
            .spawn(move || playback_loop(rx, ready_tx, thread_playing))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("VoiceOutput: playback thread ready");
                Ok(Self {
                    commands,
                    playing,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(VoiceError::ChannelReceive(
                "playback thread exited before reporting readiness".to_string(),
            )),
        }
    }

    /// Queue encoded audio (MP3/WAV). Empty audio completes immediately.
    pub fn play(&self, audio: Vec<u8>) -> VoiceResult<PlaybackDone> {
        let (done, rx) = oneshot::channel();
        if audio.is_empty() {
            let _ = done.send(Ok(()));
            return Ok(rx);
        }
        self.commands
            .send(PlaybackCommand::Play { audio, done })
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))?;
        Ok(rx)
    }

    /// Pause the current utterance and drop everything still queued.
    pub fn suspend(&self) {
        self.send(PlaybackCommand::Suspend);
    }

    /// Continue the paused utterance and accept new audio again.
    pub fn resume(&self) {
        self.send(PlaybackCommand::Resume);
    }

    /// Whether an utterance is currently loaded in a sink.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn send(&self, command: PlaybackCommand) {
        if self.commands.send(command).is_err() {
            warn!("VoiceOutput: playback thread is gone");
        }
    }
}

impl Drop for VoiceOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(PlaybackCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

type Queued = (Vec<u8>, oneshot::Sender<VoiceResult<()>>);

fn playback_loop(
    rx: mpsc::Receiver<PlaybackCommand>,
    ready: mpsc::SyncSender<VoiceResult<()>>,
    playing: Arc<AtomicBool>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(VoiceError::Playback(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut queue: VecDeque<Queued> = VecDeque::new();
    let mut current: Option<(Sink, oneshot::Sender<VoiceResult<()>>)> = None;
    let mut suspended = false;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(PlaybackCommand::Play { audio, done }) => queue.push_back((audio, done)),
            Ok(PlaybackCommand::Suspend) => {
                suspended = true;
                if let Some((sink, _)) = &current {
                    sink.pause();
                }
                let dropped = queue.len();
                for (_, done) in queue.drain(..) {
                    let _ = done.send(Err(VoiceError::Discarded));
                }
                debug!(dropped, "VoiceOutput: suspended");
            }
            Ok(PlaybackCommand::Resume) => {
                suspended = false;
                if let Some((sink, _)) = &current {
                    sink.play();
                }
                debug!("VoiceOutput: resumed");
            }
            Ok(PlaybackCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if current.as_ref().is_some_and(|(sink, _)| sink.empty()) {
            if let Some((_, done)) = current.take() {
                let _ = done.send(Ok(()));
            }
        }

        if current.is_none() && !suspended {
            if let Some((audio, done)) = queue.pop_front() {
                match start_sink(&handle, audio) {
                    Ok(sink) => current = Some((sink, done)),
                    Err(e) => {
                        let _ = done.send(Err(e));
                    }
                }
            }
        }

        playing.store(current.is_some(), Ordering::SeqCst);
    }

    if let Some((sink, done)) = current.take() {
        sink.stop();
        let _ = done.send(Err(VoiceError::Discarded));
    }
    for (_, done) in queue.drain(..) {
        let _ = done.send(Err(VoiceError::Discarded));
    }
    playing.store(false, Ordering::SeqCst);
    info!("VoiceOutput: playback thread stopped");
}

fn start_sink(handle: &OutputStreamHandle, audio: Vec<u8>) -> VoiceResult<Sink> {
    let source =
        Decoder::new(Cursor::new(audio)).map_err(|e| VoiceError::Decode(e.to_string()))?;
    let sink = Sink::try_new(handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
    sink.append(source.convert_samples::<f32>());
    Ok(sink)
}
