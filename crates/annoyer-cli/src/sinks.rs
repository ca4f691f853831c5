//! Alarm sinks for the terminal.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use annoyer_core::{AlarmSink, Config};

const BELL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_RING_SECS: f64 = 86_400.0;

type AlarmSource = Box<dyn Source<Item = f32> + Send>;

fn ring_deadline(duration_secs: f64) -> Instant {
    let secs = if duration_secs.is_finite() {
        duration_secs.clamp(0.0, MAX_RING_SECS)
    } else {
        0.0
    };
    Instant::now() + Duration::from_secs_f64(secs)
}

/// Short beep followed by a pause, used when no sound file is configured.
fn tone() -> AlarmSource {
    Box::new(
        SineWave::new(880.0)
            .take_duration(Duration::from_millis(300))
            .amplify(0.5)
            .delay(Duration::from_millis(200)),
    )
}

fn decode(path: &Path) -> Result<AlarmSource, String> {
    let file = File::open(path).map_err(|e| format!("Cannot open {}: {e}", path.display()))?;
    let decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Cannot decode {}: {e}", path.display()))?;
    Ok(Box::new(decoder.convert_samples::<f32>()))
}

/// The configured sound, or the built-in tone if it cannot be decoded.
fn alarm_source(sound: Option<&Path>) -> AlarmSource {
    match sound.map(decode) {
        Some(Ok(source)) => source,
        Some(Err(e)) => {
            log::warn!("{e}; using the built-in tone");
            tone()
        }
        None => tone(),
    }
}

/// Rings the terminal bell once a second for the alarm duration.
#[derive(Debug, Default)]
pub struct TerminalBell {
    ringing_until: Option<Instant>,
    last_ring: Option<Instant>,
}

impl TerminalBell {
    fn ring(&mut self) {
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
        self.last_ring = Some(Instant::now());
    }
}

impl AlarmSink for TerminalBell {
    fn start_alarm(&mut self, duration_secs: f64) {
        self.ringing_until = Some(ring_deadline(duration_secs));
        self.ring();
    }

    fn stop_alarm(&mut self) {
        self.ringing_until = None;
        self.last_ring = None;
    }

    fn sustain(&mut self) {
        let Some(until) = self.ringing_until else {
            return;
        };
        let due = self.last_ring.map_or(true, |t| t.elapsed() >= BELL_INTERVAL);
        if due && Instant::now() < until {
            self.ring();
        }
    }
}

/// Plays the alarm on the default audio device, queueing the sound again
/// whenever it finishes until the alarm duration is over.
///
/// The output stream is opened on the first alarm and kept for the session.
/// Without an output device the terminal bell rings instead.
pub struct AudioAlarm {
    sound: Option<PathBuf>,
    volume: f32,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    ringing_until: Option<Instant>,
    fallback: TerminalBell,
}

impl AudioAlarm {
    pub fn new(sound: Option<&Path>, volume: f32) -> Self {
        Self {
            sound: sound.map(Path::to_path_buf),
            volume: volume.clamp(0.0, 1.0),
            output: None,
            sink: None,
            ringing_until: None,
            fallback: TerminalBell::default(),
        }
    }

    fn open_sink(&mut self) -> Result<Sink, String> {
        if self.output.is_none() {
            let output = OutputStream::try_default()
                .map_err(|e| format!("Failed to create audio output stream: {e}"))?;
            self.output = Some(output);
        }
        let Some((_, handle)) = self.output.as_ref() else {
            return Err("Audio output stream unavailable".to_string());
        };
        Sink::try_new(handle).map_err(|e| format!("Failed to create audio sink: {e}"))
    }

    fn stop_sound(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl AlarmSink for AudioAlarm {
    fn start_alarm(&mut self, duration_secs: f64) {
        self.ringing_until = Some(ring_deadline(duration_secs));
        self.stop_sound();

        // Check the file once per alarm so a broken one is reported once.
        if let Some(Err(e)) = self.sound.as_deref().map(decode) {
            log::warn!("{e}; using the built-in tone");
            self.sound = None;
        }

        match self.open_sink() {
            Ok(sink) => {
                sink.set_volume(self.volume);
                sink.append(alarm_source(self.sound.as_deref()));
                log::info!("Playing alarm for {duration_secs:.1}s");
                self.sink = Some(sink);
            }
            Err(e) => {
                log::warn!("{e}; using the terminal bell");
                self.fallback.start_alarm(duration_secs);
            }
        }
    }

    fn stop_alarm(&mut self) {
        self.ringing_until = None;
        self.stop_sound();
        self.fallback.stop_alarm();
    }

    fn sustain(&mut self) {
        let Some(until) = self.ringing_until else {
            return;
        };
        if Instant::now() >= until {
            self.ringing_until = None;
            self.stop_sound();
            return;
        }
        match &self.sink {
            Some(sink) if sink.empty() => {
                log::debug!("Replaying alarm sound");
                sink.append(alarm_source(self.sound.as_deref()));
            }
            Some(_) => {}
            None => self.fallback.sustain(),
        }
    }
}

/// Sink for the configured sound and volume.
pub fn alarm_sink(config: &Config) -> Box<dyn AlarmSink> {
    Box::new(AudioAlarm::new(config.playable_sound(), config.alarm.volume as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_stops_sustaining_after_stop() {
        let mut bell = TerminalBell::default();
        bell.start_alarm(60.0);
        assert!(bell.ringing_until.is_some());
        bell.stop_alarm();
        bell.sustain();
        assert!(bell.last_ring.is_none());
    }

    #[test]
    fn tone_is_a_finite_beep() {
        assert_eq!(tone().total_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn undecodable_sound_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(decode(&dir.path().join("missing.wav")).is_err());

        let junk = dir.path().join("junk.wav");
        std::fs::write(&junk, b"RIFF").unwrap();
        assert!(decode(&junk).is_err());
        assert_eq!(
            alarm_source(Some(&junk)).total_duration(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn ring_deadline_tolerates_any_duration() {
        let now = Instant::now();
        assert!(ring_deadline(f64::NAN) <= Instant::now());
        assert!(ring_deadline(-5.0) <= Instant::now());
        assert!(ring_deadline(f64::MAX) > now + Duration::from_secs(3600));
    }

    #[test]
    fn alarm_without_sound_file_uses_tone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.alarm.sound_file = Some(dir.path().join("missing.wav"));
        let sink = AudioAlarm::new(config.playable_sound(), 0.5);
        assert!(sink.sound.is_none());
        assert!(sink.output.is_none());
    }
}
