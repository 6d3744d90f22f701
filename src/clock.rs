//! Sample-rate-anchored conversions between samples, seconds, and musical time.

use crate::error::{EngineError, EngineResult};
use crate::types::MusicalTime;

/// A musical time reference: sample rate, tempo, and time signature.
///
/// `Clock` is stateless with respect to playback position — it only knows
/// how to convert between time representations at the current tempo. The
/// playback cursor itself lives on [`crate::transport::Transport`].
#[derive(Debug, Clone)]
pub struct Clock {
    sample_rate: u32,
    tempo: f64,
    time_sig_numerator: u32,
    time_sig_denominator: u32,
    ticks_per_quarter_note: u32,
}

impl Clock {
    /// Create a clock at 120 BPM, 4/4, 480 ticks per quarter note.
    pub fn new(sample_rate: u32) -> EngineResult<Self> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidArgument(
                "sample_rate must be positive".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            tempo: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            ticks_per_quarter_note: 480,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn set_tempo(&mut self, bpm: f64) -> EngineResult<()> {
        if !(bpm > 0.0) {
            return Err(EngineError::InvalidArgument("tempo must be > 0".into()));
        }
        self.tempo = bpm;
        Ok(())
    }

    pub fn time_signature(&self) -> (u32, u32) {
        (self.time_sig_numerator, self.time_sig_denominator)
    }

    pub fn set_time_signature(&mut self, numerator: u32, denominator: u32) -> EngineResult<()> {
        if numerator == 0 {
            return Err(EngineError::InvalidArgument(
                "time signature numerator must be > 0".into(),
            ));
        }
        if denominator == 0 || !denominator.is_power_of_two() {
            return Err(EngineError::InvalidArgument(
                "time signature denominator must be a positive power of two".into(),
            ));
        }
        self.time_sig_numerator = numerator;
        self.time_sig_denominator = denominator;
        Ok(())
    }

    pub fn ticks_per_quarter_note(&self) -> u32 {
        self.ticks_per_quarter_note
    }

    /// Number of samples spanning one beat at the current tempo and signature.
    pub fn beat_length_samples(&self) -> f64 {
        (60.0 / self.tempo) * (4.0 / self.time_sig_denominator as f64) * self.sample_rate as f64
    }

    /// Number of samples spanning one bar at the current tempo and signature.
    pub fn bar_length_samples(&self) -> f64 {
        self.beat_length_samples() * self.time_sig_numerator as f64
    }

    fn ticks_per_beat(&self) -> f64 {
        // One "beat" here is the time-signature beat unit (e.g. a quarter note
        // in 4/4, an eighth note in 6/8), scaled from the fixed quarter-note tick base.
        self.ticks_per_quarter_note as f64 * (4.0 / self.time_sig_denominator as f64)
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate as f64
    }

    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate as f64).floor().max(0.0) as u64
    }

    /// Convert an absolute sample position into a 1-based bar, 1-based beat,
    /// and 0-based tick within that beat.
    pub fn samples_to_musical_time(&self, samples: u64) -> MusicalTime {
        let seconds = self.samples_to_seconds(samples);
        let total_beats = seconds * (self.tempo / 60.0) * (self.time_sig_denominator as f64 / 4.0);
        let ticks_per_beat = self.ticks_per_beat();
        let total_ticks = (total_beats * ticks_per_beat).round() as u64;

        let ticks_per_bar = (ticks_per_beat * self.time_sig_numerator as f64).round() as u64;
        let bar = total_ticks / ticks_per_bar.max(1);
        let remainder = total_ticks % ticks_per_bar.max(1);
        let beat = remainder / ticks_per_beat.round().max(1.0) as u64;
        let tick = remainder % ticks_per_beat.round().max(1.0) as u64;

        MusicalTime::new(bar as u32 + 1, beat as u32 + 1, tick as u32)
    }

    /// Inverse of [`Clock::samples_to_musical_time`].
    pub fn musical_time_to_samples(&self, time: MusicalTime) -> EngineResult<u64> {
        if time.bar == 0 || time.beat == 0 {
            return Err(EngineError::InvalidArgument(
                "bar and beat are 1-based and must be >= 1".into(),
            ));
        }
        let ticks_per_beat = self.ticks_per_beat();
        if time.tick as f64 >= ticks_per_beat {
            return Err(EngineError::InvalidArgument(
                "tick must be within a single beat".into(),
            ));
        }
        let ticks_per_bar = ticks_per_beat * self.time_sig_numerator as f64;
        let total_ticks = (time.bar - 1) as f64 * ticks_per_bar
            + (time.beat - 1) as f64 * ticks_per_beat
            + time.tick as f64;
        let total_beats = total_ticks / ticks_per_beat;
        let seconds = total_beats / (self.tempo / 60.0) / (self.time_sig_denominator as f64 / 4.0);
        Ok(self.seconds_to_samples(seconds))
    }
}
