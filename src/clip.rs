//! Timeline-placed audio material: [`AudioClip`] and the shared positional
//! fields every clip variant carries.

use crate::error::{EngineError, EngineResult};
use crate::types::ClipId;

/// Fields shared by every clip variant: its placement on the timeline, its
/// gain staging, and its fades. A future MIDI clip would carry the same
/// header and dispatch on a tag rather than through dynamic dispatch.
#[derive(Debug, Clone)]
pub struct ClipHeader {
    pub id: ClipId,
    pub name: String,
    pub start_position: u64,
    pub length: u64,
    pub source_offset: u64,
    pub gain: f32,
    pub is_muted: bool,
    pub fade_in_length: u64,
    pub fade_out_length: u64,
    pub color: String,
}

impl ClipHeader {
    fn new(name: impl Into<String>, start_position: u64, length: u64) -> Self {
        Self {
            id: ClipId::next(),
            name: name.into(),
            start_position,
            length,
            source_offset: 0,
            gain: 1.0,
            is_muted: false,
            fade_in_length: 0,
            fade_out_length: 0,
            color: String::new(),
        }
    }

    pub fn end_position(&self) -> u64 {
        self.start_position + self.length
    }

    /// Linear fade envelope at offset `r` (frames into the clip, `0 <= r < length`).
    fn fade_envelope(&self, r: u64) -> f32 {
        let mut e = 1.0f32;
        if self.fade_in_length > 0 && r < self.fade_in_length {
            e *= r as f32 / self.fade_in_length as f32;
        }
        if self.fade_out_length > 0 {
            let fade_out_start = self.length.saturating_sub(self.fade_out_length);
            if r >= fade_out_start {
                let into_fade = (r - fade_out_start) as f32;
                e *= (1.0 - into_fade / self.fade_out_length as f32).max(0.0);
            }
        }
        e
    }
}

/// An audio clip: a placement on the timeline backed by interleaved float
/// sample storage.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub header: ClipHeader,
    channels: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioClip {
    /// Build a clip from existing interleaved sample storage.
    pub fn from_samples(
        name: impl Into<String>,
        start_position: u64,
        length: u64,
        channels: usize,
        sample_rate: u32,
        samples: Vec<f32>,
    ) -> EngineResult<Self> {
        if channels == 0 || channels > crate::types::MAX_CHANNELS {
            return Err(EngineError::InvalidArgument(format!(
                "channel count must be in 1..={}",
                crate::types::MAX_CHANNELS
            )));
        }
        if sample_rate == 0 {
            return Err(EngineError::InvalidArgument("sample_rate must be > 0".into()));
        }
        if samples.len() % channels != 0 {
            return Err(EngineError::InvalidArgument(
                "sample storage length must be a multiple of channel count".into(),
            ));
        }
        let header = ClipHeader::new(name, start_position, length);
        Ok(Self {
            header,
            channels,
            sample_rate,
            samples,
        })
    }

    /// Build a clip backed by `frame_count` frames of silence.
    pub fn silent(
        name: impl Into<String>,
        start_position: u64,
        length: u64,
        channels: usize,
        sample_rate: u32,
        frame_count: u64,
    ) -> EngineResult<Self> {
        let samples = vec![0.0f32; frame_count as usize * channels];
        Self::from_samples(name, start_position, length, channels, sample_rate, samples)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_in_storage(&self) -> u64 {
        (self.samples.len() / self.channels) as u64
    }

    /// Read `count` samples (not frames) starting at `timeline_position` into
    /// `dst[dst_offset..]`, applying gain, fade envelope, and mute. Any
    /// portion of the requested window with no contributing source data is
    /// zeroed. Returns the number of samples actually written non-zero.
    pub fn read_samples(
        &self,
        dst: &mut [f32],
        dst_offset: usize,
        count: usize,
        timeline_position: u64,
    ) -> EngineResult<usize> {
        if count % self.channels != 0 {
            return Err(EngineError::InvalidArgument(
                "count must be a multiple of channel count".into(),
            ));
        }
        if dst.len() < dst_offset + count {
            return Err(EngineError::InvalidArgument(
                "destination buffer too small for requested window".into(),
            ));
        }
        let window = &mut dst[dst_offset..dst_offset + count];

        if self.header.is_muted || count == 0 {
            window.fill(0.0);
            return Ok(0);
        }

        if timeline_position < self.header.start_position {
            window.fill(0.0);
            return Ok(0);
        }
        let relative = timeline_position - self.header.start_position;
        if relative >= self.header.length {
            window.fill(0.0);
            return Ok(0);
        }
        let source_frame = relative + self.header.source_offset;
        let frames_in_storage = self.frames_in_storage();
        if source_frame >= frames_in_storage {
            window.fill(0.0);
            return Ok(0);
        }

        let requested_frames = (count / self.channels) as u64;
        let available = requested_frames
            .min(self.header.length - relative)
            .min(frames_in_storage - source_frame);

        for i in 0..available {
            let envelope = self.header.fade_envelope(relative + i);
            let scale = self.header.gain * envelope;
            let src_base = ((source_frame + i) * self.channels as u64) as usize;
            let dst_base = (i * self.channels as u64) as usize;
            for c in 0..self.channels {
                window[dst_base + c] = self.samples[src_base + c] * scale;
            }
        }
        let trailing_start = (available * self.channels as u64) as usize;
        if trailing_start < window.len() {
            window[trailing_start..].fill(0.0);
        }
        Ok((available * self.channels as u64) as usize)
    }

    /// Write `frame_count` frames from `src` into backing storage starting at
    /// the storage offset implied by `timeline_position`. Returns frames written.
    pub fn write_samples(
        &mut self,
        src: &[f32],
        src_offset: usize,
        frame_count: u64,
        timeline_position: u64,
    ) -> EngineResult<u64> {
        if timeline_position < self.header.start_position {
            return Err(EngineError::InvalidArgument(
                "timeline_position precedes clip start".into(),
            ));
        }
        let relative = timeline_position - self.header.start_position;
        let source_frame = relative + self.header.source_offset;
        let frames_in_storage = self.frames_in_storage();
        let available = frame_count
            .min(self.header.length.saturating_sub(relative))
            .min(frames_in_storage.saturating_sub(source_frame));

        for i in 0..available {
            let src_base = src_offset + (i * self.channels as u64) as usize;
            let dst_base = ((source_frame + i) * self.channels as u64) as usize;
            for c in 0..self.channels {
                self.samples[dst_base + c] = src[src_base + c];
            }
        }
        Ok(available)
    }

    /// Split this clip at an absolute timeline position strictly inside its
    /// span: `self` shrinks to end at `split_position`, and a new clip
    /// covering the remainder is returned. Storage is copied rather than
    /// shared, so the two halves can be trimmed and gained independently
    /// afterwards.
    pub fn split_at(&mut self, split_position: u64) -> EngineResult<AudioClip> {
        if split_position <= self.header.start_position
            || split_position >= self.header.end_position()
        {
            return Err(EngineError::InvalidArgument(
                "split position must be strictly inside the clip".into(),
            ));
        }

        let relative = split_position - self.header.start_position;
        let right_length = self.header.length - relative;
        let right_source_offset = self.header.source_offset + relative;
        let frames_in_storage = self.frames_in_storage();
        let right_frames = right_length.min(frames_in_storage.saturating_sub(right_source_offset));

        let src_start = (right_source_offset * self.channels as u64) as usize;
        let src_end = src_start + (right_frames * self.channels as u64) as usize;
        let right_samples = self.samples[src_start..src_end].to_vec();

        let mut right = AudioClip::from_samples(
            format!("{} (split)", self.header.name),
            split_position,
            right_length,
            self.channels,
            self.sample_rate,
            right_samples,
        )?;
        right.header.gain = self.header.gain;
        right.header.is_muted = self.header.is_muted;
        right.header.fade_out_length = self.header.fade_out_length;
        right.header.color = self.header.color.clone();

        // The split point becomes a new boundary: the left half loses the
        // fade-out it no longer reaches, the right half has no fade-in of
        // its own (it did not fade in from the original clip's start).
        self.header.length = relative;
        self.header.fade_out_length = 0;

        Ok(right)
    }

    /// Maximum absolute sample value in the window, scaled by gain and the
    /// envelope at the window's first frame. Zero if muted or out of range.
    pub fn peak_amplitude(&self, timeline_position: u64, window_frames: u64) -> f32 {
        if self.header.is_muted || timeline_position < self.header.start_position {
            return 0.0;
        }
        let relative = timeline_position - self.header.start_position;
        if relative >= self.header.length {
            return 0.0;
        }
        let source_frame = relative + self.header.source_offset;
        let frames_in_storage = self.frames_in_storage();
        if source_frame >= frames_in_storage {
            return 0.0;
        }
        let available = window_frames
            .min(self.header.length - relative)
            .min(frames_in_storage - source_frame);
        let envelope = self.header.fade_envelope(relative);
        let mut peak = 0.0f32;
        for i in 0..available {
            let base = ((source_frame + i) * self.channels as u64) as usize;
            for c in 0..self.channels {
                peak = peak.max(self.samples[base + c].abs());
            }
        }
        peak * self.header.gain * envelope
    }

    /// Root-mean-square amplitude over the window, same scaling as
    /// [`AudioClip::peak_amplitude`].
    pub fn rms_amplitude(&self, timeline_position: u64, window_frames: u64) -> f32 {
        if self.header.is_muted || timeline_position < self.header.start_position {
            return 0.0;
        }
        let relative = timeline_position - self.header.start_position;
        if relative >= self.header.length {
            return 0.0;
        }
        let source_frame = relative + self.header.source_offset;
        let frames_in_storage = self.frames_in_storage();
        if source_frame >= frames_in_storage {
            return 0.0;
        }
        let available = window_frames
            .min(self.header.length - relative)
            .min(frames_in_storage - source_frame);
        if available == 0 {
            return 0.0;
        }
        let envelope = self.header.fade_envelope(relative);
        let mut sum_sq = 0.0f64;
        let mut n = 0u64;
        for i in 0..available {
            let base = ((source_frame + i) * self.channels as u64) as usize;
            for c in 0..self.channels {
                let s = self.samples[base + c] as f64;
                sum_sq += s * s;
                n += 1;
            }
        }
        ((sum_sq / n as f64).sqrt() as f32) * self.header.gain * envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unity_clip(length: u64) -> AudioClip {
        AudioClip::from_samples("t", 0, length, 1, 48_000, vec![1.0f32; length as usize]).unwrap()
    }

    #[test]
    fn muted_clip_reads_zero() {
        let mut clip = unity_clip(100);
        clip.header.is_muted = true;
        let mut dst = vec![9.0f32; 10];
        let written = clip.read_samples(&mut dst, 0, 10, 0).unwrap();
        assert_eq!(written, 0);
        assert!(dst.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn read_before_start_is_silent() {
        let clip = AudioClip::from_samples("t", 100, 50, 1, 48_000, vec![1.0; 50]).unwrap();
        let mut dst = vec![9.0f32; 10];
        let written = clip.read_samples(&mut dst, 0, 10, 0).unwrap();
        assert_eq!(written, 0);
        assert!(dst.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fade_in_midpoint_scales_linearly() {
        let mut clip = unity_clip(1000);
        clip.header.fade_in_length = 100;
        let mut dst = vec![0.0f32; 1];
        clip.read_samples(&mut dst, 0, 1, 50).unwrap();
        assert!((dst[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn overlapping_fades_compose_multiplicatively() {
        let mut clip = unity_clip(100);
        clip.header.fade_in_length = 80;
        clip.header.fade_out_length = 80;
        let mut dst = vec![0.0f32; 1];
        clip.read_samples(&mut dst, 0, 1, 50).unwrap();
        let fade_in = 50.0 / 80.0f32;
        let fade_out = 1.0 - (50.0 - (100.0 - 80.0)) / 80.0f32;
        assert!((dst[0] - fade_in * fade_out).abs() < 1e-5);
    }

    #[test]
    fn gain_is_applied() {
        let mut clip = unity_clip(10);
        clip.header.gain = 0.5;
        let mut dst = vec![0.0f32; 1];
        clip.read_samples(&mut dst, 0, 1, 0).unwrap();
        assert!((dst[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_count_not_multiple_of_channels() {
        let clip = AudioClip::from_samples("t", 0, 10, 2, 48_000, vec![0.0; 20]).unwrap();
        let mut dst = vec![0.0f32; 3];
        assert!(clip.read_samples(&mut dst, 0, 3, 0).is_err());
    }

    #[test]
    fn split_at_shrinks_left_and_returns_right() {
        let mut clip = AudioClip::from_samples(
            "t",
            0,
            10,
            1,
            48_000,
            (0..10).map(|i| i as f32).collect(),
        )
        .unwrap();
        let right = clip.split_at(4).unwrap();

        assert_eq!(clip.header.length, 4);
        assert_eq!(right.header.start_position, 4);
        assert_eq!(right.header.length, 6);

        let mut dst = vec![0.0f32; 1];
        clip.read_samples(&mut dst, 0, 1, 3).unwrap();
        assert_eq!(dst[0], 3.0);
        right.read_samples(&mut dst, 0, 1, 4).unwrap();
        assert_eq!(dst[0], 4.0);
    }

    #[test]
    fn split_at_rejects_boundary_positions() {
        let mut clip = unity_clip(10);
        assert!(clip.split_at(0).is_err());
        assert!(clip.split_at(10).is_err());
    }

    #[test]
    fn split_clears_fade_out_on_left_half() {
        let mut clip = unity_clip(10);
        clip.header.fade_out_length = 5;
        let right = clip.split_at(4).unwrap();
        assert_eq!(clip.header.fade_out_length, 0);
        assert_eq!(right.header.fade_in_length, 0);
    }
}
