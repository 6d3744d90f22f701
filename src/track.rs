//! An ordered container of clips with volume, pan, mute, solo, and arm state.

use crate::clip::AudioClip;
use crate::error::{EngineError, EngineResult};
use crate::types::{ClipId, TrackId};

/// A single track in the arrangement.
///
/// `process_audio` sums this track's clips without applying pan — panning
/// is the mixer's job, applied once per track after this call returns.
///
/// Tracks are published to the audio thread behind an immutable snapshot
/// (see [`crate::mixer::Mixer`]); any edit clones the affected track,
/// mutates the clone, and republishes the whole snapshot. `Track` itself
/// therefore needs no interior mutability.
#[derive(Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: String,
    pub volume: f32,
    pub pan: f32,
    pub is_muted: bool,
    pub is_solo: bool,
    pub is_armed: bool,
    clips: Vec<AudioClip>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::next(),
            name: name.into(),
            color: String::new(),
            volume: 1.0,
            pan: 0.0,
            is_muted: false,
            is_solo: false,
            is_armed: false,
            clips: Vec::new(),
        }
    }

    pub fn set_volume(&mut self, volume: f32) -> EngineResult<()> {
        if volume < 0.0 {
            return Err(EngineError::InvalidArgument("volume must be >= 0".into()));
        }
        self.volume = volume;
        Ok(())
    }

    pub fn set_pan(&mut self, pan: f32) -> EngineResult<()> {
        if !(-1.0..=1.0).contains(&pan) {
            return Err(EngineError::InvalidArgument("pan must be in [-1, 1]".into()));
        }
        self.pan = pan;
        Ok(())
    }

    pub fn add_clip(&mut self, clip: AudioClip) {
        self.clips.push(clip);
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Option<AudioClip> {
        let idx = self.clips.iter().position(|c| c.header.id == id)?;
        Some(self.clips.remove(idx))
    }

    pub fn clear_clips(&mut self) {
        self.clips.clear();
    }

    pub fn clips(&self) -> &[AudioClip] {
        &self.clips
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut AudioClip> {
        self.clips.iter_mut().find(|c| c.header.id == id)
    }

    /// Move a clip to a new timeline start position.
    pub fn move_clip(&mut self, id: ClipId, new_start: u64) -> EngineResult<()> {
        let clip = self
            .clip_mut(id)
            .ok_or_else(|| EngineError::PreconditionFailed("clip not owned by this track".into()))?;
        clip.header.start_position = new_start;
        Ok(())
    }

    /// Adjust a clip's start position and/or length in place. Either
    /// argument may be omitted to leave that field unchanged.
    pub fn trim_clip(
        &mut self,
        id: ClipId,
        new_start: Option<u64>,
        new_length: Option<u64>,
    ) -> EngineResult<()> {
        let clip = self
            .clip_mut(id)
            .ok_or_else(|| EngineError::PreconditionFailed("clip not owned by this track".into()))?;
        if let Some(start) = new_start {
            clip.header.start_position = start;
        }
        if let Some(length) = new_length {
            clip.header.length = length;
        }
        Ok(())
    }

    /// Split a clip at `split_position`, shrinking the original in place and
    /// adding the new right-hand clip to this track. Returns the new clip's id.
    pub fn split_clip(&mut self, id: ClipId, split_position: u64) -> EngineResult<ClipId> {
        let clip = self
            .clip_mut(id)
            .ok_or_else(|| EngineError::PreconditionFailed("clip not owned by this track".into()))?;
        let right = clip.split_at(split_position)?;
        let right_id = right.header.id;
        self.clips.push(right);
        Ok(right_id)
    }

    /// Clips whose span intersects `[start, end)` frames, sorted by start position.
    pub fn clips_in_range(&self, start: u64, end: u64) -> EngineResult<Vec<&AudioClip>> {
        if end < start {
            return Err(EngineError::InvalidArgument("end must be >= start".into()));
        }
        let mut found: Vec<&AudioClip> = self
            .clips
            .iter()
            .filter(|c| c.header.end_position() > start && c.header.start_position < end)
            .collect();
        found.sort_by_key(|c| c.header.start_position);
        Ok(found)
    }

    /// Mix every clip intersecting the requested window into `dst`, then
    /// scale the whole window by this track's volume. No pan is applied.
    ///
    /// `count` is a sample count (interleaved across this track's output
    /// channel layout), not a frame count.
    ///
    /// `scratch` is a caller-owned buffer of at least `count` samples, reused
    /// across calls so this never allocates on the audio thread; its
    /// contents on entry are irrelevant and it is left dirty on return.
    pub fn process_audio(
        &self,
        dst: &mut [f32],
        offset: usize,
        count: usize,
        timeline_position: u64,
        scratch: &mut [f32],
    ) -> EngineResult<()> {
        if dst.len() < offset + count {
            return Err(EngineError::InvalidArgument(
                "destination buffer too small for requested window".into(),
            ));
        }
        if scratch.len() < count {
            return Err(EngineError::InvalidArgument(
                "scratch buffer too small for requested window".into(),
            ));
        }
        let window = &mut dst[offset..offset + count];
        if self.is_muted {
            window.fill(0.0);
            return Ok(());
        }
        window.fill(0.0);

        let scratch = &mut scratch[..count];
        let mut any_contributed = false;
        for clip in &self.clips {
            if clip.header.is_muted {
                continue;
            }
            let channels = clip.channels();
            if count % channels != 0 {
                continue;
            }
            let written = clip.read_samples(scratch, 0, count, timeline_position)?;
            if written > 0 {
                any_contributed = true;
                for (d, s) in window.iter_mut().zip(scratch.iter()) {
                    *d += *s;
                }
            }
            scratch.fill(0.0);
        }

        if any_contributed {
            for sample in window.iter_mut() {
                *sample *= self.volume;
            }
        }
        Ok(())
    }

    /// Peak across all non-muted clips intersecting the window, scaled by volume.
    pub fn peak_amplitude(&self, position: u64, window: u64) -> f32 {
        if self.is_muted {
            return 0.0;
        }
        self.clips
            .iter()
            .filter(|c| !c.header.is_muted)
            .map(|c| c.peak_amplitude(position, window))
            .fold(0.0f32, f32::max)
            * self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unity_track_with_clip(length: u64) -> Track {
        let mut track = Track::new("t");
        let clip =
            AudioClip::from_samples("c", 0, length, 1, 48_000, vec![1.0f32; length as usize])
                .unwrap();
        track.add_clip(clip);
        track
    }

    #[test]
    fn muted_track_is_silent() {
        let mut track = unity_track_with_clip(10);
        track.is_muted = true;
        let mut dst = vec![9.0f32; 10];
        let mut scratch = vec![0.0f32; 10];
        track.process_audio(&mut dst, 0, 10, 0, &mut scratch).unwrap();
        assert!(dst.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn volume_scales_output() {
        let mut track = unity_track_with_clip(10);
        track.set_volume(0.5).unwrap();
        let mut dst = vec![0.0f32; 10];
        let mut scratch = vec![0.0f32; 10];
        track.process_audio(&mut dst, 0, 10, 0, &mut scratch).unwrap();
        assert!(dst.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn clips_in_range_rejects_inverted_window() {
        let track = unity_track_with_clip(10);
        assert!(track.clips_in_range(10, 0).is_err());
    }

    #[test]
    fn remove_clip_by_id() {
        let mut track = unity_track_with_clip(10);
        let id = track.clips()[0].header.id;
        let removed = track.remove_clip(id);
        assert!(removed.is_some());
        assert!(track.clips().is_empty());
    }

    #[test]
    fn move_clip_updates_start_position() {
        let mut track = unity_track_with_clip(10);
        let id = track.clips()[0].header.id;
        track.move_clip(id, 500).unwrap();
        assert_eq!(track.clips()[0].header.start_position, 500);
    }

    #[test]
    fn trim_clip_updates_length_only() {
        let mut track = unity_track_with_clip(10);
        let id = track.clips()[0].header.id;
        track.trim_clip(id, None, Some(5)).unwrap();
        assert_eq!(track.clips()[0].header.start_position, 0);
        assert_eq!(track.clips()[0].header.length, 5);
    }

    #[test]
    fn split_clip_adds_right_hand_clip() {
        let mut track = unity_track_with_clip(10);
        let id = track.clips()[0].header.id;
        let right_id = track.split_clip(id, 4).unwrap();
        assert_eq!(track.clips().len(), 2);
        let left = track.clip_mut(id).unwrap();
        assert_eq!(left.header.length, 4);
        let right = track.clip_mut(right_id).unwrap();
        assert_eq!(right.header.start_position, 4);
        assert_eq!(right.header.length, 6);
    }

    #[test]
    fn split_unknown_clip_fails_precondition() {
        let mut track = unity_track_with_clip(10);
        let mut other = Track::new("other");
        let bogus = track.clips()[0].header.id;
        assert!(other.split_clip(bogus, 4).is_err());
    }

    #[test]
    fn editing_unknown_clip_fails_precondition() {
        let mut track = unity_track_with_clip(10);
        let bogus = track.clips()[0].header.id;
        let mut other = Track::new("other");
        assert!(other.move_clip(bogus, 10).is_err());
        let _ = track.remove_clip(bogus);
    }
}
