//! The real-time mixer: per-buffer rendering of every track into an
//! interleaved output buffer.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::clip::AudioClip;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSender};
use crate::track::Track;
use crate::transport::{Transport, TransportState};
use crate::types::TrackId;

/// Owns the transport and track list and renders audio for a fixed channel count.
///
/// Track-list mutation methods (`add_track`, `remove_track`, per-track
/// property setters) are safe to call from any thread: they publish a new
/// immutable snapshot via an atomic pointer swap. [`Mixer::process_buffer`]
/// is the audio thread's entry point and must not be called concurrently
/// with itself — only one audio thread drives a given mixer.
pub struct Mixer {
    sample_rate: u32,
    channel_count: usize,
    master_volume: f32,
    is_master_muted: bool,
    transport: Arc<Transport>,
    tracks: ArcSwap<Vec<Arc<Track>>>,
    mix_scratch: Vec<f32>,
    track_scratch: Vec<f32>,
    clip_scratch: Vec<f32>,
    events: Mutex<Option<EventSender>>,
}

impl Mixer {
    pub fn new(sample_rate: u32, channel_count: usize, transport: Arc<Transport>) -> EngineResult<Self> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidArgument("sample_rate must be > 0".into()));
        }
        if channel_count == 0 || channel_count > crate::types::MAX_CHANNELS {
            return Err(EngineError::InvalidArgument(format!(
                "channel_count must be in 1..={}",
                crate::types::MAX_CHANNELS
            )));
        }
        Ok(Self {
            sample_rate,
            channel_count,
            master_volume: 1.0,
            is_master_muted: false,
            transport,
            tracks: ArcSwap::from_pointee(Vec::new()),
            mix_scratch: Vec::new(),
            track_scratch: Vec::new(),
            clip_scratch: Vec::new(),
            events: Mutex::new(None),
        })
    }

    /// Install the producer half of the change-notification queue. Replaces
    /// any previously installed sender.
    pub fn set_event_sender(&self, sender: EventSender) {
        if let Ok(mut guard) = self.events.lock() {
            *guard = Some(sender);
        }
    }

    fn notify(&self, event: EngineEvent) {
        if let Ok(mut guard) = self.events.lock() {
            if let Some(sender) = guard.as_mut() {
                sender.send(event);
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 10.0);
    }

    pub fn is_master_muted(&self) -> bool {
        self.is_master_muted
    }

    pub fn set_master_muted(&mut self, muted: bool) {
        self.is_master_muted = muted;
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Atomically published track list. Safe to call from the audio thread.
    pub fn tracks(&self) -> Arc<Vec<Arc<Track>>> {
        self.tracks.load_full()
    }

    pub fn add_track(&self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.rcu(|current| {
            let mut next = current.clone();
            next.push(Arc::new(track.clone()));
            next
        });
        id
    }

    pub fn remove_track(&self, id: TrackId) -> bool {
        let mut removed = false;
        self.tracks.rcu(|current| {
            let mut next = current.clone();
            let before = next.len();
            next.retain(|t| t.id != id);
            removed = next.len() != before;
            next
        });
        removed
    }

    pub fn clear_tracks(&self) {
        self.tracks.store(Arc::new(Vec::new()));
    }

    /// Mutate a single track by cloning it out of the current snapshot,
    /// applying `f`, and republishing the whole track list.
    pub fn with_track_mut<F>(&self, id: TrackId, f: F) -> bool
    where
        F: Fn(&mut Track),
    {
        let mut found = false;
        self.tracks.rcu(|current| {
            let mut next: Vec<Arc<Track>> = Vec::with_capacity(current.len());
            for t in current.iter() {
                if t.id == id {
                    let mut owned = (**t).clone();
                    f(&mut owned);
                    next.push(Arc::new(owned));
                    found = true;
                } else {
                    next.push(t.clone());
                }
            }
            next
        });
        found
    }

    pub fn add_clip_to_track(&self, track_id: TrackId, clip: AudioClip) -> bool {
        if clip.sample_rate() != self.sample_rate {
            log::warn!(
                "clip {:?} sample_rate {} does not match mixer sample_rate {}; playing without resampling",
                clip.header.id,
                clip.sample_rate(),
                self.sample_rate
            );
            self.notify(EngineEvent::SampleRateMismatch {
                track: track_id,
                clip: clip.header.id,
                clip_rate: clip.sample_rate(),
                mixer_rate: self.sample_rate,
            });
        }
        self.with_track_mut(track_id, move |t| t.add_clip(clip.clone()))
    }

    /// Clear internal scratch state. Does not touch the transport or tracks.
    pub fn reset(&mut self) {
        self.mix_scratch.clear();
        self.track_scratch.clear();
        self.clip_scratch.clear();
    }

    /// Render `frame_count` frames into `out`, which must hold at least
    /// `frame_count * channel_count` interleaved samples.
    ///
    /// Does not advance the transport — the caller advances it by
    /// `frame_count` after this returns, if and only if the transport state
    /// was `Playing`.
    pub fn process_buffer(&mut self, out: &mut [f32], frame_count: usize) -> EngineResult<()> {
        let needed = frame_count * self.channel_count;
        if out.len() < needed {
            return Err(EngineError::ResourceExhausted(
                "output buffer smaller than frame_count * channel_count".into(),
            ));
        }
        if frame_count == 0 {
            return Ok(());
        }

        let state = self.transport.state();
        if self.is_master_muted || state != TransportState::Playing {
            out[..needed].fill(0.0);
            return Ok(());
        }

        let snapshot = self.tracks.load_full();
        if snapshot.is_empty() {
            out[..needed].fill(0.0);
            return Ok(());
        }

        let position = self.transport.position();
        let any_solo = snapshot.iter().any(|t| t.is_solo);

        if self.mix_scratch.len() < needed {
            self.mix_scratch.resize(needed, 0.0);
        }
        if self.track_scratch.len() < needed {
            self.track_scratch.resize(needed, 0.0);
        }
        if self.clip_scratch.len() < needed {
            self.clip_scratch.resize(needed, 0.0);
        }
        let mix = &mut self.mix_scratch[..needed];
        mix.fill(0.0);

        for track in snapshot.iter() {
            if track.is_muted {
                continue;
            }
            if any_solo && !track.is_solo {
                continue;
            }
            let scratch = &mut self.track_scratch[..needed];
            scratch.fill(0.0);
            track.process_audio(scratch, 0, needed, position, &mut self.clip_scratch[..needed])?;
            apply_pan(scratch, mix, self.channel_count, track.pan);
        }

        let out_window = &mut out[..needed];
        for (o, m) in out_window.iter_mut().zip(mix.iter()) {
            *o = *m * self.master_volume;
        }
        Ok(())
    }
}

/// Mix `src` into `dst` applying the stereo constant-power pan law for a
/// two-channel bus, or a flat per-sample add otherwise (pan is only defined
/// for stereo; [`Track::process_audio`] has already applied track volume).
fn apply_pan(src: &[f32], dst: &mut [f32], channel_count: usize, pan: f32) {
    if channel_count == 2 {
        let theta = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        let left_gain = theta.cos();
        let right_gain = theta.sin();
        let frames = src.len() / 2;
        for i in 0..frames {
            dst[i * 2] += src[i * 2] * left_gain;
            dst[i * 2 + 1] += src[i * 2 + 1] * right_gain;
        }
    } else {
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d += *s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn track_with_constant(name: &str, value: f32, frames: u64) -> Track {
        let mut track = Track::new(name);
        let clip = AudioClip::from_samples(
            "c",
            0,
            frames,
            2,
            48_000,
            vec![value; (frames * 2) as usize],
        )
        .unwrap();
        track.add_clip(clip);
        track
    }

    fn playing_mixer(channel_count: usize) -> Mixer {
        let mut transport = Transport::new();
        transport.play();
        Mixer::new(48_000, channel_count, Arc::new(transport)).unwrap()
    }

    #[test]
    fn centre_pan_unity_tone() {
        let mut mixer = playing_mixer(2);
        mixer.add_track(track_with_constant("a", 1.0, 48));
        let mut out = vec![0.0f32; 48 * 2];
        mixer.process_buffer(&mut out, 48).unwrap();
        for sample in out.iter() {
            assert_abs_diff_eq!(*sample, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        }
    }

    #[test]
    fn hard_left_pan() {
        let mut mixer = playing_mixer(2);
        let id = mixer.add_track(track_with_constant("a", 1.0, 48));
        mixer.with_track_mut(id, |t| t.pan = -1.0);
        let mut out = vec![0.0f32; 48 * 2];
        mixer.process_buffer(&mut out, 48).unwrap();
        for frame in out.chunks(2) {
            assert_abs_diff_eq!(frame[0], 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(frame[1], 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn solo_precedence_mutes_non_solo_tracks() {
        let mut mixer = playing_mixer(2);
        mixer.add_track(track_with_constant("a", 0.5, 48));
        let id_b = mixer.add_track(track_with_constant("b", 0.3, 48));
        mixer.with_track_mut(id_b, |t| t.is_solo = true);
        let mut out = vec![0.0f32; 48 * 2];
        mixer.process_buffer(&mut out, 48).unwrap();
        let expected = 0.3 * std::f32::consts::FRAC_1_SQRT_2;
        for sample in out.iter() {
            assert_abs_diff_eq!(*sample, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn muted_master_is_silent() {
        let mut mixer = playing_mixer(2);
        mixer.add_track(track_with_constant("a", 1.0, 48));
        mixer.set_master_muted(true);
        let mut out = vec![9.0f32; 48 * 2];
        mixer.process_buffer(&mut out, 48).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn empty_buffer_is_noop() {
        let mut mixer = playing_mixer(2);
        let mut out = vec![9.0f32; 0];
        mixer.process_buffer(&mut out, 0).unwrap();
    }

    #[test]
    fn undersized_output_buffer_is_rejected() {
        let mut mixer = playing_mixer(2);
        let mut out = vec![0.0f32; 4];
        assert!(mixer.process_buffer(&mut out, 48).is_err());
    }

    #[test]
    fn mismatched_sample_rate_emits_event() {
        let mixer = playing_mixer(2);
        let (tx, mut rx) = crate::events::event_channel(4);
        mixer.set_event_sender(tx);
        let track_id = mixer.add_track(Track::new("a"));
        let clip = AudioClip::from_samples("c", 0, 4, 2, 44_100, vec![0.0f32; 8]).unwrap();
        let clip_id = clip.header.id;
        assert!(mixer.add_clip_to_track(track_id, clip));
        match rx.try_recv() {
            Some(EngineEvent::SampleRateMismatch {
                track,
                clip,
                clip_rate,
                mixer_rate,
            }) => {
                assert_eq!(track, track_id);
                assert_eq!(clip, clip_id);
                assert_eq!(clip_rate, 44_100);
                assert_eq!(mixer_rate, 48_000);
            }
            other => panic!("expected SampleRateMismatch event, got {other:?}"),
        }
    }

    #[test]
    fn matching_sample_rate_emits_no_event() {
        let mixer = playing_mixer(2);
        let (tx, mut rx) = crate::events::event_channel(4);
        mixer.set_event_sender(tx);
        let track_id = mixer.add_track(Track::new("a"));
        let clip = AudioClip::from_samples("c", 0, 4, 2, 48_000, vec![0.0f32; 8]).unwrap();
        assert!(mixer.add_clip_to_track(track_id, clip));
        assert_eq!(rx.try_recv(), None);
    }
}
