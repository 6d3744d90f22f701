//! # tempo-core
//!
//! Real-time audio engine core for a multi-track digital audio workstation.
//!
//! This crate owns the sample-accurate chain that turns a time-ordered
//! arrangement of audio clips into a continuous interleaved stereo output
//! stream: a musical clock, a playback transport, a track/clip arrangement
//! model, and the real-time mixer that renders them. It does not own a
//! hardware audio backend, a GUI, or file codecs beyond the WAV boundary
//! module, which is a pure codec with no knowledge of tracks or clips.
//!
//! ## Main Types
//!
//! - [`Clock`] - sample/second/musical-time conversions at a given tempo
//! - [`Transport`] - playback state machine, position, and loop window
//! - [`AudioClip`] - a timeline-placed, gain/fade-staged audio region
//! - [`Track`] - an ordered container of clips with volume/pan/mute/solo/arm
//! - [`Mixer`] - the real-time per-buffer renderer
//! - [`EngineError`] - the control-path error taxonomy
//! - [`EngineEvent`] - cross-thread change notifications
//!
//! ## Real-Time Safety
//!
//! [`Mixer::process_buffer`] and [`Transport::advance`] are written for the
//! audio thread: no allocation, no blocking, no logging. Every other public
//! entry point in this crate is a control-thread operation and may allocate
//! or briefly block.

pub mod clip;
pub mod clock;
pub mod error;
pub mod events;
pub mod mixer;
pub mod track;
pub mod transport;
pub mod types;
pub mod wav;

pub use clip::{AudioClip, ClipHeader};
pub use clock::Clock;
pub use error::{EngineError, EngineResult};
pub use events::{event_channel, EngineEvent, EventReceiver, EventSender, TrackField};
pub use mixer::Mixer;
pub use track::Track;
pub use transport::{Transport, TransportState};
pub use types::{ClipId, MusicalTime, TrackId, MAX_CHANNELS};
pub use wav::{decode as decode_wav, encode as encode_wav, DecodedAudio, ExportFormat};
