//! Common identifiers and limits used throughout the engine core.

use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of interleaved channels an [`crate::clip::AudioClip`] may carry.
///
/// Eight channels covers 7.1 surround source material while keeping the
/// per-track scratch buffers on the audio thread bounded at compile time.
pub const MAX_CHANNELS: usize = 8;

/// Unique identifier for a [`crate::clip::Clip`] within its owning track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(u64);

/// Unique identifier for a [`crate::track::Track`] within a [`crate::mixer::Mixer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

/// Monotonically increasing id allocator, shared by clips and tracks.
///
/// A single global counter is sufficient here: ids are never reused, and
/// comparing a `ClipId` against a `TrackId` is a type error by construction.
struct IdAllocator(AtomicU64);

impl IdAllocator {
    const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

static CLIP_IDS: IdAllocator = IdAllocator::new();
static TRACK_IDS: IdAllocator = IdAllocator::new();

impl ClipId {
    pub(crate) fn next() -> Self {
        Self(CLIP_IDS.next())
    }
}

impl TrackId {
    pub(crate) fn next() -> Self {
        Self(TRACK_IDS.next())
    }
}

/// A one-based bar / one-based beat / zero-based tick musical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalTime {
    pub bar: u32,
    pub beat: u32,
    pub tick: u32,
}

impl MusicalTime {
    pub const fn new(bar: u32, beat: u32, tick: u32) -> Self {
        Self { bar, beat, tick }
    }
}
