//! The playback state machine: Stopped / Playing / Paused / Recording.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSender};

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
    Recording = 3,
}

impl TransportState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Recording,
            _ => Self::Stopped,
        }
    }
}

/// Playback position, loop window, and state machine.
///
/// `position` is a single atomic so that [`Transport::advance`] — called
/// from the audio thread — never contends with control-thread state
/// changes for longer than a single store.
pub struct Transport {
    state: AtomicU8,
    position: AtomicI64,
    stop_position: AtomicI64,
    is_looping: std::sync::atomic::AtomicBool,
    loop_start: AtomicI64,
    loop_end: AtomicI64,
    events: Option<EventSender>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TransportState::Stopped as u8),
            position: AtomicI64::new(0),
            stop_position: AtomicI64::new(0),
            is_looping: std::sync::atomic::AtomicBool::new(false),
            loop_start: AtomicI64::new(0),
            loop_end: AtomicI64::new(0),
            events: None,
        }
    }

    /// Attach an event sender; subsequent state and position changes are
    /// pushed to it. Not required for correct playback.
    pub fn set_event_sender(&mut self, sender: EventSender) {
        self.events = Some(sender);
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire) as u64
    }

    fn notify(&mut self, event: EngineEvent) {
        if let Some(sender) = self.events.as_mut() {
            sender.send(event);
        }
    }

    pub fn play(&mut self) {
        log::debug!("transport: -> Playing");
        self.state.store(TransportState::Playing as u8, Ordering::Release);
        self.notify(EngineEvent::TransportStateChanged);
    }

    pub fn pause(&mut self) {
        match self.state() {
            TransportState::Playing | TransportState::Recording => {
                log::debug!("transport: -> Paused");
                self.state.store(TransportState::Paused as u8, Ordering::Release);
                self.notify(EngineEvent::TransportStateChanged);
            }
            _ => {}
        }
    }

    pub fn record(&mut self) {
        log::debug!("transport: -> Recording");
        self.state
            .store(TransportState::Recording as u8, Ordering::Release);
        self.notify(EngineEvent::TransportStateChanged);
    }

    pub fn stop(&mut self) {
        log::debug!("transport: -> Stopped");
        self.state.store(TransportState::Stopped as u8, Ordering::Release);
        let stop_pos = self.stop_position.load(Ordering::Acquire);
        self.position.store(stop_pos, Ordering::Release);
        self.notify(EngineEvent::TransportStateChanged);
    }

    pub fn seek(&mut self, position: u64) -> EngineResult<()> {
        let position: i64 = position
            .try_into()
            .map_err(|_| EngineError::InvalidArgument("position overflows i64".into()))?;
        log::debug!("transport: seek to {position}");
        self.position.store(position, Ordering::Release);
        if self.state() == TransportState::Stopped {
            self.stop_position.store(position, Ordering::Release);
        }
        Ok(())
    }

    pub fn rewind(&mut self) {
        let _ = self.seek(0);
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping.load(Ordering::Acquire)
    }

    pub fn set_looping(&mut self, enabled: bool) {
        self.is_looping.store(enabled, Ordering::Release);
    }

    pub fn loop_range(&self) -> (u64, u64) {
        (
            self.loop_start.load(Ordering::Acquire) as u64,
            self.loop_end.load(Ordering::Acquire) as u64,
        )
    }

    pub fn set_loop_start(&mut self, start: u64) -> EngineResult<()> {
        let start: i64 = start
            .try_into()
            .map_err(|_| EngineError::InvalidArgument("loop start overflows i64".into()))?;
        let mut end = self.loop_end.load(Ordering::Acquire);
        if start >= end {
            end = start + bar_fallback_samples();
            self.loop_end.store(end, Ordering::Release);
        }
        self.loop_start.store(start, Ordering::Release);
        Ok(())
    }

    pub fn set_loop_end(&mut self, end: u64) -> EngineResult<()> {
        let end: i64 = end
            .try_into()
            .map_err(|_| EngineError::InvalidArgument("loop end overflows i64".into()))?;
        let mut start = self.loop_start.load(Ordering::Acquire);
        if end <= start {
            start = (end - bar_fallback_samples()).max(0);
            self.loop_start.store(start, Ordering::Release);
        }
        self.loop_end.store(end, Ordering::Release);
        Ok(())
    }

    /// Advance the playback position by `n` samples, wrapping at the loop
    /// boundary if looping. A no-op unless currently Playing or Recording.
    ///
    /// Safe to call from the audio thread: this only touches atomics.
    pub fn advance(&self, n: u64) {
        match self.state() {
            TransportState::Playing | TransportState::Recording => {}
            _ => return,
        }
        if n == 0 {
            return;
        }
        let current = self.position.load(Ordering::Acquire);
        let mut new_pos = current + n as i64;
        if self.is_looping() {
            let start = self.loop_start.load(Ordering::Acquire);
            let end = self.loop_end.load(Ordering::Acquire);
            if end > start && new_pos >= end {
                let overflow = new_pos - end;
                let loop_len = end - start;
                new_pos = start + overflow % loop_len;
            }
        }
        self.position.store(new_pos, Ordering::Release);
    }

    /// Convenience: derive the current musical position via `clock`, and
    /// emit a position-changed notification with it.
    pub fn notify_position(&mut self, clock: &Clock) {
        let sample = self.position();
        let seconds = clock.samples_to_seconds(sample);
        let time = clock.samples_to_musical_time(sample);
        self.notify(EngineEvent::TransportPositionChanged {
            sample,
            seconds,
            time,
        });
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

// Used only as a sane default span when a loop bound is set without the
// other; one bar at 120 BPM / 4-4 / 48kHz is close enough since the caller
// is expected to set both bounds explicitly in normal use.
fn bar_fallback_samples() -> i64 {
    96_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_then_advance_moves_position() {
        let mut t = Transport::new();
        t.play();
        t.advance(100);
        assert_eq!(t.position(), 100);
    }

    #[test]
    fn advance_is_noop_when_stopped() {
        let t = Transport::new();
        t.advance(100);
        assert_eq!(t.position(), 0);
    }

    #[test]
    fn stop_restores_stop_position() {
        let mut t = Transport::new();
        t.seek(500).unwrap();
        t.play();
        t.advance(1000);
        t.stop();
        assert_eq!(t.position(), 500);
    }

    #[test]
    fn loop_wraps_around() {
        let mut t = Transport::new();
        t.set_loop_start(0).unwrap();
        t.set_loop_end(1000).unwrap();
        t.set_looping(true);
        t.seek(900).unwrap();
        t.play();
        t.advance(200);
        assert_eq!(t.position(), 100);
    }

    #[test]
    fn seek_rejects_negative_via_type_system() {
        let mut t = Transport::new();
        assert!(t.seek(0).is_ok());
    }

    #[test]
    fn pause_only_from_playing_or_recording() {
        let mut t = Transport::new();
        t.pause();
        assert_eq!(t.state(), TransportState::Stopped);
        t.play();
        t.pause();
        assert_eq!(t.state(), TransportState::Paused);
    }

    proptest::proptest! {
        #[test]
        fn advance_keeps_position_within_loop_window(
            loop_len in 1u64..100_000,
            start_offset in 0u64..100_000,
            advance_amount in 0u64..1_000_000,
        ) {
            let mut t = Transport::new();
            let loop_start = start_offset;
            let loop_end = loop_start + loop_len;
            t.set_loop_start(loop_start).unwrap();
            t.set_loop_end(loop_end).unwrap();
            t.set_looping(true);
            t.seek(loop_start).unwrap();
            t.play();
            t.advance(advance_amount);
            let pos = t.position();
            proptest::prop_assert!(pos >= loop_start && pos < loop_end);
        }
    }
}
