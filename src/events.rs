//! Cross-thread change notifications.
//!
//! Property changes on the control thread (track edits, transport
//! transitions, tempo changes) are not observed synchronously by anything —
//! they are pushed onto a bounded queue that an observer thread drains at its
//! own pace. The audio thread never touches this queue: it reads state
//! directly via atomics, exactly as before any event is ever pushed.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

// `try_pop` is a `Consumer` method; the producer half cannot drain its own
// queue. Overflow must therefore be handled with a ring that lets the
// producer overwrite the oldest slot directly (`push_overwrite`), rather
// than by popping from the producer side.

use crate::types::{ClipId, MusicalTime, TrackId};

/// A single change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TransportStateChanged,
    TransportPositionChanged {
        sample: u64,
        seconds: f64,
        time: MusicalTime,
    },
    TempoChanged(f64),
    TimeSignatureChanged {
        numerator: u32,
        denominator: u32,
    },
    TrackPropertyChanged {
        track: TrackId,
        field: TrackField,
    },
    ClipAdded {
        track: TrackId,
        clip: ClipId,
    },
    ClipRemoved {
        track: TrackId,
        clip: ClipId,
    },
    SampleRateMismatch {
        track: TrackId,
        clip: ClipId,
        clip_rate: u32,
        mixer_rate: u32,
    },
}

/// Which track property changed, for [`EngineEvent::TrackPropertyChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackField {
    Volume,
    Pan,
    Muted,
    Solo,
    Armed,
}

/// Producer half of the notification queue; owned by control-thread callers.
pub struct EventSender(HeapProd<EngineEvent>);

/// Consumer half of the notification queue; owned by an observer thread.
pub struct EventReceiver(HeapCons<EngineEvent>);

/// Create a bounded notification channel.
///
/// `capacity` bounds memory, not correctness: if an observer falls behind,
/// the oldest unread event is dropped to make room rather than blocking the
/// control thread.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (prod, cons) = HeapRb::new(capacity).split();
    (EventSender(prod), EventReceiver(cons))
}

impl EventSender {
    /// Push an event, overwriting the oldest queued event on overflow.
    pub fn send(&mut self, event: EngineEvent) {
        let _ = self.0.push_overwrite(event);
    }
}

impl EventReceiver {
    /// Drain one event, if any is queued.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.0.try_pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_receive() {
        let (mut tx, mut rx) = event_channel(4);
        tx.send(EngineEvent::TransportStateChanged);
        assert_eq!(rx.try_recv(), Some(EngineEvent::TransportStateChanged));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let (mut tx, mut rx) = event_channel(1);
        tx.send(EngineEvent::TempoChanged(120.0));
        tx.send(EngineEvent::TempoChanged(140.0));
        assert_eq!(rx.try_recv(), Some(EngineEvent::TempoChanged(140.0)));
    }
}
