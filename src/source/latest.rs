//! Single-slot hand-off between a producer thread and the frame-processing thread.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::source::Frame;

/// How the producer paces itself against the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Producer never waits; unconsumed frames are overwritten by newer ones.
    #[default]
    LatestWins,
    /// Producer waits for each frame to be taken before grabbing the next, so
    /// recorded playback never skips frames.
    Lockstep,
}

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,
    /// Holds a frame the consumer has not taken yet
    fresh: bool,
    closed: bool,
    /// Frames overwritten before the consumer saw them
    overwritten: u64,
}

/// Latest-frame cell guarded by a mutex and a condition variable.
///
/// The consumer copies the frame out under the lock and releases it at once,
/// so capture of the next frame overlaps with processing of this one.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any frame not yet taken. Returns `false` once closed.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut slot = self.slot.lock();
        if slot.closed {
            return false;
        }
        if slot.fresh {
            slot.overwritten += 1;
        }
        slot.frame = Some(frame);
        slot.fresh = true;
        drop(slot);
        self.changed.notify_all();
        true
    }

    /// Block until the pending frame has been taken. Returns `false` once closed.
    pub fn wait_consumed(&self) -> bool {
        let mut slot = self.slot.lock();
        while slot.fresh && !slot.closed {
            self.changed.wait(&mut slot);
        }
        !slot.closed
    }

    /// Block until a frame newer than the last one taken is ready and copy it out.
    ///
    /// A frame published before [`close`](Self::close) is still delivered;
    /// after that, `None`.
    pub fn take(&self) -> Option<Frame> {
        let mut slot = self.slot.lock();
        while !slot.fresh && !slot.closed {
            self.changed.wait(&mut slot);
        }
        self.take_locked(slot)
    }

    /// Like [`take`](Self::take) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !slot.fresh && !slot.closed {
            if self.changed.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        self.take_locked(slot)
    }

    /// Take a pending frame without blocking.
    pub fn try_take(&self) -> Option<Frame> {
        let slot = self.slot.lock();
        self.take_locked(slot)
    }

    fn take_locked(&self, mut slot: parking_lot::MutexGuard<'_, Slot>) -> Option<Frame> {
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        let frame = slot.frame.clone();
        drop(slot);
        self.changed.notify_all();
        frame
    }

    /// Forget the pending frame so the next one delivered is produced after this call.
    pub fn discard(&self) {
        let mut slot = self.slot.lock();
        slot.fresh = false;
        slot.frame = None;
        drop(slot);
        self.changed.notify_all();
    }

    /// Stop accepting frames and wake every waiter.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Frames replaced before the consumer took them.
    pub fn overwritten(&self) -> u64 {
        self.slot.lock().overwritten
    }
}
