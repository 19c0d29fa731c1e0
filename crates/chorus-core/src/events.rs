//! Playback notifications.
//!
//! Voices report lifecycle events into their group's queue; the group
//! delivers them to observers and event streams before the operation or
//! tick that produced them returns.

use std::fmt;

use chorus_common::{GroupId, SoundHandle};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Kind of lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEventKind {
    /// The voice started producing sound (delay elapsed).
    Played,
    /// A looping voice wrapped around to the start of its clip.
    PlaybackCompleted,
    /// The voice finished its fade-out and returned to idle.
    Stopped,
}

/// A notification tagged with the playback it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEvent {
    /// What happened.
    pub kind: SoundEventKind,
    /// The playback it happened to.
    pub handle: SoundHandle,
}

impl SoundEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(kind: SoundEventKind, handle: SoundHandle) -> Self {
        Self { kind, handle }
    }

    /// Group that owns the playback.
    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.handle.group_id()
    }
}

/// Identifies one registered callback, for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Observer callback receiving the handle an event concerns.
pub type Callback = Box<dyn FnMut(SoundHandle)>;

/// Per-kind observer lists of one group.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    played: Vec<(SubscriptionId, Callback)>,
    playback_completed: Vec<(SubscriptionId, Callback)>,
    stopped: Vec<(SubscriptionId, Callback)>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("played", &self.played.len())
            .field("playback_completed", &self.playback_completed.len())
            .field("stopped", &self.stopped.len())
            .finish_non_exhaustive()
    }
}

impl Subscribers {
    /// Create empty observer lists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, kind: SoundEventKind) -> &mut Vec<(SubscriptionId, Callback)> {
        match kind {
            SoundEventKind::Played => &mut self.played,
            SoundEventKind::PlaybackCompleted => &mut self.playback_completed,
            SoundEventKind::Stopped => &mut self.stopped,
        }
    }

    /// Register a callback for one kind of event.
    pub fn subscribe<F>(&mut self, kind: SoundEventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(SoundHandle) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.list_mut(kind).push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&mut self, kind: SoundEventKind, id: SubscriptionId) -> bool {
        let list = self.list_mut(kind);
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Number of callbacks registered for a kind.
    #[must_use]
    pub fn count(&self, kind: SoundEventKind) -> usize {
        match kind {
            SoundEventKind::Played => self.played.len(),
            SoundEventKind::PlaybackCompleted => self.playback_completed.len(),
            SoundEventKind::Stopped => self.stopped.len(),
        }
    }

    /// Invoke every callback registered for the event's kind, in
    /// registration order.
    pub fn dispatch(&mut self, event: &SoundEvent) {
        for (_, callback) in self.list_mut(event.kind).iter_mut() {
            callback(event.handle);
        }
    }
}

/// Channel senders feeding [`SoundEvent`] streams.
#[derive(Debug, Default, Clone)]
pub struct EventTaps {
    senders: Vec<Sender<SoundEvent>>,
}

impl EventTaps {
    /// Open a new unbounded stream and return its receiving end.
    pub fn open() -> (Sender<SoundEvent>, Receiver<SoundEvent>) {
        crossbeam_channel::unbounded()
    }

    /// Attach a sender.
    pub fn attach(&mut self, sender: Sender<SoundEvent>) {
        self.senders.push(sender);
    }

    /// Number of live senders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Whether no stream is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Send an event to every stream, dropping streams whose receiver is gone.
    pub fn publish(&mut self, event: SoundEvent) {
        self.senders.retain(|sender| sender.send(event).is_ok());
    }
}
