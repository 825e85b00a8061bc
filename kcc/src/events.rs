/*!
Per-motor notification channel.

Each motor owns its own [`EventChannel`]; there is no global registry. Listeners subscribe to
one [`MotorEventKind`] and are called synchronously, in subscription order, at the end of the
tick (or call) that produced the event.
*/

use slotmap::SlotMap;

use crate::scene::PlatformId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotorEvent {
    GroundedChanged { grounded: bool },
    /// Touched down after being airborne. `fall_height` is measured from the highest point
    /// reached while airborne.
    Landed { fall_height: f32 },
    PlatformChanged {
        previous: Option<PlatformId>,
        current: Option<PlatformId>,
    },
    TimeScaleChanged { previous: f32, current: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotorEventKind {
    GroundedChanged,
    Landed,
    PlatformChanged,
    TimeScaleChanged,
}

impl MotorEvent {
    pub fn kind(&self) -> MotorEventKind {
        match self {
            Self::GroundedChanged { .. } => MotorEventKind::GroundedChanged,
            Self::Landed { .. } => MotorEventKind::Landed,
            Self::PlatformChanged { .. } => MotorEventKind::PlatformChanged,
            Self::TimeScaleChanged { .. } => MotorEventKind::TimeScaleChanged,
        }
    }
}

slotmap::new_key_type! {
    /// Handle returned by [`EventChannel::subscribe`].
    pub struct SubscriptionId;
}

pub type Listener = Box<dyn FnMut(&MotorEvent)>;

struct Subscription {
    kind: MotorEventKind,
    listener: Listener,
}

#[derive(Default)]
pub struct EventChannel {
    subscriptions: SlotMap<SubscriptionId, Subscription>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: MotorEventKind, listener: Listener) -> SubscriptionId {
        self.subscriptions.insert(Subscription { kind, listener })
    }

    /// Returns false if `id` was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn emit(&mut self, event: MotorEvent) {
        log::trace!("Motor event {event:?}");
        let kind = event.kind();
        for (_, sub) in self.subscriptions.iter_mut() {
            if sub.kind == kind {
                (sub.listener)(&event);
            }
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
