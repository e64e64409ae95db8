use std::cell::Cell;

use ahash::AHashMap;

use crate::data::{ListenerToken, Notification, Record, StoreHandle};
use crate::{Error, Result};

/// Lifecycle points at which listeners are notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

impl LifecycleAction {
    /// Resolve an action name, `None` for anything outside the four lifecycle points
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "pre_save" => Some(LifecycleAction::PreSave),
            "post_save" => Some(LifecycleAction::PostSave),
            "pre_delete" => Some(LifecycleAction::PreDelete),
            "post_delete" => Some(LifecycleAction::PostDelete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::PreSave => "pre_save",
            LifecycleAction::PostSave => "post_save",
            LifecycleAction::PreDelete => "pre_delete",
            LifecycleAction::PostDelete => "post_delete",
        }
    }

    /// Fully qualified event name
    pub fn event_name(&self) -> &'static str {
        match self {
            LifecycleAction::PreSave => "notification.pre_save",
            LifecycleAction::PostSave => "notification.post_save",
            LifecycleAction::PreDelete => "notification.pre_delete",
            LifecycleAction::PostDelete => "notification.post_delete",
        }
    }
}

/// Payload handed to lifecycle listeners
pub struct NotificationEvent {
    entity: Notification,
    is_new: bool,
    store: StoreHandle,
    propagation_stopped: bool,
}

impl NotificationEvent {
    fn new(entity: Notification, is_new: bool, store: StoreHandle) -> Self {
        Self {
            entity,
            is_new,
            store,
            propagation_stopped: false,
        }
    }

    /// Snapshot of the notification at dispatch time
    pub fn entity(&self) -> &Notification {
        &self.entity
    }

    /// Edits made by a `pre_save` listener are persisted by the model.
    /// At any other point they only change this event's copy.
    pub fn entity_mut(&mut self) -> &mut Notification {
        &mut self.entity
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The store the notification is persisted through
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Prevent listeners registered after the current one from running
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl std::fmt::Debug for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEvent")
            .field("entity", &self.entity)
            .field("is_new", &self.is_new)
            .field("propagation_stopped", &self.propagation_stopped)
            .finish()
    }
}

pub type Listener = Box<dyn Fn(&mut NotificationEvent)>;

/// Registry of lifecycle listeners bound to the notification type
pub struct EventNotifier {
    store: StoreHandle,
    listeners: AHashMap<LifecycleAction, Vec<(ListenerToken, Listener)>>,
    events_built: Cell<usize>,
}

impl EventNotifier {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            listeners: AHashMap::new(),
            events_built: Cell::new(0),
        }
    }

    /// Register a listener; listeners run in registration order
    pub fn register(
        &mut self,
        action: LifecycleAction,
        listener: impl Fn(&mut NotificationEvent) + 'static,
    ) -> ListenerToken {
        let token = ListenerToken::generate();
        self.listeners
            .entry(action)
            .or_default()
            .push((token, Box::new(listener)));
        token
    }

    /// Remove a listener by its token, returns false if it was not registered
    pub fn unregister(&mut self, token: &ListenerToken) -> bool {
        let mut removed = false;
        for listeners in self.listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|(t, _)| t != token);
            removed |= listeners.len() != before;
        }
        if removed {
            log::trace!("Unregistered {}", token);
        }
        removed
    }

    pub fn has_listeners(&self, action: LifecycleAction) -> bool {
        self.listeners
            .get(&action)
            .map(|listeners| !listeners.is_empty())
            .unwrap_or(false)
    }

    /// Number of event payloads constructed so far
    pub fn events_built(&self) -> usize {
        self.events_built.get()
    }

    /// Notify listeners of `action` for `entity`.
    ///
    /// Fails if `entity` is not a notification. Returns `None` for unknown actions
    /// and when nobody listens; otherwise the dispatched event, which may be passed
    /// back in as `event` for the paired action.
    pub fn notify(
        &self,
        action: &str,
        entity: &Record,
        is_new: bool,
        event: Option<NotificationEvent>,
    ) -> Result<Option<NotificationEvent>> {
        let notification = match entity {
            Record::Notification(notification) => notification,
            other => {
                return Err(Error::UnsupportedEntityType {
                    expected: "Notification",
                    found: other.type_name().to_string(),
                })
            }
        };

        match LifecycleAction::parse(action) {
            Some(action) => Ok(self.dispatch(action, notification, is_new, event)),
            None => Ok(None),
        }
    }

    /// Typed dispatch for callers that already hold a notification
    pub fn dispatch(
        &self,
        action: LifecycleAction,
        notification: &Notification,
        is_new: bool,
        event: Option<NotificationEvent>,
    ) -> Option<NotificationEvent> {
        let listeners = match self.listeners.get(&action) {
            Some(listeners) if !listeners.is_empty() => listeners,
            _ => return None,
        };

        let mut event = match event {
            Some(mut event) => {
                event.entity = notification.clone();
                event.propagation_stopped = false;
                event
            }
            None => {
                self.events_built.set(self.events_built.get() + 1);
                NotificationEvent::new(notification.clone(), is_new, self.store.clone())
            }
        };

        log::trace!(
            "Dispatching {} to {} listener(s)",
            action.event_name(),
            listeners.len()
        );

        for (_, listener) in listeners {
            listener(&mut event);
            if event.is_propagation_stopped() {
                break;
            }
        }

        Some(event)
    }
}
