use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle returned by [`EventNotifier::register`](crate::EventNotifier::register).
/// Pass it back to `unregister` to detach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerToken(Uuid);

impl ListenerToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0.simple())
    }
}
