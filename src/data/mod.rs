mod entity;
mod entity_id;
mod events;
mod listener_token;
mod pagination;
mod store;
mod store_trait;
mod value;

use std::collections::BTreeMap;

pub use entity::{ForeignRecord, Notification, Record, StatRecord, DEFAULT_LANGUAGE};
pub use entity_id::{EntityId, LeadId, PrincipalId};
pub use events::{EventNotifier, LifecycleAction, Listener, NotificationEvent};
pub use listener_token::ListenerToken;
pub use pagination::{PageOpts, PageResult};
pub use store::{MemoryStore, STATS_DATE_COLUMN, STATS_TABLE};
pub use store_trait::{
    LookupRow, NotificationListQuery, SortOrder, StorageBackend, StoreHandle, TimeDataQuery,
};
pub use value::Value;

/// Column-equality constraints keyed by column name
pub type Criteria = BTreeMap<String, Value>;

pub type Timestamp = time::OffsetDateTime;

pub fn now() -> Timestamp {
    time::OffsetDateTime::now_utc()
}
