pub mod api;
pub mod auth;
pub mod chart;
pub mod config;
pub mod data;
mod error;
pub mod i18n;
pub mod model;

pub use api::{CrudHandler, CrudModel, ResourceDescriptor};
pub use auth::{Authorizer, SecurityContext};
pub use chart::{ChartData, Dataset, DateUnit, LineChart};
pub use config::ModelConfig;
pub use data::{
    Criteria, EntityId, EventNotifier, ForeignRecord, LeadId, LifecycleAction, ListenerToken,
    MemoryStore, Notification, NotificationEvent, PageOpts, PageResult, PrincipalId, Record,
    SortOrder, StatRecord, StorageBackend, StoreHandle, Timestamp, Value,
};
pub use error::{Error, Result};
pub use i18n::{Catalog, Translator};
pub use model::{LookupOptions, LookupResults, NotificationModel, TrackableLink, TrackableSource};

/// Build a `Criteria` map of column-equality constraints
///
/// # Example
///
/// ```
/// use qnotify_rs::scriteria;
///
/// let criteria = scriteria! { "source" => "email", "lead_id" => 42 };
/// assert_eq!(criteria.len(), 2);
/// ```
#[macro_export]
macro_rules! scriteria {
    () => {
        $crate::Criteria::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        {
            let mut criteria = $crate::Criteria::new();
            $(
                criteria.insert($column.to_string(), $crate::Value::from($value));
            )+
            criteria
        }
    };
}

#[cfg(test)]
mod test;
