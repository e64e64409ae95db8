use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::data::{
    Criteria, EntityId, Notification, PageOpts, PageResult, PrincipalId, StatRecord, Timestamp,
};
use crate::Result;

/// Shared, request-scoped handle to a storage backend
pub type StoreHandle = Rc<RefCell<dyn StorageBackend>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Raw time-series query: every timestamp in `column` of `table` within `[from, to)`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDataQuery {
    pub table: String,
    pub column: String,
    pub from: Timestamp,
    pub to: Timestamp,
    /// Column equality constraints
    pub filter: Criteria,
    /// Only rows whose parent notification was created by this principal
    pub created_by: Option<PrincipalId>,
}

/// Name search over notifications for autocomplete lookups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationListQuery {
    /// Case-insensitive name prefix, empty matches everything
    pub search: String,
    pub limit: usize,
    pub start: usize,
    /// When false, only rows created by `owner` are visible
    pub view_other: bool,
    pub owner: Option<PrincipalId>,
    pub notification_type: Option<String>,
    pub mobile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRow {
    pub id: EntityId,
    pub name: String,
    pub language: String,
}

/// Interface every storage backend implements.
///
/// Writes are staged until `flush`; reads observe staged writes.
pub trait StorageBackend {
    /// Load a notification by id
    fn get(&self, id: EntityId) -> Result<Option<Notification>>;

    /// Stage a notification, assigning its id if it is new
    fn save(&mut self, notification: &mut Notification, flush: bool) -> Result<()>;

    /// Stage removal of a notification
    fn delete(&mut self, id: EntityId, flush: bool) -> Result<()>;

    /// Stage a stat record, assigning its id
    fn save_stat(&mut self, stat: &mut StatRecord, flush: bool) -> Result<()>;

    /// Commit everything staged since the last flush
    fn flush(&mut self) -> Result<()>;

    /// Stat records matching every criterion, optionally ordered by a column
    fn find_stats(
        &self,
        criteria: &Criteria,
        order_by: Option<(&str, SortOrder)>,
    ) -> Result<Vec<StatRecord>>;

    fn stat_by_tracking_hash(&self, tracking_hash: &str) -> Result<Option<StatRecord>>;

    /// Timestamps feeding a time-series chart
    fn load_time_data(&self, query: &TimeDataQuery) -> Result<Vec<Timestamp>>;

    /// Published notifications matching a lookup, ordered by name
    fn notification_list(&self, query: &NotificationListQuery) -> Result<Vec<LookupRow>>;

    /// All notifications ordered by id
    fn list_notifications(&self, page: PageOpts) -> Result<PageResult<Notification>>;
}
