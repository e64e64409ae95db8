use std::cell::Cell;

use ahash::AHashMap;
use itertools::Itertools;

use crate::data::{
    Criteria, EntityId, LookupRow, Notification, NotificationListQuery, PageOpts, PageResult,
    SortOrder, StatRecord, StorageBackend, TimeDataQuery, Timestamp, Value,
};
use crate::{Error, Result};

pub const STATS_TABLE: &str = "push_notification_stats";
pub const STATS_DATE_COLUMN: &str = "date_sent";

#[derive(Debug, Clone)]
enum StagedWrite {
    Save(Notification),
    Delete(EntityId),
    Stat(StatRecord),
}

/// In-memory storage backend with staged writes and auto-increment ids
#[derive(Debug)]
pub struct MemoryStore {
    notifications: AHashMap<EntityId, Notification>,
    stats: Vec<StatRecord>,
    staged: Vec<StagedWrite>,
    next_notification_id: u64,
    next_stat_id: u64,
    flush_count: usize,
    reads: Cell<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            notifications: AHashMap::new(),
            stats: Vec::new(),
            staged: Vec::new(),
            next_notification_id: 1,
            next_stat_id: 1,
            flush_count: 0,
            reads: Cell::new(0),
        }
    }

    /// Number of flushes performed since creation
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Number of single-row reads served since creation
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Writes staged but not yet flushed
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    /// A notification as committed by the last flush, ignoring staged writes
    pub fn committed(&self, id: EntityId) -> Option<&Notification> {
        self.notifications.get(&id)
    }

    pub fn committed_count(&self) -> usize {
        self.notifications.len()
    }

    pub fn committed_stats(&self) -> &[StatRecord] {
        &self.stats
    }

    fn visible_notifications(&self) -> AHashMap<EntityId, Notification> {
        let mut visible = self.notifications.clone();
        for write in &self.staged {
            match write {
                StagedWrite::Save(notification) => {
                    if let Some(id) = notification.id {
                        visible.insert(id, notification.clone());
                    }
                }
                StagedWrite::Delete(id) => {
                    visible.remove(id);
                }
                StagedWrite::Stat(_) => {}
            }
        }
        visible
    }

    fn visible_stats(&self) -> impl Iterator<Item = &StatRecord> {
        self.stats.iter().chain(self.staged.iter().filter_map(|write| match write {
            StagedWrite::Stat(stat) => Some(stat),
            _ => None,
        }))
    }

    fn lookup(&self, id: EntityId) -> Option<Notification> {
        for write in self.staged.iter().rev() {
            match write {
                StagedWrite::Save(notification) if notification.id == Some(id) => {
                    return Some(notification.clone());
                }
                StagedWrite::Delete(deleted) if *deleted == id => return None,
                _ => {}
            }
        }
        self.notifications.get(&id).cloned()
    }
}

fn stat_matches(stat: &StatRecord, criteria: &Criteria) -> Result<bool> {
    for (column, expected) in criteria {
        let actual = stat.column(column).ok_or_else(|| {
            Error::StoreFailure(format!("Unknown column '{}' in {}", column, STATS_TABLE))
        })?;
        if actual != *expected {
            return Ok(false);
        }
    }
    Ok(true)
}

impl StorageBackend for MemoryStore {
    fn get(&self, id: EntityId) -> Result<Option<Notification>> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.lookup(id))
    }

    fn save(&mut self, notification: &mut Notification, flush: bool) -> Result<()> {
        match notification.id {
            None => {
                notification.id = Some(EntityId(self.next_notification_id));
                self.next_notification_id += 1;
            }
            // Explicit ids must never be handed out again
            Some(EntityId(id)) => {
                self.next_notification_id = self.next_notification_id.max(id.saturating_add(1));
            }
        }

        log::debug!("Staging notification {:?} '{}'", notification.id, notification.name);
        self.staged.push(StagedWrite::Save(notification.clone()));

        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn delete(&mut self, id: EntityId, flush: bool) -> Result<()> {
        if self.lookup(id).is_none() {
            return Err(Error::NotFound {
                kind: "Notification",
                id,
            });
        }

        self.staged.push(StagedWrite::Delete(id));

        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn save_stat(&mut self, stat: &mut StatRecord, flush: bool) -> Result<()> {
        match stat.id() {
            None => {
                stat.assign_id(EntityId(self.next_stat_id));
                self.next_stat_id += 1;
            }
            Some(EntityId(id)) => {
                self.next_stat_id = self.next_stat_id.max(id.saturating_add(1));
            }
        }

        self.staged.push(StagedWrite::Stat(stat.clone()));

        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        log::debug!("Flushing {} staged write(s)", staged.len());

        for write in staged {
            match write {
                StagedWrite::Save(notification) => {
                    if let Some(id) = notification.id {
                        self.notifications.insert(id, notification);
                    }
                }
                StagedWrite::Delete(id) => {
                    self.notifications.remove(&id);
                }
                StagedWrite::Stat(stat) => self.stats.push(stat),
            }
        }

        self.flush_count += 1;
        Ok(())
    }

    fn find_stats(
        &self,
        criteria: &Criteria,
        order_by: Option<(&str, SortOrder)>,
    ) -> Result<Vec<StatRecord>> {
        let mut found = Vec::new();
        for stat in self.visible_stats() {
            if stat_matches(stat, criteria)? {
                found.push(stat.clone());
            }
        }

        if let Some((column, order)) = order_by {
            if !StatRecord::COLUMNS.contains(&column) {
                return Err(Error::StoreFailure(format!(
                    "Unknown order column '{}' in {}",
                    column, STATS_TABLE
                )));
            }

            found.sort_by(|a, b| {
                let a = a.column(column).unwrap_or(Value::Null);
                let b = b.column(column).unwrap_or(Value::Null);
                match order {
                    SortOrder::Asc => a.compare(&b),
                    SortOrder::Desc => b.compare(&a),
                }
            });
        }

        Ok(found)
    }

    fn stat_by_tracking_hash(&self, tracking_hash: &str) -> Result<Option<StatRecord>> {
        Ok(self
            .visible_stats()
            .find(|stat| stat.tracking_hash() == tracking_hash)
            .cloned())
    }

    fn load_time_data(&self, query: &TimeDataQuery) -> Result<Vec<Timestamp>> {
        if query.table != STATS_TABLE {
            return Err(Error::StoreFailure(format!("Unknown table '{}'", query.table)));
        }
        if query.column != STATS_DATE_COLUMN {
            return Err(Error::StoreFailure(format!(
                "Column '{}' of {} is not a timestamp",
                query.column, STATS_TABLE
            )));
        }

        let owners = query.created_by.map(|_| self.visible_notifications());

        let mut timestamps = Vec::new();
        for stat in self.visible_stats() {
            let sent = stat.date_sent();
            if sent < query.from || sent >= query.to {
                continue;
            }
            if !stat_matches(stat, &query.filter)? {
                continue;
            }
            if let (Some(owner), Some(notifications)) = (query.created_by, owners.as_ref()) {
                let created_by = notifications
                    .get(&stat.notification_id())
                    .and_then(|notification| notification.created_by);
                if created_by != Some(owner) {
                    continue;
                }
            }
            timestamps.push(sent);
        }

        timestamps.sort();
        Ok(timestamps)
    }

    fn notification_list(&self, query: &NotificationListQuery) -> Result<Vec<LookupRow>> {
        let search = query.search.to_lowercase();
        let limit = if query.limit == 0 { usize::MAX } else { query.limit };

        let rows = self
            .visible_notifications()
            .into_iter()
            .map(|(_, n)| n)
            .filter(|n| n.is_published && n.mobile == query.mobile)
            .filter(|n| n.name.to_lowercase().starts_with(&search))
            .filter(|n| query.view_other || (query.owner.is_some() && n.created_by == query.owner))
            .filter(|n| match &query.notification_type {
                Some(notification_type) => n.notification_type.as_ref() == Some(notification_type),
                None => true,
            })
            .sorted_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)))
            .skip(query.start)
            .take(limit)
            .filter_map(|n| {
                n.id.map(|id| LookupRow {
                    id,
                    name: n.name,
                    language: n.language,
                })
            })
            .collect();

        Ok(rows)
    }

    fn list_notifications(&self, page: PageOpts) -> Result<PageResult<Notification>> {
        let all = self
            .visible_notifications()
            .into_iter()
            .map(|(_, n)| n)
            .sorted_by_key(|n| n.id)
            .collect::<Vec<_>>();

        Ok(page.paginate(all))
    }
}
