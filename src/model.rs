//! The notification model: persistence with lifecycle events, delivery
//! statistics, hit charts and autocomplete lookups.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::auth::Authorizer;
use crate::chart::{ChartData, DateUnit, LineChart};
use crate::config::ModelConfig;
use crate::data::{
    now, Criteria, EntityId, EventNotifier, LeadId, LifecycleAction, Notification,
    NotificationEvent, NotificationListQuery, Record, SortOrder, StatRecord, StoreHandle,
    TimeDataQuery, Timestamp,
};
use crate::i18n::{Translator, TOTAL_SENT_KEY};
use crate::{Error, Result};

/// Reserved filter key selecting which chart series are computed
pub const FLAG_KEY: &str = "flag";
pub const FLAG_TOTAL_AND_UNIQUE: &str = "total_and_unique";

/// Channel name under which notification links are tracked
pub const TRACKABLE_CHANNEL: &str = "notification";

/// Lookup results grouped by locale tag, locales in ascending order
pub type LookupResults = BTreeMap<String, Vec<(EntityId, String)>>;

/// Which sub-collection a lookup searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Notification,
    MobileNotification,
}

impl LookupKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "notification" | "primary" => Some(LookupKind::Notification),
            "mobile_notification" | "mobile" => Some(LookupKind::MobileNotification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOptions {
    pub notification_type: Option<String>,
}

/// Click statistics of one tracked link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackableLink {
    pub redirect_id: String,
    pub url: String,
    pub hits: u64,
    pub unique_hits: u64,
}

/// Source of tracked links embedded in sent content
pub trait TrackableSource {
    fn trackable_list(&self, channel: &str, channel_id: EntityId) -> Vec<TrackableLink>;
}

pub struct NotificationModel {
    store: StoreHandle,
    events: EventNotifier,
    authorizer: Rc<dyn Authorizer>,
    translator: Rc<dyn Translator>,
    trackables: Option<Rc<dyn TrackableSource>>,
    config: ModelConfig,
}

impl NotificationModel {
    pub fn new(
        store: StoreHandle,
        authorizer: Rc<dyn Authorizer>,
        translator: Rc<dyn Translator>,
        config: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            events: EventNotifier::new(store.clone()),
            store,
            authorizer,
            translator,
            trackables: None,
            config,
        })
    }

    pub fn with_trackables(mut self, trackables: Rc<dyn TrackableSource>) -> Self {
        self.trackables = Some(trackables);
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn authorizer(&self) -> &Rc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn events(&self) -> &EventNotifier {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventNotifier {
        &mut self.events
    }

    pub fn permission_base(&self) -> &str {
        &self.config.permission_base
    }

    /// A fresh notification when `id` is `None`, otherwise the stored one
    pub fn entity(&self, id: Option<EntityId>) -> Result<Notification> {
        match id {
            None => Ok(Notification::default()),
            Some(id) => self.store.borrow().get(id)?.ok_or(Error::NotFound {
                kind: "Notification",
                id,
            }),
        }
    }

    /// Forward a lifecycle event to the listeners registered for it
    pub fn dispatch_event(
        &self,
        action: &str,
        entity: &Record,
        is_new: bool,
        event: Option<NotificationEvent>,
    ) -> Result<Option<NotificationEvent>> {
        self.events.notify(action, entity, is_new, event)
    }

    fn set_timestamps(&self, notification: &mut Notification, is_new: bool, unlock: bool) {
        let principal = self.authorizer.current_principal();
        let at = now();

        if is_new {
            notification.date_added = Some(at);
            notification.created_by = principal;
        }
        notification.date_modified = Some(at);
        notification.modified_by = principal;

        if unlock {
            notification.check_in();
        }
    }

    /// Run `pre_save` listeners, adopting their edits to the notification
    fn pre_save(
        &self,
        notification: &mut Notification,
        is_new: bool,
    ) -> Option<NotificationEvent> {
        let event = self
            .events
            .dispatch(LifecycleAction::PreSave, notification, is_new, None);
        if let Some(event) = &event {
            *notification = event.entity().clone();
        }
        event
    }

    /// Save a single notification with paired save events, flushing immediately
    pub fn save_entity(&mut self, notification: &mut Notification, unlock: bool) -> Result<()> {
        let is_new = notification.is_new();
        self.set_timestamps(notification, is_new, unlock);

        let event = self.pre_save(notification, is_new);
        self.store.borrow_mut().save(notification, true)?;
        self.events
            .dispatch(LifecycleAction::PostSave, notification, is_new, event);

        Ok(())
    }

    /// Save every record in order, flushing after each full batch and once at the end.
    ///
    /// A foreign record aborts the call with `UnsupportedEntityType` after the records
    /// before it have been flushed; records after it are left untouched.
    pub fn save_entities(&mut self, records: &mut [Record], unlock: bool) -> Result<()> {
        let batch_size = self.config.batch_size;

        for (index, record) in records.iter_mut().enumerate() {
            let is_new = record.is_new();

            match record {
                Record::Notification(notification) => {
                    self.set_timestamps(notification, is_new, unlock);
                    let event = self.pre_save(notification, is_new);
                    self.store.borrow_mut().save(notification, false)?;
                    self.events
                        .dispatch(LifecycleAction::PostSave, notification, is_new, event);
                }
                Record::Stat(stat) => {
                    self.store.borrow_mut().save_stat(stat, false)?;
                }
                Record::Foreign(foreign) => {
                    log::warn!(
                        "Aborting batch save at record {}: {} is not persisted by this model",
                        index,
                        foreign.type_name
                    );
                    self.store.borrow_mut().flush()?;
                    return Err(Error::UnsupportedEntityType {
                        expected: "Notification",
                        found: foreign.type_name.clone(),
                    });
                }
            }

            if (index + 1) % batch_size == 0 {
                self.store.borrow_mut().flush()?;
            }
        }

        self.store.borrow_mut().flush()?;
        log::debug!("Saved {} record(s)", records.len());
        Ok(())
    }

    /// Delete a notification with paired delete events. The entity keeps its id.
    pub fn delete_entity(&mut self, notification: &Notification) -> Result<()> {
        let id = notification.id.ok_or_else(|| {
            Error::InvalidReference(format!(
                "notification '{}' has not been persisted",
                notification.name
            ))
        })?;

        let event = self
            .events
            .dispatch(LifecycleAction::PreDelete, notification, false, None);
        self.store.borrow_mut().delete(id, true)?;
        self.events
            .dispatch(LifecycleAction::PostDelete, notification, false, event);

        log::debug!("Deleted notification {}", id);
        Ok(())
    }

    /// Delete notifications by id, skipping ids that do not exist.
    /// Returns the deleted notifications.
    pub fn delete_entities(&mut self, ids: &[EntityId]) -> Result<Vec<Notification>> {
        let mut deleted = Vec::new();

        for (index, id) in ids.iter().enumerate() {
            let Some(notification) = self.store.borrow().get(*id)? else {
                continue;
            };

            let event = self
                .events
                .dispatch(LifecycleAction::PreDelete, &notification, false, None);
            self.store.borrow_mut().delete(*id, false)?;
            self.events
                .dispatch(LifecycleAction::PostDelete, &notification, false, event);
            deleted.push(notification);

            if (index + 1) % self.config.batch_size == 0 {
                self.store.borrow_mut().flush()?;
            }
        }

        self.store.borrow_mut().flush()?;
        Ok(deleted)
    }

    /// Record that `notification` was sent to `lead`, persisted immediately
    pub fn create_stat_entry(
        &mut self,
        notification: &Notification,
        lead: LeadId,
        source: Option<&str>,
        source_id: Option<&str>,
    ) -> Result<StatRecord> {
        let mut stat = StatRecord::new(
            notification,
            lead,
            source.map(str::to_string),
            source_id.map(str::to_string),
        )?;

        self.store.borrow_mut().save_stat(&mut stat, true)?;
        log::debug!(
            "Recorded delivery of notification {} to lead {}",
            stat.notification_id(),
            lead
        );
        Ok(stat)
    }

    /// The stat identified by a delivery tracking hash
    pub fn notification_status(&self, tracking_hash: &str) -> Result<Option<StatRecord>> {
        self.store.borrow().stat_by_tracking_hash(tracking_hash)
    }

    /// Deliveries of one notification to one lead, newest first
    pub fn stats_by_lead(
        &self,
        notification_id: EntityId,
        lead: LeadId,
    ) -> Result<Vec<StatRecord>> {
        let mut criteria = Criteria::new();
        criteria.insert("notification_id".to_string(), notification_id.into());
        criteria.insert("lead_id".to_string(), lead.into());

        self.store
            .borrow()
            .find_stats(&criteria, Some(("date_sent", SortOrder::Desc)))
    }

    /// Tracked links of a notification, empty without a trackable source
    pub fn click_stats(&self, notification_id: EntityId) -> Vec<TrackableLink> {
        self.trackables
            .as_ref()
            .map(|source| source.trackable_list(TRACKABLE_CHANNEL, notification_id))
            .unwrap_or_default()
    }

    /// Line chart of deliveries per `unit` over `[date_from, date_to]`.
    ///
    /// `filter` holds column-equality constraints on stat rows; its `flag` entry
    /// selects the series and never reaches the store. Without `can_view_others`
    /// only deliveries of notifications created by the current principal count.
    pub fn hits_line_chart_data(
        &self,
        unit: DateUnit,
        date_from: Timestamp,
        date_to: Timestamp,
        date_format: Option<&str>,
        mut filter: Criteria,
        can_view_others: bool,
    ) -> Result<ChartData> {
        let flag = filter.remove(FLAG_KEY);
        let mut chart = LineChart::new(unit, date_from, date_to, date_format)?;

        let total_sent = match &flag {
            None => true,
            Some(value) => value.is_null() || value.as_str() == Some(FLAG_TOTAL_AND_UNIQUE),
        };

        if total_sent {
            let data = match chart.range() {
                Some((from, to)) => {
                    let query = TimeDataQuery {
                        table: self.config.stats_table.clone(),
                        column: self.config.stats_date_column.clone(),
                        from,
                        to,
                        filter,
                        created_by: if can_view_others {
                            None
                        } else {
                            Some(self.owner()?)
                        },
                    };
                    let timestamps = self.store.borrow().load_time_data(&query)?;
                    chart.bucket_counts(&timestamps)
                }
                None => Vec::new(),
            };

            chart.set_dataset(self.translator.translate(TOTAL_SENT_KEY), data);
        }

        Ok(chart.render())
    }

    /// Autocomplete lookup of notification names grouped by locale
    pub fn lookup_results(
        &self,
        kind: &str,
        filter: &str,
        limit: Option<usize>,
        start: usize,
        options: &LookupOptions,
    ) -> Result<LookupResults> {
        let mut results = LookupResults::new();

        let Some(kind) = LookupKind::parse(kind) else {
            return Ok(results);
        };

        let view_other = self
            .authorizer
            .is_granted(&format!("{}:viewother", self.permission_base()));

        let query = NotificationListQuery {
            search: filter.to_string(),
            limit: limit.unwrap_or(self.config.lookup_limit),
            start,
            view_other,
            owner: self.authorizer.current_principal(),
            notification_type: options.notification_type.clone(),
            mobile: kind == LookupKind::MobileNotification,
        };

        for row in self.store.borrow().notification_list(&query)? {
            results
                .entry(row.language)
                .or_default()
                .push((row.id, row.name));
        }

        Ok(results)
    }

    fn owner(&self) -> Result<crate::PrincipalId> {
        self.authorizer
            .current_principal()
            .ok_or_else(|| Error::AccessDenied("no authenticated principal".to_string()))
    }
}
