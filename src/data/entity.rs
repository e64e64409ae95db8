use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::{now, EntityId, LeadId, PrincipalId, Timestamp, Value};
use crate::{Error, Result};

pub const DEFAULT_LANGUAGE: &str = "en";

/// A push notification managed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Option<EntityId>,
    pub name: String,
    pub heading: Option<String>,
    pub message: String,
    pub url: Option<String>,
    /// Locale tag used to group lookup results
    pub language: String,
    /// Channel classification, e.g. "template" or "list"
    pub notification_type: Option<String>,
    /// Marks the secondary "mobile" channel variant
    pub mobile: bool,
    pub is_published: bool,
    pub created_by: Option<PrincipalId>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_added: Option<Timestamp>,
    pub modified_by: Option<PrincipalId>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_modified: Option<Timestamp>,
    /// Edit lock, held while a user has the notification open
    #[serde(with = "time::serde::rfc3339::option")]
    pub checked_out: Option<Timestamp>,
    pub checked_out_by: Option<PrincipalId>,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            heading: None,
            message: String::new(),
            url: None,
            language: DEFAULT_LANGUAGE.to_string(),
            notification_type: None,
            mobile: false,
            is_published: true,
            created_by: None,
            date_added: None,
            modified_by: None,
            date_modified: None,
            checked_out: None,
            checked_out_by: None,
        }
    }
}

impl Notification {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_type(mut self, notification_type: impl Into<String>) -> Self {
        self.notification_type = Some(notification_type.into());
        self
    }

    pub fn mobile(mut self) -> Self {
        self.mobile = true;
        self
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_checked_out(&self) -> bool {
        self.checked_out.is_some()
    }

    /// Place the edit lock on behalf of `principal`
    pub fn check_out(&mut self, principal: PrincipalId) {
        self.checked_out = Some(now());
        self.checked_out_by = Some(principal);
    }

    pub fn check_in(&mut self) {
        self.checked_out = None;
        self.checked_out_by = None;
    }
}

/// Immutable record of one notification delivered to one lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    id: Option<EntityId>,
    notification_id: EntityId,
    lead_id: LeadId,
    #[serde(with = "time::serde::rfc3339")]
    date_sent: Timestamp,
    tracking_hash: String,
    source: Option<String>,
    source_id: Option<String>,
}

impl StatRecord {
    pub const COLUMNS: [&'static str; 7] = [
        "id",
        "notification_id",
        "lead_id",
        "date_sent",
        "tracking_hash",
        "source",
        "source_id",
    ];

    /// Build a delivery record stamped with the current time.
    /// Fails if the notification has never been persisted.
    pub fn new(
        notification: &Notification,
        lead_id: LeadId,
        source: Option<String>,
        source_id: Option<String>,
    ) -> Result<Self> {
        let notification_id = notification.id.ok_or_else(|| {
            Error::InvalidReference(format!(
                "notification '{}' has not been persisted",
                notification.name
            ))
        })?;

        Ok(Self {
            id: None,
            notification_id,
            lead_id,
            date_sent: now(),
            tracking_hash: Uuid::new_v4().simple().to_string(),
            source,
            source_id,
        })
    }

    /// Backdate a record, for imports of past deliveries
    pub fn with_date_sent(mut self, at: Timestamp) -> Self {
        self.date_sent = at;
        self
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn notification_id(&self) -> EntityId {
        self.notification_id
    }

    pub fn lead_id(&self) -> LeadId {
        self.lead_id
    }

    pub fn date_sent(&self) -> Timestamp {
        self.date_sent
    }

    pub fn tracking_hash(&self) -> &str {
        &self.tracking_hash
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Identity is assigned exactly once, by the store
    pub(crate) fn assign_id(&mut self, id: EntityId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    /// Read a column by its storage name, `None` if no such column exists
    pub fn column(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "notification_id" | "notification" => Some(self.notification_id.into()),
            "lead_id" | "lead" => Some(self.lead_id.into()),
            "date_sent" => Some(self.date_sent.into()),
            "tracking_hash" => Some(self.tracking_hash.clone().into()),
            "source" => Some(self.source.clone().into()),
            "source_id" => Some(self.source_id.clone().into()),
            _ => None,
        }
    }
}

/// An entity owned by another model (a role, a tweet, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignRecord {
    pub type_name: String,
    pub id: Option<EntityId>,
}

impl ForeignRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
        }
    }
}

/// Everything a batch save may be handed, tagged by variant
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// The evented type this model is bound to
    Notification(Notification),
    /// Persisted without lifecycle events
    Stat(StatRecord),
    Foreign(ForeignRecord),
}

impl Record {
    pub fn id(&self) -> Option<EntityId> {
        match self {
            Record::Notification(n) => n.id,
            Record::Stat(s) => s.id,
            Record::Foreign(f) => f.id,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn type_name(&self) -> &str {
        match self {
            Record::Notification(_) => "Notification",
            Record::Stat(_) => "Stat",
            Record::Foreign(f) => f.type_name.as_str(),
        }
    }

    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Record::Notification(n) => Some(n),
            _ => None,
        }
    }
}

impl From<Notification> for Record {
    fn from(notification: Notification) -> Self {
        Record::Notification(notification)
    }
}

impl From<StatRecord> for Record {
    fn from(stat: StatRecord) -> Self {
        Record::Stat(stat)
    }
}

impl From<ForeignRecord> for Record {
    fn from(record: ForeignRecord) -> Self {
        Record::Foreign(record)
    }
}
