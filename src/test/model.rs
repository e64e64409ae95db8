use std::cell::RefCell;
use std::rc::Rc;

use time::macros::datetime;

use crate::data::{LookupRow, NotificationListQuery, TimeDataQuery};
use crate::test::{seed_notification, setup_model, setup_model_with_config};
use crate::*;

fn notifications(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::from(Notification::new(format!("Notification {}", i), "Body")))
        .collect()
}

fn count_events(model: &mut NotificationModel, action: LifecycleAction) -> Rc<RefCell<usize>> {
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    model
        .events_mut()
        .register(action, move |_| *counter.borrow_mut() += 1);
    count
}

#[test]
fn test_entity_without_id_does_not_touch_store() -> Result<()> {
    let fixture = setup_model(SecurityContext::anonymous());

    let fresh = fixture.model.entity(None)?;
    assert!(fresh.is_new());
    assert_eq!(fresh.language, "en");
    assert!(fresh.is_published);
    assert_eq!(fixture.store.borrow().reads(), 0);
    Ok(())
}

#[test]
fn test_entity_by_id() -> Result<()> {
    let fixture = setup_model(SecurityContext::anonymous());
    let saved = seed_notification(&fixture.store, Notification::new("Welcome", "Hi"), None);
    let id = saved.id.expect("seeded");

    assert_eq!(fixture.model.entity(Some(id))?, saved);
    assert_eq!(fixture.store.borrow().reads(), 1);

    let missing = fixture.model.entity(Some(EntityId(404)));
    assert!(matches!(missing, Err(Error::NotFound { id: EntityId(404), .. })));
    Ok(())
}

#[test]
fn test_save_entities_flushes_once_per_batch_and_at_end() -> Result<()> {
    for (batch_size, count, expected) in [
        (20, 0, 1),
        (20, 1, 1),
        (20, 19, 1),
        (20, 20, 2),
        (20, 45, 3),
        (3, 6, 3),
        (3, 7, 3),
        (1, 4, 5),
    ] {
        let config = ModelConfig {
            batch_size,
            ..ModelConfig::default()
        };
        let mut fixture = setup_model_with_config(SecurityContext::anonymous(), config);
        let mut records = notifications(count);

        fixture.model.save_entities(&mut records, false)?;

        let store = fixture.store.borrow();
        assert_eq!(
            store.flush_count(),
            expected,
            "batch size {} with {} record(s)",
            batch_size,
            count
        );
        assert_eq!(store.committed_count(), count);
        assert_eq!(store.pending_writes(), 0);
    }
    Ok(())
}

#[test]
fn test_save_entities_mixes_notifications_and_stats() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::with_subject(PrincipalId(3)));
    let parent = seed_notification(&fixture.store, Notification::new("Parent", ""), None);
    let pre_saves = count_events(&mut fixture.model, LifecycleAction::PreSave);
    let post_saves = count_events(&mut fixture.model, LifecycleAction::PostSave);

    let mut records = vec![
        Record::from(Notification::new("A", "")),
        Record::from(StatRecord::new(&parent, LeadId(1), None, None)?),
        Record::from(Notification::new("B", "")),
    ];
    fixture.model.save_entities(&mut records, true)?;

    assert!(records.iter().all(|r| !r.is_new()));
    assert_eq!(*pre_saves.borrow(), 2);
    assert_eq!(*post_saves.borrow(), 2);
    // Each pre/post pair shares one event
    assert_eq!(fixture.model.events().events_built(), 2);
    assert_eq!(fixture.store.borrow().committed_stats().len(), 1);
    Ok(())
}

#[test]
fn test_save_entities_aborts_on_foreign_record() {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let mut records = vec![
        Record::from(Notification::new("First", "")),
        Record::from(Notification::new("Second", "")),
        Record::from(ForeignRecord::new("Tweet")),
        Record::from(Notification::new("Third", "")),
    ];

    let result = fixture.model.save_entities(&mut records, false);

    assert!(matches!(
        result,
        Err(Error::UnsupportedEntityType { ref found, .. }) if found == "Tweet"
    ));
    let store = fixture.store.borrow();
    assert_eq!(store.committed_count(), 2);
    assert_eq!(store.pending_writes(), 0);
    assert_eq!(store.flush_count(), 1);
    assert!(records[3].is_new());
}

#[test]
fn test_save_entity_stamps_audit_fields() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::with_subject(PrincipalId(7)));
    let mut notification = Notification::new("Welcome", "Hi");
    notification.check_out(PrincipalId(7));

    fixture.model.save_entity(&mut notification, false)?;

    let id = notification.id.expect("saved");
    let added = notification.date_added.expect("date_added set");
    assert_eq!(notification.created_by, Some(PrincipalId(7)));
    assert_eq!(notification.modified_by, Some(PrincipalId(7)));
    assert!(notification.date_modified.is_some());
    assert!(notification.is_checked_out());
    assert_eq!(fixture.store.borrow().flush_count(), 1);

    notification.name = "Welcome back".to_string();
    fixture.model.save_entity(&mut notification, true)?;

    let stored = fixture.model.entity(Some(id))?;
    assert_eq!(stored.name, "Welcome back");
    assert_eq!(stored.date_added, Some(added));
    assert!(!stored.is_checked_out());
    Ok(())
}

#[test]
fn test_save_entity_reports_new_and_existing() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    fixture
        .model
        .events_mut()
        .register(LifecycleAction::PostSave, move |event| {
            log.borrow_mut().push((event.entity().id, event.is_new()))
        });

    let mut notification = Notification::new("Welcome", "");
    fixture.model.save_entity(&mut notification, false)?;
    fixture.model.save_entity(&mut notification, false)?;

    assert_eq!(
        *seen.borrow(),
        vec![(Some(EntityId(1)), true), (Some(EntityId(1)), false)]
    );
    Ok(())
}

#[test]
fn test_pre_save_listener_edits_are_persisted() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    fixture
        .model
        .events_mut()
        .register(LifecycleAction::PreSave, |event| {
            let heading = event.entity().name.to_uppercase();
            event.entity_mut().heading = Some(heading);
        });

    let mut notification = Notification::new("Welcome", "");
    fixture.model.save_entity(&mut notification, false)?;
    assert_eq!(notification.heading.as_deref(), Some("WELCOME"));
    let stored = fixture.store.borrow().committed(EntityId(1)).cloned();
    assert_eq!(stored.and_then(|n| n.heading), Some("WELCOME".to_string()));

    let mut records = vec![Record::from(Notification::new("Digest", ""))];
    fixture.model.save_entities(&mut records, false)?;
    let stored = fixture.store.borrow().committed(EntityId(2)).cloned();
    assert_eq!(stored.and_then(|n| n.heading), Some("DIGEST".to_string()));
    match &records[0] {
        Record::Notification(saved) => assert_eq!(saved.heading.as_deref(), Some("DIGEST")),
        other => panic!("unexpected record {:?}", other),
    }
    Ok(())
}

#[test]
fn test_dispatch_event_by_name() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let pre_deletes = count_events(&mut fixture.model, LifecycleAction::PreDelete);

    let record = Record::from(Notification::new("Welcome", ""));
    let event = fixture.model.dispatch_event("pre_delete", &record, false, None)?;
    assert!(event.is_some());
    assert!(fixture.model.dispatch_event("publish", &record, false, None)?.is_none());
    assert_eq!(*pre_deletes.borrow(), 1);
    Ok(())
}

#[test]
fn test_delete_entity() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let saved = seed_notification(&fixture.store, Notification::new("Doomed", ""), None);
    let pre_deletes = count_events(&mut fixture.model, LifecycleAction::PreDelete);
    let post_deletes = count_events(&mut fixture.model, LifecycleAction::PostDelete);

    fixture.model.delete_entity(&saved)?;

    assert_eq!(*pre_deletes.borrow(), 1);
    assert_eq!(*post_deletes.borrow(), 1);
    assert_eq!(fixture.store.borrow().committed_count(), 0);
    assert!(saved.id.is_some());

    let unsaved = Notification::new("Never stored", "");
    assert!(matches!(
        fixture.model.delete_entity(&unsaved),
        Err(Error::InvalidReference(_))
    ));
    Ok(())
}

#[test]
fn test_delete_entities_skips_missing_ids() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let first = seed_notification(&fixture.store, Notification::new("First", ""), None);
    let second = seed_notification(&fixture.store, Notification::new("Second", ""), None);
    let keep = seed_notification(&fixture.store, Notification::new("Keep", ""), None);

    let deleted = fixture.model.delete_entities(&[
        first.id.expect("seeded"),
        EntityId(99),
        second.id.expect("seeded"),
    ])?;

    let names = deleted.iter().map(|n| n.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["First", "Second"]);

    let store = fixture.store.borrow();
    assert_eq!(store.committed_count(), 1);
    assert!(store.committed(keep.id.expect("seeded")).is_some());
    Ok(())
}

#[test]
fn test_stat_entry_and_lookup_by_lead() -> Result<()> {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let promo = seed_notification(&fixture.store, Notification::new("Promo", ""), None);
    let promo_id = promo.id.expect("seeded");

    let stat = fixture
        .model
        .create_stat_entry(&promo, LeadId(42), Some("email"), Some("42"))?;
    fixture
        .model
        .create_stat_entry(&promo, LeadId(43), Some("email"), Some("43"))?;

    assert!(!stat.is_new());
    assert_eq!(stat.notification_id(), promo_id);
    assert_eq!(fixture.store.borrow().pending_writes(), 0);

    let stats = fixture.model.stats_by_lead(promo_id, LeadId(42))?;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].lead_id(), LeadId(42));
    assert_eq!(stats[0].source(), Some("email"));
    assert_eq!(stats[0].source_id(), Some("42"));

    let status = fixture.model.notification_status(stat.tracking_hash())?;
    assert_eq!(status.map(|s| s.id()), Some(stat.id()));
    assert!(fixture.model.notification_status("unknown")?.is_none());
    Ok(())
}

#[test]
fn test_stats_by_lead_newest_first() -> Result<()> {
    let fixture = setup_model(SecurityContext::anonymous());
    let promo = seed_notification(&fixture.store, Notification::new("Promo", ""), None);

    let mut older = StatRecord::new(&promo, LeadId(1), None, None)?
        .with_date_sent(datetime!(2024-01-01 9:00 UTC));
    let mut newer = StatRecord::new(&promo, LeadId(1), None, None)?
        .with_date_sent(datetime!(2024-01-02 9:00 UTC));
    let mut other_lead = StatRecord::new(&promo, LeadId(2), None, None)?
        .with_date_sent(datetime!(2024-01-03 9:00 UTC));
    {
        let mut store = fixture.store.borrow_mut();
        store.save_stat(&mut older, false)?;
        store.save_stat(&mut newer, false)?;
        store.save_stat(&mut other_lead, true)?;
    }

    let stats = fixture
        .model
        .stats_by_lead(promo.id.expect("seeded"), LeadId(1))?;
    let hashes = stats.iter().map(|s| s.tracking_hash()).collect::<Vec<_>>();
    assert_eq!(hashes, vec![newer.tracking_hash(), older.tracking_hash()]);
    Ok(())
}

#[test]
fn test_stat_entry_requires_saved_notification() {
    let mut fixture = setup_model(SecurityContext::anonymous());
    let draft = Notification::new("Draft", "");

    let result = fixture.model.create_stat_entry(&draft, LeadId(1), None, None);
    assert!(matches!(result, Err(Error::InvalidReference(_))));
    assert!(fixture.store.borrow().committed_stats().is_empty());
}

struct StubLinks;

impl TrackableSource for StubLinks {
    fn trackable_list(&self, channel: &str, channel_id: EntityId) -> Vec<TrackableLink> {
        if channel != "notification" || channel_id != EntityId(1) {
            return Vec::new();
        }
        vec![TrackableLink {
            redirect_id: "abc123".to_string(),
            url: "https://example.com/offer".to_string(),
            hits: 12,
            unique_hits: 9,
        }]
    }
}

#[test]
fn test_click_stats() {
    let fixture = setup_model(SecurityContext::anonymous());
    assert!(fixture.model.click_stats(EntityId(1)).is_empty());

    let model = fixture.model.with_trackables(Rc::new(StubLinks));
    let links = model.click_stats(EntityId(1));
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].unique_hits, 9);
    assert!(model.click_stats(EntityId(2)).is_empty());
}

/// Backend whose flush always fails
struct FailingStore {
    inner: MemoryStore,
}

impl StorageBackend for FailingStore {
    fn get(&self, id: EntityId) -> Result<Option<Notification>> {
        self.inner.get(id)
    }

    fn save(&mut self, notification: &mut Notification, flush: bool) -> Result<()> {
        self.inner.save(notification, false)?;
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn delete(&mut self, id: EntityId, flush: bool) -> Result<()> {
        self.inner.delete(id, false)?;
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn save_stat(&mut self, stat: &mut StatRecord, flush: bool) -> Result<()> {
        self.inner.save_stat(stat, false)?;
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Err(Error::StoreFailure("disk full".to_string()))
    }

    fn find_stats(
        &self,
        criteria: &Criteria,
        order_by: Option<(&str, SortOrder)>,
    ) -> Result<Vec<StatRecord>> {
        self.inner.find_stats(criteria, order_by)
    }

    fn stat_by_tracking_hash(&self, tracking_hash: &str) -> Result<Option<StatRecord>> {
        self.inner.stat_by_tracking_hash(tracking_hash)
    }

    fn load_time_data(&self, query: &TimeDataQuery) -> Result<Vec<Timestamp>> {
        self.inner.load_time_data(query)
    }

    fn notification_list(&self, query: &NotificationListQuery) -> Result<Vec<LookupRow>> {
        self.inner.notification_list(query)
    }

    fn list_notifications(&self, page: PageOpts) -> Result<PageResult<Notification>> {
        self.inner.list_notifications(page)
    }
}

#[test]
fn test_store_failure_propagates() -> Result<()> {
    let store: StoreHandle = Rc::new(RefCell::new(FailingStore {
        inner: MemoryStore::new(),
    }));
    let mut model = NotificationModel::new(
        store,
        Rc::new(SecurityContext::anonymous()),
        Rc::new(Catalog::english()),
        ModelConfig::default(),
    )?;

    let mut notification = Notification::new("Welcome", "");
    assert!(matches!(
        model.save_entity(&mut notification, false),
        Err(Error::StoreFailure(_))
    ));

    let mut records = notifications(2);
    assert!(matches!(
        model.save_entities(&mut records, false),
        Err(Error::StoreFailure(_))
    ));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let store: StoreHandle = Rc::new(RefCell::new(MemoryStore::new()));
    let config = ModelConfig {
        batch_size: 0,
        ..ModelConfig::default()
    };

    let result = NotificationModel::new(
        store,
        Rc::new(SecurityContext::anonymous()),
        Rc::new(Catalog::english()),
        config,
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
