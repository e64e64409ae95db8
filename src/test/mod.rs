mod model;

use std::cell::RefCell;
use std::rc::Rc;

use crate::*;

pub(crate) struct Fixture {
    pub store: Rc<RefCell<MemoryStore>>,
    pub model: NotificationModel,
}

pub(crate) fn setup_model(security: SecurityContext) -> Fixture {
    setup_model_with_config(security, ModelConfig::default())
}

pub(crate) fn setup_model_with_config(security: SecurityContext, config: ModelConfig) -> Fixture {
    let store = Rc::new(RefCell::new(MemoryStore::new()));
    let handle: StoreHandle = store.clone();
    let model = NotificationModel::new(
        handle,
        Rc::new(security),
        Rc::new(Catalog::english()),
        config,
    )
    .expect("default config is valid");

    Fixture { store, model }
}

/// Save a notification owned by `owner` straight through the store
pub(crate) fn seed_notification(
    store: &Rc<RefCell<MemoryStore>>,
    notification: Notification,
    owner: Option<PrincipalId>,
) -> Notification {
    let mut notification = notification;
    notification.created_by = owner;
    store
        .borrow_mut()
        .save(&mut notification, true)
        .expect("memory store save");
    notification
}
