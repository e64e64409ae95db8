//! Generic CRUD handler for API resources.
//!
//! A [`CrudHandler`] is parameterized by a [`ResourceDescriptor`] instead of
//! being specialized per resource: the descriptor names the entity in
//! response envelopes, supplies the permission base and restricts the
//! serialized field set.

use std::rc::Rc;

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

use crate::auth::Authorizer;
use crate::data::{EntityId, Notification, PageOpts, PageResult};
use crate::model::NotificationModel;
use crate::{Error, Result};

/// Describes one API resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Envelope key for a single entity
    pub entity_name_one: String,
    /// Envelope key for a list of entities
    pub entity_name_multi: String,
    pub permission_base: String,
    /// Fields kept when serializing, all fields when `None`
    pub serializer_fields: Option<Vec<String>>,
}

impl ResourceDescriptor {
    pub fn new(
        entity_name_one: impl Into<String>,
        entity_name_multi: impl Into<String>,
        permission_base: impl Into<String>,
    ) -> Self {
        Self {
            entity_name_one: entity_name_one.into(),
            entity_name_multi: entity_name_multi.into(),
            permission_base: permission_base.into(),
            serializer_fields: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.serializer_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Descriptor of the notification resource for a model
    pub fn notifications(model: &NotificationModel) -> Self {
        Self::new("notification", "notifications", model.permission_base())
    }

    fn permission(&self, level: &str) -> String {
        format!("{}:{}", self.permission_base, level)
    }
}

/// What a model must offer to be served by [`CrudHandler`]
pub trait CrudModel {
    type Entity: Serialize;

    fn new_entity(&self) -> Self::Entity;

    fn fetch(&self, id: EntityId) -> Result<Self::Entity>;

    fn fetch_page(&self, page: PageOpts) -> Result<PageResult<Self::Entity>>;

    fn persist(&mut self, entity: &mut Self::Entity) -> Result<()>;

    fn remove(&mut self, entity: &Self::Entity) -> Result<()>;
}

impl CrudModel for NotificationModel {
    type Entity = Notification;

    fn new_entity(&self) -> Notification {
        Notification::default()
    }

    fn fetch(&self, id: EntityId) -> Result<Notification> {
        self.entity(Some(id))
    }

    fn fetch_page(&self, page: PageOpts) -> Result<PageResult<Notification>> {
        self.store().borrow().list_notifications(page)
    }

    fn persist(&mut self, entity: &mut Notification) -> Result<()> {
        self.save_entity(entity, true)
    }

    fn remove(&mut self, entity: &Notification) -> Result<()> {
        self.delete_entity(entity)
    }
}

/// Permission-checked CRUD over one resource, producing JSON envelopes
pub struct CrudHandler<'a, M: CrudModel> {
    model: &'a mut M,
    descriptor: ResourceDescriptor,
    authorizer: Rc<dyn Authorizer>,
}

impl<'a, M: CrudModel> CrudHandler<'a, M> {
    pub fn new(
        model: &'a mut M,
        descriptor: ResourceDescriptor,
        authorizer: Rc<dyn Authorizer>,
    ) -> Self {
        Self {
            model,
            descriptor,
            authorizer,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn check(&self, level: &str) -> Result<()> {
        let permission = self.descriptor.permission(level);
        if self.authorizer.is_granted(&permission) {
            Ok(())
        } else {
            log::debug!("Denied {}", permission);
            Err(Error::AccessDenied(permission))
        }
    }

    fn serialize(&self, entity: &M::Entity) -> Result<JsonValue> {
        let value = serde_json::to_value(entity)?;

        match (&self.descriptor.serializer_fields, value) {
            (Some(fields), JsonValue::Object(object)) => Ok(JsonValue::Object(
                object
                    .into_iter()
                    .filter(|(key, _)| fields.iter().any(|field| field == key))
                    .collect::<Map<String, JsonValue>>(),
            )),
            (_, value) => Ok(value),
        }
    }

    fn envelope_one(&self, entity: &M::Entity) -> Result<JsonValue> {
        let mut envelope = Map::new();
        envelope.insert(self.descriptor.entity_name_one.clone(), self.serialize(entity)?);
        Ok(JsonValue::Object(envelope))
    }

    pub fn get(&self, id: EntityId) -> Result<JsonValue> {
        self.check("view")?;
        let entity = self.model.fetch(id)?;
        self.envelope_one(&entity)
    }

    pub fn list(&self, page: PageOpts) -> Result<JsonValue> {
        self.check("view")?;
        let page = self.model.fetch_page(page)?;

        let items = page
            .items
            .iter()
            .map(|entity| self.serialize(entity))
            .collect::<Result<Vec<_>>>()?;

        let mut envelope = Map::new();
        envelope.insert("total".to_string(), json!(page.total));
        envelope.insert(self.descriptor.entity_name_multi.clone(), JsonValue::Array(items));
        Ok(JsonValue::Object(envelope))
    }

    /// Persist a new entity built by `build` from the model's default
    pub fn create(&mut self, build: impl FnOnce(&mut M::Entity)) -> Result<JsonValue> {
        self.check("create")?;
        let mut entity = self.model.new_entity();
        build(&mut entity);
        self.model.persist(&mut entity)?;
        self.envelope_one(&entity)
    }

    pub fn edit(&mut self, id: EntityId, apply: impl FnOnce(&mut M::Entity)) -> Result<JsonValue> {
        self.check("edit")?;
        let mut entity = self.model.fetch(id)?;
        apply(&mut entity);
        self.model.persist(&mut entity)?;
        self.envelope_one(&entity)
    }

    /// Delete an entity, returning it as it was before deletion
    pub fn delete(&mut self, id: EntityId) -> Result<JsonValue> {
        self.check("delete")?;
        let entity = self.model.fetch(id)?;
        self.model.remove(&entity)?;
        self.envelope_one(&entity)
    }
}
