//! Todo API
//!
//! Extends `rest` with a toggle route, list filters and tag resolution:
//! tags in a create or update payload may be given by id or by name, and
//! names that match no tag create one. The todo write and any tag it creates
//! happen in one transaction.

use serde_json::Value;
use std::sync::Arc;

use super::rest::{Resource, RestController};
use crate::core::error::{AppError, ConfigError};
use crate::core::repository::encode;
use crate::core::store::{Document, Transaction, finish_transaction};
use crate::core::validation::validate;
use crate::entities::{CreateTag, CreateTodo, Tag, TagRef, Todo, UpdateTodo};
use crate::routing::{
    ActionHandler, Controller, ControllerKey, Outcome, Registry, RequestContext, action,
};

impl Resource for Todo {
    type Create = CreateTodo;
    type Update = UpdateTodo;
}

pub struct TodosController {
    rest: Arc<RestController<Todo>>,
    tags: Arc<RestController<Tag>>,
}

impl TodosController {
    pub fn new(rest: RestController<Todo>, tags: RestController<Tag>) -> Self {
        Self {
            rest: Arc::new(rest),
            tags: Arc::new(tags),
        }
    }

    /// `GET /` with optional `completed` and `tag` filters
    pub async fn list(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let mut filter = Document::new();
        if let Some(completed) = cx.query_parsed::<bool>("completed")? {
            filter.insert("completed".to_string(), Value::Bool(completed));
        }
        if let Some(tag) = cx.query_param("tag") {
            filter.insert("tags".to_string(), Value::String(tag.to_string()));
        }
        self.rest.list_with(&cx, filter).await
    }

    pub async fn create(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let input: CreateTodo = cx.validated_json()?;
        let store = self.rest.repository().store().clone();

        let mut tx = store.start_transaction().await?;
        let result = self.create_in(&cx, input, &mut tx).await;
        let todo = finish_transaction(store.as_ref(), tx, result).await?;
        Outcome::created(&todo)
    }

    pub async fn update(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let id = cx.require_param("id")?.to_string();
        let input: UpdateTodo = cx.validated_json()?;
        let store = self.rest.repository().store().clone();

        let mut tx = store.start_transaction().await?;
        let result = self.update_in(&cx, &id, input, &mut tx).await;
        let todo = finish_transaction(store.as_ref(), tx, result).await?;
        Outcome::found(todo)
    }

    /// `POST /:id/toggle` flips `completed`
    pub async fn toggle(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let id = cx.require_param("id")?;
        let Some(todo) = self.rest.find_visible(&cx, id, None).await? else {
            return Ok(Outcome::NotFound);
        };

        let mut patch = Document::new();
        patch.insert("completed".to_string(), Value::Bool(!todo.completed));
        Outcome::found(self.rest.update_document(&cx, id, patch, None).await?)
    }

    async fn create_in(
        &self,
        cx: &RequestContext,
        mut input: CreateTodo,
        tx: &mut Transaction,
    ) -> Result<Todo, AppError> {
        let refs = input.tags.take().unwrap_or_default();
        let mut document = encode(&input)?;
        let tag_ids = self.resolve_tags(cx, refs, tx).await?;
        document.insert("tags".to_string(), ids_value(tag_ids));
        self.rest.create_document(cx, document, Some(tx)).await
    }

    async fn update_in(
        &self,
        cx: &RequestContext,
        id: &str,
        mut input: UpdateTodo,
        tx: &mut Transaction,
    ) -> Result<Option<Todo>, AppError> {
        // no tags get created for a todo that is not there
        if self.rest.find_visible(cx, id, Some(&mut *tx)).await?.is_none() {
            return Ok(None);
        }

        let refs = input.tags.take();
        let mut patch = encode(&input)?;
        if let Some(refs) = refs {
            let tag_ids = self.resolve_tags(cx, refs, tx).await?;
            patch.insert("tags".to_string(), ids_value(tag_ids));
        }
        self.rest.update_document(cx, id, patch, Some(tx)).await
    }

    /// Tag ids for `refs`, creating the named tags that do not exist yet
    ///
    /// An id that names no visible tag is a validation error. Duplicates are
    /// dropped, first occurrence wins.
    async fn resolve_tags(
        &self,
        cx: &RequestContext,
        refs: Vec<TagRef>,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, AppError> {
        let mut ids: Vec<String> = Vec::with_capacity(refs.len());

        for tag_ref in refs {
            let id = match tag_ref {
                TagRef::Existing { id } => {
                    if self.tags.find_visible(cx, &id, Some(&mut *tx)).await?.is_none() {
                        return Err(AppError::validation(format!("unknown tag '{}'", id)));
                    }
                    id
                }
                TagRef::Named { name } => self.tag_named(cx, &name, tx).await?.id,
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn tag_named(
        &self,
        cx: &RequestContext,
        name: &str,
        tx: &mut Transaction,
    ) -> Result<Tag, AppError> {
        // same rules as `POST /tags`
        let input = CreateTag {
            name: name.trim().to_string(),
            color: None,
        };
        validate(&input)?;

        let mut by_name = Document::new();
        by_name.insert("name".to_string(), Value::String(input.name.clone()));
        let filter = self.tags.read_filter(cx, by_name)?;
        if let Some(tag) = self.tags.repository().find_one(&filter, Some(&mut *tx)).await? {
            return Ok(tag);
        }

        tracing::debug!(name = %input.name, "creating tag from todo payload");
        self.tags.create_document(cx, encode(&input)?, Some(tx)).await
    }
}

fn ids_value(ids: Vec<String>) -> Value {
    Value::Array(ids.into_iter().map(Value::String).collect())
}

impl Controller for TodosController {
    const KEY: ControllerKey = "todos";

    fn declare(registry: &mut Registry) -> Result<(), ConfigError> {
        RestController::<Todo>::declare(registry)?;
        registry.declare_once(Self::KEY, |r| {
            r.controller_with_parent(Self::KEY, RestController::<Todo>::KEY)?
                .post("/:id/toggle", "toggle")?;
            Ok(())
        })
    }

    fn bind(self: Arc<Self>, method: &str) -> Option<ActionHandler> {
        match method {
            "list" => Some(action(&self, |c, cx| async move { c.list(cx).await })),
            "create" => Some(action(&self, |c, cx| async move { c.create(cx).await })),
            "update" => Some(action(&self, |c, cx| async move { c.update(cx).await })),
            "toggle" => Some(action(&self, |c, cx| async move { c.toggle(cx).await })),
            other => self.rest.clone().bind(other),
        }
    }
}
