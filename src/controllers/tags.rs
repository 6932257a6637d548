//! Tag API: generic CRUD plus a transactional bulk endpoint

use std::sync::Arc;

use super::rest::{Resource, RestController};
use crate::core::error::{AppError, ConfigError};
use crate::core::repository::encode;
use crate::core::store::{Transaction, finish_transaction};
use crate::entities::{BulkTagResult, BulkTags, CreateTag, Tag, UpdateTag};
use crate::routing::{
    ActionHandler, Controller, ControllerKey, Outcome, Registry, RequestContext, action,
};

impl Resource for Tag {
    type Create = CreateTag;
    type Update = UpdateTag;
}

pub struct TagsController {
    rest: Arc<RestController<Tag>>,
}

impl TagsController {
    pub fn new(rest: RestController<Tag>) -> Self {
        Self {
            rest: Arc::new(rest),
        }
    }

    /// `POST /bulk`
    ///
    /// Entries of `insert` without an id are created, entries with one rename
    /// or recolor that tag. Ids in `delete` are removed; unknown ones are
    /// skipped. Everything commits together or not at all.
    pub async fn bulk(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let input: BulkTags = cx.validated_json()?;
        let store = self.rest.repository().store().clone();

        let mut tx = store.start_transaction().await?;
        let result = self.apply_bulk(&cx, input, &mut tx).await;
        let summary = finish_transaction(store.as_ref(), tx, result).await?;

        tracing::info!(
            created = summary.created.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted,
            "applied bulk tag changes"
        );
        Outcome::json(&summary)
    }

    async fn apply_bulk(
        &self,
        cx: &RequestContext,
        input: BulkTags,
        tx: &mut Transaction,
    ) -> Result<BulkTagResult, AppError> {
        let mut summary = BulkTagResult {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: 0,
        };

        for mut entry in input.insert {
            match entry.id.take() {
                Some(id) => {
                    let patch = encode(&entry)?;
                    let tag = self
                        .rest
                        .update_document(cx, &id, patch, Some(&mut *tx))
                        .await?
                        .ok_or_else(|| AppError::validation(format!("unknown tag '{}'", id)))?;
                    summary.updated.push(tag);
                }
                None => {
                    let tag = self
                        .rest
                        .create_document(cx, encode(&entry)?, Some(&mut *tx))
                        .await?;
                    summary.created.push(tag);
                }
            }
        }

        for id in input.delete {
            if self
                .rest
                .delete_document(cx, &id, Some(&mut *tx))
                .await?
                .is_some()
            {
                summary.deleted += 1;
            }
        }
        Ok(summary)
    }
}

impl Controller for TagsController {
    const KEY: ControllerKey = "tags";

    fn declare(registry: &mut Registry) -> Result<(), ConfigError> {
        RestController::<Tag>::declare(registry)?;
        registry.declare_once(Self::KEY, |r| {
            r.controller_with_parent(Self::KEY, RestController::<Tag>::KEY)?
                .post("/bulk", "bulk")?;
            Ok(())
        })
    }

    fn bind(self: Arc<Self>, method: &str) -> Option<ActionHandler> {
        match method {
            "bulk" => Some(action(&self, |c, cx| async move { c.bulk(cx).await })),
            other => self.rest.clone().bind(other),
        }
    }
}
