//! Generic REST controller
//!
//! [`RestController<T>`] serves the five canonical operations for one
//! entity type:
//!
//! | Verb | Pattern | Method |
//! |---|---|---|
//! | GET | `/` | `list` |
//! | GET | `/:id` | `get` |
//! | POST | `/` | `create` |
//! | PUT | `/:id` | `update` |
//! | DELETE | `/:id` | `delete` |
//!
//! Behavior is tuned by [`RestConfig`]: audit stamping, scoping reads to the
//! session's user, and soft delete. Controllers that extend `rest` reuse the
//! route table and the helpers below (`create_document`, `update_document`,
//! ...) so their own actions follow the same rules.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use crate::config::AuditFieldsConfig;
use crate::core::error::{AppError, ConfigError};
use crate::core::query::{DEFAULT_PAGE_SIZE, PaginationOptions, Sort};
use crate::core::repository::{Entity, Repository, encode};
use crate::core::store::{Document, FindQuery, Transaction, id_filter};
use crate::routing::{
    ActionHandler, Controller, ControllerKey, Outcome, Registry, RequestContext, action,
};

/// An entity with request payload types for create and update
///
/// The update payload must skip absent fields when serialized: only the
/// fields it serializes are changed.
pub trait Resource: Entity {
    type Create: DeserializeOwned + Validate + Serialize + Send;
    type Update: DeserializeOwned + Validate + Serialize + Send;
}

/// Which audit fields get the session's user id
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub enabled: bool,
    pub creator_field: Option<String>,
    pub updater_field: Option<String>,
    pub deleter_field: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::from(&AuditFieldsConfig::default())
    }
}

impl AuditConfig {
    /// No stamping at all
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl From<&AuditFieldsConfig> for AuditConfig {
    fn from(config: &AuditFieldsConfig) -> Self {
        Self {
            enabled: config.enabled,
            creator_field: config.creator_field.clone(),
            updater_field: config.updater_field.clone(),
            deleter_field: config.deleter_field.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestConfig {
    pub audit: AuditConfig,
    /// Restrict reads and writes to entities whose field equals the user id
    pub session_filter: Option<String>,
    /// Flag field set to `true` instead of removing the entity
    pub soft_delete: Option<String>,
    pub default_page_size: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            session_filter: None,
            soft_delete: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RestConfig {
    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_session_filter(mut self, field: impl Into<String>) -> Self {
        self.session_filter = Some(field.into());
        self
    }

    pub fn with_soft_delete(mut self, flag: impl Into<String>) -> Self {
        self.soft_delete = Some(flag.into());
        self
    }

    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size;
        self
    }
}

/// Key of the route table every [`RestController`] shares
pub const REST_KEY: ControllerKey = "rest";

/// CRUD over one entity type
pub struct RestController<T> {
    repository: Repository<T>,
    config: RestConfig,
}

impl<T> Clone for RestController<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Resource> RestController<T> {
    pub fn new(repository: Repository<T>, config: RestConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &Repository<T> {
        &self.repository
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------

    pub async fn list(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        self.list_with(&cx, Document::new()).await
    }

    pub async fn get(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let id = cx.require_param("id")?;
        Outcome::found(self.find_visible(&cx, id, None).await?)
    }

    pub async fn create(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let input: T::Create = cx.validated_json()?;
        let entity = self.create_document(&cx, encode(&input)?, None).await?;
        Outcome::created(&entity)
    }

    pub async fn update(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let id = cx.require_param("id")?;
        let input: T::Update = cx.validated_json()?;
        let entity = self
            .update_document(&cx, id, encode(&input)?, None)
            .await?;
        Outcome::found(entity)
    }

    pub async fn delete(&self, cx: RequestContext) -> Result<Outcome, AppError> {
        let id = cx.require_param("id")?;
        Outcome::found(self.delete_document(&cx, id, None).await?)
    }

    // ---------------------------------------------------------------------
    // Helpers shared with extending controllers
    // ---------------------------------------------------------------------

    /// List the visible entities matching `extra`
    ///
    /// With `page` or `pageSize` in the query the result is a page, otherwise
    /// the full array. `sort=field:asc,other:desc` orders either.
    pub async fn list_with(
        &self,
        cx: &RequestContext,
        extra: Document,
    ) -> Result<Outcome, AppError> {
        let filter = self.read_filter(cx, extra)?;
        let sort = parse_sort(cx)?;

        match PaginationOptions::from_query(cx.query(), self.config.default_page_size)? {
            Some(options) => {
                let options = options.with_sort(sort).with_filter(filter);
                let page = self.repository.find_with_pagination(&options, None).await?;
                Outcome::json(&page)
            }
            None => {
                let all = self
                    .repository
                    .find(&FindQuery::new(filter).sort(sort), None)
                    .await?;
                Outcome::json(&all)
            }
        }
    }

    /// The entity with `id`, if this request may see it
    pub async fn find_visible(
        &self,
        cx: &RequestContext,
        id: &str,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        let filter = self.read_filter(cx, id_filter(id))?;
        self.repository.find_one(&filter, tx).await
    }

    /// Stamp the creator and insert
    pub async fn create_document(
        &self,
        cx: &RequestContext,
        mut document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<T, AppError> {
        self.stamp(cx, &mut document, self.config.audit.creator_field.as_deref());
        self.repository.create(document, tx).await
    }

    /// Stamp the updater and patch the visible entity with `id`
    pub async fn update_document(
        &self,
        cx: &RequestContext,
        id: &str,
        mut patch: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        self.stamp(cx, &mut patch, self.config.audit.updater_field.as_deref());
        let filter = self.read_filter(cx, id_filter(id))?;
        self.repository.update_one(&filter, patch, tx).await
    }

    /// Remove the visible entity with `id`, or flag it when soft deleting
    pub async fn delete_document(
        &self,
        cx: &RequestContext,
        id: &str,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        let filter = self.read_filter(cx, id_filter(id))?;

        match &self.config.soft_delete {
            Some(flag) => {
                let mut patch = Document::new();
                patch.insert(flag.clone(), Value::Bool(true));
                self.stamp(cx, &mut patch, self.config.audit.deleter_field.as_deref());
                self.repository.update_one(&filter, patch, tx).await
            }
            None => self.repository.delete_one(&filter, tx).await,
        }
    }

    /// `extra` plus the session scope and the soft delete exclusion
    ///
    /// Scoping to the session without a session is a 401.
    pub fn read_filter(
        &self,
        cx: &RequestContext,
        mut extra: Document,
    ) -> Result<Document, AppError> {
        if let Some(field) = &self.config.session_filter {
            let session = cx.require_session()?;
            extra.insert(field.clone(), Value::String(session.user_id.clone()));
        }
        if let Some(flag) = &self.config.soft_delete {
            let mut not_deleted = Document::new();
            not_deleted.insert("$ne".to_string(), Value::Bool(true));
            extra.insert(flag.clone(), Value::Object(not_deleted));
        }
        Ok(extra)
    }

    fn stamp(&self, cx: &RequestContext, document: &mut Document, field: Option<&str>) {
        if !self.config.audit.enabled {
            return;
        }
        if let (Some(field), Some(user_id)) = (field, cx.user_id()) {
            document.insert(field.to_string(), Value::String(user_id.to_string()));
        }
    }
}

fn parse_sort(cx: &RequestContext) -> Result<Sort, AppError> {
    Ok(cx.query_parsed::<Sort>("sort")?.unwrap_or_default())
}

impl<T: Resource> Controller for RestController<T> {
    const KEY: ControllerKey = REST_KEY;

    fn declare(registry: &mut Registry) -> Result<(), ConfigError> {
        registry.declare_once(Self::KEY, |r| {
            r.controller(Self::KEY)
                .get("/", "list")?
                .get("/:id", "get")?
                .post("/", "create")?
                .put("/:id", "update")?
                .delete("/:id", "delete")?;
            Ok(())
        })
    }

    fn bind(self: Arc<Self>, method: &str) -> Option<ActionHandler> {
        match method {
            "list" => Some(action(&self, |c, cx| async move { c.list(cx).await })),
            "get" => Some(action(&self, |c, cx| async move { c.get(cx).await })),
            "create" => Some(action(&self, |c, cx| async move { c.create(cx).await })),
            "update" => Some(action(&self, |c, cx| async move { c.update(cx).await })),
            "delete" => Some(action(&self, |c, cx| async move { c.delete(cx).await })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Session;
    use crate::entities::Tag;
    use crate::routing::wire;
    use crate::storage::InMemoryStore;
    use axum::body::{Bytes, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::json;

    fn controller(config: RestConfig) -> Arc<RestController<Tag>> {
        let store = Arc::new(InMemoryStore::new());
        Arc::new(RestController::new(Repository::new(store), config))
    }

    fn context(user: Option<&str>) -> RequestContext {
        let mut cx = RequestContext::for_test("GET", "/");
        if let Some(user) = user {
            cx.set_session(Session::new(user));
        }
        cx
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn test_audit_fields_are_stamped_from_session() {
        let rest = controller(RestConfig::default());
        let cx = context(Some("alice"));

        let tag = rest
            .create_document(&cx, doc(json!({"name": "work"})), None)
            .await
            .unwrap();
        assert_eq!(tag.creator_user_id.as_deref(), Some("alice"));
        assert_eq!(tag.updater_user_id, None);

        let bob = context(Some("bob"));
        let tag = rest
            .update_document(&bob, &tag.id, doc(json!({"name": "job"})), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag.creator_user_id.as_deref(), Some("alice"));
        assert_eq!(tag.updater_user_id.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_audit_can_be_disabled_globally_or_per_field() {
        let rest = controller(RestConfig::default().with_audit(AuditConfig::disabled()));
        let tag = rest
            .create_document(&context(Some("alice")), doc(json!({"name": "a"})), None)
            .await
            .unwrap();
        assert_eq!(tag.creator_user_id, None);

        let audit = AuditConfig {
            creator_field: None,
            ..AuditConfig::default()
        };
        let rest = controller(RestConfig::default().with_audit(audit));
        let tag = rest
            .create_document(&context(Some("alice")), doc(json!({"name": "a"})), None)
            .await
            .unwrap();
        assert_eq!(tag.creator_user_id, None);
    }

    #[tokio::test]
    async fn test_session_filter_hides_other_users_entities() {
        let rest = controller(RestConfig::default().with_session_filter("creatorUserId"));
        let alice = context(Some("alice"));
        let bob = context(Some("bob"));

        let tag = rest
            .create_document(&alice, doc(json!({"name": "mine"})), None)
            .await
            .unwrap();
        assert!(rest.find_visible(&alice, &tag.id, None).await.unwrap().is_some());
        assert!(rest.find_visible(&bob, &tag.id, None).await.unwrap().is_none());
        assert!(
            rest.update_document(&bob, &tag.id, doc(json!({"name": "theirs"})), None)
                .await
                .unwrap()
                .is_none()
        );
        assert!(rest.delete_document(&bob, &tag.id, None).await.unwrap().is_none());

        let err = rest.find_visible(&context(None), &tag.id, None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_soft_delete_flags_and_hides() {
        let rest = controller(RestConfig::default().with_soft_delete("deleted"));
        let cx = context(Some("alice"));
        let tag = rest
            .create_document(&cx, doc(json!({"name": "old"})), None)
            .await
            .unwrap();

        let deleted = rest.delete_document(&cx, &tag.id, None).await.unwrap().unwrap();
        assert_eq!(deleted.extra["deleted"], json!(true));
        assert_eq!(deleted.extra["deleterUserId"], json!("alice"));

        assert!(rest.find_visible(&cx, &tag.id, None).await.unwrap().is_none());
        // still stored
        let raw = rest.repository().find_by_id(&tag.id, None).await.unwrap();
        assert!(raw.is_some());
        // a second delete finds nothing
        assert!(rest.delete_document(&cx, &tag.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_routes_through_wiring() {
        let mut registry = Registry::new();
        RestController::<Tag>::declare(&mut registry).unwrap();
        let wired = wire(&registry, controller(RestConfig::default()), "/tags").unwrap();

        let request = |method: &str, uri: &str, body: Value| {
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Bytes::from(body.to_string()))
                .unwrap()
        };

        let response = wired
            .handle(&request("POST", "/tags", json!({"name": "work"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = wired
            .handle(&request("PUT", &format!("/tags/{}", id), json!({"color": "red"})))
            .await
            .unwrap();
        let updated = body(response).await;
        assert_eq!(updated["name"], "work");
        assert_eq!(updated["color"], "red");

        let response = wired
            .handle(&request("GET", "/tags?page=1&pageSize=5", Value::Null))
            .await
            .unwrap();
        let page = body(response).await;
        assert_eq!(page["totalItems"], 1);
        assert_eq!(page["data"][0]["id"], id.as_str());

        let response = wired
            .handle(&request("DELETE", &format!("/tags/{}", id), Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = wired
            .handle(&request("GET", &format!("/tags/{}", id), Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = wired
            .handle(&request("POST", "/tags", json!({"name": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body(response).await["message"]
                .as_str()
                .unwrap()
                .contains("name must not be blank")
        );
    }

    #[tokio::test]
    async fn test_list_without_page_is_full_array_and_sortable() {
        let rest = controller(RestConfig::default());
        let cx = context(None);
        for name in ["b", "c", "a"] {
            rest.create_document(&cx, doc(json!({"name": name})), None)
                .await
                .unwrap();
        }

        let request = Request::builder()
            .uri("/?sort=name:asc")
            .body(Bytes::new())
            .unwrap();
        let outcome = rest
            .list(RequestContext::new(&request, "/"))
            .await
            .unwrap();
        let Outcome::Json { body, .. } = outcome else {
            panic!("expected JSON");
        };
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
