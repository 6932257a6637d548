//! Todo items

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::repository::Entity;
use crate::core::store::Document;
use crate::core::validation::not_blank;

/// A todo item
///
/// `tags` holds tag ids. Fields not known here (custom audit field names,
/// for instance) are kept in `extra` so they survive updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleter_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Entity for Todo {
    const COLLECTION: &'static str = "todos";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Reference to a tag in a todo payload: an existing id or a name
///
/// A name that matches no existing tag creates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Existing { id: String },
    Named { name: String },
}

/// Body of `POST /todos`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    #[validate(
        custom(function = "not_blank", message = "title must not be blank"),
        length(max = 200, message = "title must be at most 200 characters")
    )]
    pub title: String,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,
}

/// Body of `PUT /todos/:id`; absent fields are left unchanged
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    #[validate(
        custom(function = "not_blank", message = "title must not be blank"),
        length(max = 200, message = "title must be at most 200 characters")
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_refs_accept_ids_and_names() {
        let payload = json!([{"id": "t1"}, {"name": "home"}, {"id": "t2", "name": "x"}]);
        let refs: Vec<TagRef> = serde_json::from_value(payload).unwrap();
        assert_eq!(
            refs,
            vec![
                TagRef::Existing { id: "t1".into() },
                TagRef::Named { name: "home".into() },
                TagRef::Existing { id: "t2".into() },
            ]
        );
    }

    #[test]
    fn test_blank_title_is_invalid() {
        let input: CreateTodo = serde_json::from_value(json!({"title": "  "})).unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.to_string().contains("title must not be blank"));

        let input: UpdateTodo = serde_json::from_value(json!({"completed": true})).unwrap();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_defaults_and_extra_fields() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "1",
            "title": "write",
            "ownerId": "alice"
        }))
        .unwrap();
        assert!(!todo.completed);
        assert!(todo.tags.is_empty());
        assert_eq!(todo.extra["ownerId"], "alice");

        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["ownerId"], "alice");
        assert_eq!(json["completed"], false);
        assert!(json.get("creatorUserId").is_none());
    }
}
