//! Tags

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::repository::Entity;
use crate::core::store::Document;
use crate::core::validation::not_blank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Entity for Tag {
    const COLLECTION: &'static str = "tags";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Body of `POST /tags`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTag {
    #[validate(
        custom(function = "not_blank", message = "name must not be blank"),
        length(max = 50, message = "name must be at most 50 characters")
    )]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Body of `PUT /tags/:id`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTag {
    #[validate(
        custom(function = "not_blank", message = "name must not be blank"),
        length(max = 50, message = "name must be at most 50 characters")
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One entry of a bulk insert: new without `id`, a rename with it
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TagUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[validate(
        custom(function = "not_blank", message = "name must not be blank"),
        length(max = 50, message = "name must be at most 50 characters")
    )]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Body of `POST /tags/bulk`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BulkTags {
    #[serde(default)]
    #[validate(nested)]
    pub insert: Vec<TagUpsert>,
    /// Ids to remove
    #[serde(default)]
    pub delete: Vec<String>,
}

/// Response of `POST /tags/bulk`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkTagResult {
    pub created: Vec<Tag>,
    pub updated: Vec<Tag>,
    /// Number of tags actually removed
    pub deleted: u64,
}
