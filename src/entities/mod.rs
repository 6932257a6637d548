//! Entities served by the todo API

pub mod tag;
pub mod todo;

pub use tag::{BulkTagResult, BulkTags, CreateTag, Tag, TagUpsert, UpdateTag};
pub use todo::{CreateTodo, TagRef, Todo, UpdateTodo};
