use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::todos::repo_types::{Priority, Todo};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

/// Every field optional. `dueDate: null` clears the due date, an absent
/// `dueDate` keeps it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "nullable_datetime")]
    pub due_date: Option<Option<OffsetDateTime>>,
}

fn nullable_datetime<'de, D>(d: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(d).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub is_overdue: bool,
}

impl TodoResponse {
    pub fn new(todo: Todo, now: OffsetDateTime) -> Self {
        let is_overdue = todo.is_overdue(now);
        Self {
            id: todo.id,
            user_id: todo.user_id,
            title: todo.title,
            description: todo.description,
            priority: todo.priority,
            completed: todo.completed,
            due_date: todo.due_date,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
            is_overdue,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoListResponse {
    pub items: Vec<TodoResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub ok: bool,
}
