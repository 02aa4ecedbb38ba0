use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => anyhow::bail!("unknown priority {other:?}"),
        }
    }
}

/// Row as stored in `todos`.
#[derive(Debug, FromRow)]
pub struct TodoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub completed: bool,
    pub due_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub completed: bool,
    pub due_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Todo {
    /// Due date passed and still open. Never persisted.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        match self.due_date {
            Some(due) => !self.completed && due < now,
            None => false,
        }
    }
}

impl TryFrom<TodoRow> for Todo {
    type Error = anyhow::Error;

    fn try_from(r: TodoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            priority: r.priority.parse()?,
            completed: r.completed,
            due_date: r.due_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated input for an insert; defaults already applied.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub completed: bool,
    pub due_date: Option<OffsetDateTime>,
}

/// Validated partial update. `None` leaves the column untouched;
/// `due_date: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<OffsetDateTime>>,
}

impl TodoPatch {
    pub fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
    }
}
