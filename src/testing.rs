//! In-memory repositories behind `AppState::fake()`.

use std::{cmp::Ordering, sync::Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    error::RepoError,
    todos::{
        query::{SortField, SortOrder, TodoQuery},
        repo::TodoRepo,
        repo_types::{NewTodo, Todo, TodoPatch},
    },
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(RepoError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[derive(Default)]
struct TodoTable {
    rows: Vec<Todo>,
    clock: Option<OffsetDateTime>,
}

impl TodoTable {
    /// Strictly increasing, so insertion order is visible in `created_at`.
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }
}

#[derive(Default)]
pub struct MemoryTodoRepo {
    table: Mutex<TodoTable>,
}

fn matches(todo: &Todo, user_id: Uuid, q: &TodoQuery) -> bool {
    if todo.user_id != user_id {
        return false;
    }
    if q.completed.is_some_and(|c| c != todo.completed) {
        return false;
    }
    match &q.search {
        Some(term) => {
            let term = term.to_lowercase();
            todo.title.to_lowercase().contains(&term)
                || todo.description.to_lowercase().contains(&term)
        }
        None => true,
    }
}

fn compare(a: &Todo, b: &Todo, q: &TodoQuery) -> Ordering {
    let directed = |ord: Ordering| match q.sort_order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };
    let key = match q.sort_by {
        SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
        SortField::Title => directed(a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        SortField::Priority => directed(a.priority.cmp(&b.priority)),
        SortField::Completed => directed(a.completed.cmp(&b.completed)),
        SortField::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => directed(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    key.then_with(|| directed(a.id.cmp(&b.id)))
}

#[async_trait]
impl TodoRepo for MemoryTodoRepo {
    async fn insert(&self, user_id: Uuid, new: NewTodo) -> Result<Todo, RepoError> {
        let mut table = self.table.lock().unwrap();
        let now = table.tick();
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id,
            title: new.title,
            description: new.description,
            priority: new.priority,
            completed: new.completed,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(todo.clone());
        Ok(todo)
    }

    async fn list(&self, user_id: Uuid, query: &TodoQuery) -> Result<(Vec<Todo>, i64), RepoError> {
        let table = self.table.lock().unwrap();
        let mut hits: Vec<Todo> = table
            .rows
            .iter()
            .filter(|t| matches(t, user_id, query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| compare(a, b, query));

        let total = hits.len() as i64;
        let page = hits
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, RepoError> {
        let table = self.table.lock().unwrap();
        Ok(table
            .rows
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned())
    }

    async fn update(&self, user_id: Uuid, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, RepoError> {
        let mut table = self.table.lock().unwrap();
        let now = table.tick();
        let Some(todo) = table
            .rows
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        patch.apply(todo);
        todo.updated_at = now;
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let mut table = self.table.lock().unwrap();
        let before = table.rows.len();
        table.rows.retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(table.rows.len() < before)
    }
}
