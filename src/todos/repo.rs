use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::RepoError,
    todos::{
        query::{SortField, TodoQuery},
        repo_types::{NewTodo, Todo, TodoPatch, TodoRow},
    },
};

/// Every operation is scoped by owner; a todo owned by someone else behaves
/// exactly like a missing one.
#[async_trait]
pub trait TodoRepo: Send + Sync {
    async fn insert(&self, user_id: Uuid, new: NewTodo) -> Result<Todo, RepoError>;
    /// One page of matches plus the total match count.
    async fn list(&self, user_id: Uuid, query: &TodoQuery) -> Result<(Vec<Todo>, i64), RepoError>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, RepoError>;
    async fn update(&self, user_id: Uuid, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, RepoError>;
    /// `true` if a row was removed.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepoError>;
}

const COLUMNS: &str =
    "id, user_id, title, description, priority, completed, due_date, created_at, updated_at";

/// Sort key for priority; `todos_user_priority_idx` indexes this exact expression.
const PRIORITY_RANK: &str = "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END";

#[derive(Clone)]
pub struct PgTodoRepo {
    db: PgPool,
}

impl PgTodoRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, user_id: Uuid, q: &TodoQuery) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(completed) = q.completed {
        qb.push(" AND completed = ").push_bind(completed);
    }
    if let Some(pattern) = q.search_pattern() {
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR description ILIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
}

fn order_clause(q: &TodoQuery) -> String {
    let dir = q.sort_order.as_sql();
    let key = match q.sort_by {
        SortField::CreatedAt => format!("created_at {dir}"),
        SortField::Title => format!("lower(title) {dir}"),
        SortField::Priority => format!("{PRIORITY_RANK} {dir}"),
        SortField::DueDate => format!("due_date {dir} NULLS LAST"),
        SortField::Completed => format!("completed {dir}"),
    };
    format!("{key}, id {dir}")
}

fn count_builder(user_id: Uuid, q: &TodoQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM todos");
    push_filter(&mut qb, user_id, q);
    qb
}

fn page_builder(user_id: Uuid, q: &TodoQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM todos"));
    push_filter(&mut qb, user_id, q);
    qb.push(" ORDER BY ").push(order_clause(q));
    qb.push(" LIMIT ")
        .push_bind(q.limit)
        .push(" OFFSET ")
        .push_bind(q.offset());
    qb
}

fn into_todo(row: TodoRow) -> Result<Todo, RepoError> {
    Todo::try_from(row).map_err(RepoError::Decode)
}

#[async_trait]
impl TodoRepo for PgTodoRepo {
    async fn insert(&self, user_id: Uuid, new: NewTodo) -> Result<Todo, RepoError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            INSERT INTO todos (user_id, title, description, priority, completed, due_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(new.title)
        .bind(new.description)
        .bind(new.priority.as_str())
        .bind(new.completed)
        .bind(new.due_date)
        .fetch_one(&self.db)
        .await?;
        into_todo(row)
    }

    async fn list(&self, user_id: Uuid, query: &TodoQuery) -> Result<(Vec<Todo>, i64), RepoError> {
        let mut count_qb = count_builder(user_id, query);
        let mut page_qb = page_builder(user_id, query);

        let (total, rows) = tokio::try_join!(
            count_qb.build_query_scalar::<i64>().fetch_one(&self.db),
            page_qb.build_query_as::<TodoRow>().fetch_all(&self.db),
        )?;

        let items = rows.into_iter().map(into_todo).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>, RepoError> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_todo).transpose()
    }

    async fn update(&self, user_id: Uuid, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, RepoError> {
        let (set_due_date, due_date) = match patch.due_date {
            Some(due) => (true, due),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos SET
                title       = COALESCE($3, title),
                description = COALESCE($4, description),
                priority    = COALESCE($5, priority),
                completed   = COALESCE($6, completed),
                due_date    = CASE WHEN $7 THEN $8 ELSE due_date END,
                updated_at  = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.priority.map(|p| p.as_str()))
        .bind(patch.completed)
        .bind(set_due_date)
        .bind(due_date)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_todo).transpose()
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
