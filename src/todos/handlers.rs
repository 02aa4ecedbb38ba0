use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app::{AppJson, AppQuery},
    auth::extractors::AuthUser,
    error::{internal, ApiError},
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, DeletedResponse, TodoListResponse, TodoResponse, UpdateTodoRequest},
        query::{ListParams, TodoQuery},
        services::{validate_create, validate_update},
    },
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
}

/// An id that is not a UUID can never match a row.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

#[instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), ApiError> {
    let new = validate_create(payload)?;
    let todo = state
        .todos
        .insert(user_id, new)
        .await
        .map_err(internal("Failed to create todo"))?;

    info!(%user_id, todo_id = %todo.id, "todo created");
    Ok((
        StatusCode::CREATED,
        Json(TodoResponse::new(todo, OffsetDateTime::now_utc())),
    ))
}

#[instrument(skip(state))]
pub async fn list_todos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<TodoListResponse>, ApiError> {
    let query = TodoQuery::try_from(params)?;
    let (todos, total) = state
        .todos
        .list(user_id, &query)
        .await
        .map_err(internal("Failed to fetch todos"))?;

    let now = OffsetDateTime::now_utc();
    Ok(Json(TodoListResponse {
        items: todos.into_iter().map(|t| TodoResponse::new(t, now)).collect(),
        page: query.page,
        limit: query.limit,
        total,
        total_pages: query.total_pages(total),
    }))
}

#[instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoResponse>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state
        .todos
        .get(user_id, id)
        .await
        .map_err(internal("Failed to fetch todo"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TodoResponse::new(todo, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, ApiError> {
    let id = parse_id(&id)?;
    let patch = validate_update(payload)?;
    let todo = state
        .todos
        .update(user_id, id, patch)
        .await
        .map_err(internal("Failed to update todo"))?
        .ok_or(ApiError::NotFound)?;

    info!(%user_id, todo_id = %todo.id, "todo updated");
    Ok(Json(TodoResponse::new(todo, OffsetDateTime::now_utc())))
}

#[instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .todos
        .delete(user_id, id)
        .await
        .map_err(internal("Failed to delete todo"))?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    info!(%user_id, todo_id = %id, "todo deleted");
    Ok(Json(DeletedResponse { ok: true }))
}
