use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    app::AppJson,
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        password::{hash_password, run_blocking, verify_dummy, verify_password},
        services::{validate_login, validate_registration},
    },
    error::{internal, ApiError, RepoError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_registration(&mut payload, state.config.password_min_length)?;

    let existing = state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(internal("Registration failed"))?;
    if existing.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered"));
    }

    let password = payload.password.clone();
    let hash = run_blocking(move || hash_password(&password))
        .await
        .map_err(internal("Registration failed"))?;

    let user = match state.users.create(&payload.email, &hash).await {
        Ok(u) => u,
        Err(RepoError::Conflict) => {
            warn!(email = %payload.email, "email registered concurrently");
            return Err(ApiError::Conflict("Email already registered"));
        }
        Err(e) => return Err(internal("Registration failed")(e)),
    };

    let token = state.jwt.sign(user.id).map_err(internal("Registration failed"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_login(&mut payload)?;

    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            let password = payload.password.clone();
            let _ = run_blocking(move || {
                verify_dummy(&password);
                Ok(())
            })
            .await;
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials"));
        }
        Err(e) => return Err(internal("Login failed")(e)),
    };

    let password = payload.password.clone();
    let stored = user.password_hash.clone();
    let ok = run_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(internal("Login failed"))?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = state.jwt.sign(user.id).map_err(internal("Login failed"))?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(internal("Failed to load user"))?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "token for unknown user");
            ApiError::Unauthorized("Invalid token")
        })?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{self, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn register_returns_token_and_user() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let (status, json) = call(
            &app,
            post("/api/auth/register", json!({"email": "Ann@Example.com", "password": "hunter22"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["user"]["email"], "ann@example.com");
        let token = json["token"].as_str().unwrap();
        let claims = state.jwt.verify(token).expect("token verifies");
        assert_eq!(claims.sub.to_string(), json["user"]["id"].as_str().unwrap());
        assert!(json["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let app = build_app(AppState::fake());
        let body = json!({"email": "dup@example.com", "password": "hunter22"});

        let (first, _) = call(&app, post("/api/auth/register", body.clone())).await;
        assert_eq!(first, StatusCode::CREATED);

        let (second, json) = call(
            &app,
            post("/api/auth/register", json!({"email": " DUP@example.com", "password": "other-pass"})),
        )
        .await;
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Email already registered");
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let app = build_app(AppState::fake());
        let (status, json) = call(
            &app,
            post("/api/auth/register", json!({"email": "bad", "password": "123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["fields"]["email"].is_array());
        assert!(json["fields"]["password"].is_array());
    }

    #[tokio::test]
    async fn register_rejects_malformed_json() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn login_success_and_generic_failures() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        call(
            &app,
            post("/api/auth/register", json!({"email": "eve@example.com", "password": "correct-pw"})),
        )
        .await;

        let (ok, json) = call(
            &app,
            post("/api/auth/login", json!({"email": "EVE@example.com", "password": "correct-pw"})),
        )
        .await;
        assert_eq!(ok, StatusCode::OK);
        assert!(state.jwt.verify(json["token"].as_str().unwrap()).is_ok());

        let (wrong_pw, wrong_pw_body) = call(
            &app,
            post("/api/auth/login", json!({"email": "eve@example.com", "password": "nope-nope"})),
        )
        .await;
        let (unknown, unknown_body) = call(
            &app,
            post("/api/auth/login", json!({"email": "ghost@example.com", "password": "nope-nope"})),
        )
        .await;

        assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw_body, unknown_body);
        assert_eq!(unknown_body, json!({"error": "Invalid credentials"}));
    }

    #[tokio::test]
    async fn me_requires_valid_token() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let (_, json) = call(
            &app,
            post("/api/auth/register", json!({"email": "me@example.com", "password": "hunter22"})),
        )
        .await;
        let token = json["token"].as_str().unwrap();

        let (status, me) = call(&app, get_with_token("/api/auth/me", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "me@example.com");

        let (status, body) = call(&app, get_with_token("/api/auth/me", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");

        let missing = Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap();
        let (status, body) = call(&app, missing).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing token");
    }

    #[tokio::test]
    async fn lowercase_bearer_scheme_is_accepted() {
        let app = build_app(AppState::fake());
        let (_, json) = call(
            &app,
            post("/api/auth/register", json!({"email": "low@example.com", "password": "hunter22"})),
        )
        .await;
        let token = json["token"].as_str().unwrap();

        let req = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, format!("bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, me) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "low@example.com");

        let req = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing token");
    }

    #[tokio::test]
    async fn me_rejects_token_for_unknown_user() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = state.jwt.sign(uuid::Uuid::new_v4()).unwrap();
        let (status, _) = call(&app, get_with_token("/api/auth/me", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
