#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::TcpListener,
    sync::{Arc, Mutex},
};

use api_types::{RatingRequest, UserProfile};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use url::Url;

pub const TOKEN: &str = "good-token";
pub const ME: &str = "100";

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Clone, Default)]
pub struct Backend {
    pub ratings: Arc<Mutex<Vec<(String, RatingRequest)>>>,
    pub rated_queries: Arc<Mutex<Vec<Option<String>>>>,
    pub untracked: Arc<Mutex<Vec<String>>>,
    pub undone: Arc<Mutex<Vec<String>>>,
    pub plugin_key: Arc<Mutex<Option<String>>>,
}

fn authorize(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Could not validate credentials"})),
        )),
    }
}

pub fn profile_json(id: &str, name: &str) -> Value {
    json!({"id": id, "username": name, "discriminator": "0", "avatar": null, "avatar_url": null})
}

async fn me(headers: HeaderMap) -> Reply {
    authorize(&headers)?;
    Ok(Json(json!({"user_id": ME, "username": "tester", "profilePicUrl": null})))
}

async fn tracked_servers(headers: HeaderMap) -> Reply {
    authorize(&headers)?;
    Ok(Json(json!([
        {"id": "s1", "name": "Gaming Crew", "icon": null, "trackedUserCount": 1},
        {"id": "s2", "name": "Study Group", "icon": null, "tracked_user_count": 0}
    ])))
}

async fn rated_users(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path(_acting): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Reply {
    authorize(&headers)?;
    b.rated_queries
        .lock()
        .unwrap()
        .push(q.get("server_id").cloned());
    Ok(Json(json!([
        {"profile": profile_json("1", "theebis"), "current_score": 15.0}
    ])))
}

async fn given_history(headers: HeaderMap, Path((_acting, target)): Path<(String, String)>) -> Reply {
    authorize(&headers)?;
    match target.as_str() {
        "1" => Ok(Json(json!({
            "target_user_id": "1",
            "scores_history": [
                {"timestamp": "2024-01-01T00:00:00Z", "score_value": 5.0},
                {"timestamp": "2024-01-03T00:00:00", "score_value": -50.0}
            ]
        }))),
        "2" => Ok(Json(json!({
            "target_user_id": "2",
            "scores_history": [
                {"timestamp": "2024-01-02T00:00:00+00:00", "score_value": 10.0}
            ]
        }))),
        _ => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "history unavailable"})),
        )),
    }
}

async fn rate(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path((_acting, target)): Path<(String, String)>,
    Json(req): Json<RatingRequest>,
) -> Reply {
    authorize(&headers)?;
    if target == ME {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "You cannot rate yourself."})),
        ));
    }
    let score = req.score_delta;
    b.ratings.lock().unwrap().push((target.clone(), req));
    Ok(Json(json!({
        "target_user_id": target,
        "scores_history": [{"timestamp": "2024-03-01T10:00:00Z", "score_value": score}]
    })))
}

async fn undo(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path((_acting, target)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    authorize(&headers)?;
    b.undone.lock().unwrap().push(target);
    Ok(StatusCode::NO_CONTENT)
}

async fn untrack(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path((_acting, target)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    authorize(&headers)?;
    b.untracked.lock().unwrap().push(target);
    Ok(StatusCode::NO_CONTENT)
}

async fn discord_user(headers: HeaderMap, Path(id): Path<String>) -> Reply {
    authorize(&headers)?;
    if id == "42" {
        Ok(Json(profile_json("42", "vough")))
    } else {
        Err((StatusCode::NOT_FOUND, Json(json!({"detail": "Unknown User"}))))
    }
}

async fn key_status(State(b): State<Backend>, headers: HeaderMap) -> Reply {
    authorize(&headers)?;
    let has = b.plugin_key.lock().unwrap().is_some();
    let generated_at = if has {
        json!("2024-05-01T08:00:00")
    } else {
        Value::Null
    };
    Ok(Json(json!({"has_api_key": has, "generated_at": generated_at})))
}

async fn key_generate(State(b): State<Backend>, headers: HeaderMap) -> Reply {
    authorize(&headers)?;
    *b.plugin_key.lock().unwrap() = Some("plug-123".into());
    Ok(Json(json!({"api_key": "plug-123", "generated_at": "2024-05-01T08:00:00Z"})))
}

async fn key_revoke(
    State(b): State<Backend>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    authorize(&headers)?;
    *b.plugin_key.lock().unwrap() = None;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/me/tracked-servers", get(tracked_servers))
        .route("/users/me/plugin-api-key-status", get(key_status))
        .route("/users/me/plugin-api-key", post(key_generate).delete(key_revoke))
        .route("/users/:acting/rated-users", get(rated_users))
        .route("/users/:acting/credit/given/:target", get(given_history))
        .route("/users/:acting/credit/:target", post(rate))
        .route("/users/:acting/credit/:target/latest", delete(undo))
        .route("/users/:acting/tracking/:target", delete(untrack))
        .route("/discord/users/:id", get(discord_user))
        .with_state(backend)
}

pub async fn spawn(backend: Backend) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(backend);
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn profile(id: &str, name: &str) -> UserProfile {
    serde_json::from_value(profile_json(id, name)).unwrap()
}

