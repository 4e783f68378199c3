use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime},
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use futures::{SinkExt, Stream, StreamExt};
use gameon_back::{
    config::AppConfig,
    dao::store::MemoryStore,
    dto::format_system_time,
    routes,
    state::{AppState, SharedState},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite};
use tower::ServiceExt;
use uuid::Uuid;

fn test_app() -> (Router, SharedState) {
    let config = AppConfig::default().with_admin_emails(["admin@example.com"]);
    let state = AppState::with_store(config, Arc::new(MemoryStore::new()));
    (routes::router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn signup(app: &Router, name: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": format!("{name}@example.com"),
            "password": "password123",
            "display_name": name,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_owned(),
        body["user"]["id"].as_str().unwrap().to_owned(),
    )
}

fn game_payload(requires_approval: bool) -> Value {
    json!({
        "title": "Sunday five-a-side",
        "sport": "football",
        "location": { "address": "Riverside pitch" },
        "starts_at": format_system_time(SystemTime::now() + Duration::from_secs(3600)),
        "max_players": 4,
        "requires_approval": requires_approval,
    })
}

#[tokio::test]
async fn signup_login_and_me() {
    let (app, _) = test_app();
    let (token, user_id) = signup(&app, "alex").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({"email": "ALEX@example.com", "password": "password123", "display_name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "alex@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, body) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["role"], "user");

    let (status, _) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let (app, _) = test_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({"email": "kim@example.com", "password": "short", "display_name": "Kim"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (app, _) = test_app();
    let (status, _) = send(&app, Method::POST, "/games", None, Some(game_payload(false))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/notifications", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn host_and_players_through_a_game() {
    let (app, _) = test_app();
    let (host, host_id) = signup(&app, "host").await;
    let (player, player_id) = signup(&app, "player").await;

    let (status, game) = send(&app, Method::POST, "/games", Some(&host), Some(game_payload(true))).await;
    assert_eq!(status, StatusCode::CREATED, "{game}");
    assert_eq!(game["host_id"], host_id.as_str());
    assert_eq!(game["player_count"], 1);
    let game_id = game["id"].as_str().unwrap().to_owned();

    let (status, joined) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/join"),
        Some(&player),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["status"], "requested");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/requests/{player_id}/approve"),
        Some(&player),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/requests/{player_id}/approve"),
        Some(&host),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["player_count"], 2);

    let (status, inbox) = send(&app, Method::GET, "/notifications", Some(&player), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().map(Vec::len), Some(1));
    let (_, unread) = send(&app, Method::GET, "/notifications/unread-count", Some(&player), None).await;
    assert_eq!(unread["unread"], 1);

    let (status, listed) = send(&app, Method::GET, "/games?sport=Football", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, mine) = send(&app, Method::GET, "/users/me/games", Some(&player), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["id"], game_id.as_str());

    let (status, started) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/start"),
        Some(&host),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "ongoing");

    for (user_id, attended) in [(&host_id, true), (&player_id, true)] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/games/{game_id}/attendance"),
            Some(&host),
            Some(json!({"user_id": user_id, "attended": attended})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, completed) = send(&app, Method::GET, &format!("/games/{game_id}"), None, None).await;
    assert_eq!(completed["status"], "completed");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/ratings"),
        Some(&player),
        Some(json!({"user_id": host_id, "score": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/games/{game_id}/ratings"),
        Some(&player),
        Some(json!({"user_id": host_id, "score": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, profile) = send(&app, Method::GET, &format!("/users/{host_id}"), None, None).await;
    assert_eq!(profile["games_played"], 1);
    assert_eq!(profile["average_rating"], 4.0);
    assert!(profile.get("email").is_none());
}

#[tokio::test]
async fn chat_is_limited_to_participants_and_plain_text() {
    let (app, _) = test_app();
    let (host, _) = signup(&app, "host").await;
    let (outsider, _) = signup(&app, "outsider").await;
    let (_, game) = send(&app, Method::POST, "/games", Some(&host), Some(game_payload(false))).await;
    let messages = format!("/games/{}/messages", game["id"].as_str().unwrap());

    let (status, posted) = send(&app, Method::POST, &messages, Some(&host), Some(json!({"text": "see you there"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(posted["sender_name"], "host");

    let (status, _) = send(
        &app,
        Method::POST,
        &messages,
        Some(&host),
        Some(json!({"text": "data:image/png;base64,AAAA"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, &messages, Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, history) = send(&app, Method::GET, &format!("{messages}?limit=10"), Some(&host), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let (app, _) = test_app();
    let (admin, _) = signup(&app, "admin").await;
    let (member, member_id) = signup(&app, "member").await;
    let (reporter, _) = signup(&app, "reporter").await;

    let (status, _) = send(&app, Method::GET, "/admin/stats", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, "/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, report) = send(
        &app,
        Method::POST,
        "/reports",
        Some(&reporter),
        Some(json!({"target_type": "user", "target_id": member_id, "reason": "spam"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{report}");

    let (status, queue) = send(&app, Method::GET, "/admin/reports?status=pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue[0]["priority"], "low");
    assert_eq!(queue[0]["pending_count"], 1);

    let (status, resolved) = send(
        &app,
        Method::POST,
        &format!("/admin/reports/{}/resolve", report["id"].as_str().unwrap()),
        Some(&admin),
        Some(json!({"note": "confirmed", "action": "ban_user"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{resolved}");
    assert_eq!(resolved["status"], "resolved");

    let (status, _) = send(&app, Method::GET, "/auth/me", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = send(&app, Method::GET, "/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"], 3);
    assert_eq!(stats["banned_users"], 1);
    assert_eq!(stats["pending_reports"], 0);
}

#[tokio::test]
async fn degraded_mode_is_reported() {
    let state = AppState::new(AppConfig::default());
    let app = routes::router(state);

    let (status, body) = send(&app, Method::GET, "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    let (status, _) = send(&app, Method::GET, "/games", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = test_app();
    let (status, doc) = send(&app, Method::GET, "/api-doc/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/games/{id}/join"].is_object());
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Next JSON text frame, or `None` once the server closed the socket.
async fn next_frame<S>(socket: &mut S) -> Option<Value>
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("socket stalled")?
            .ok()?;
        match message {
            tungstenite::Message::Text(text) => return Some(serde_json::from_str(&text).unwrap()),
            tungstenite::Message::Close(_) => return None,
            _ => continue,
        }
    }
}

fn chat_frame(text: &str) -> tungstenite::Message {
    tungstenite::Message::Text(json!({"type": "message", "text": text}).to_string().into())
}

#[tokio::test]
async fn chat_socket_relays_and_closes_on_ban() {
    let (app, state) = test_app();
    let (admin, _) = signup(&app, "admin").await;
    let (host, host_id) = signup(&app, "host").await;
    let (player, _) = signup(&app, "player").await;
    let (_, game) = send(&app, Method::POST, "/games", Some(&host), Some(game_payload(false))).await;
    let game_id: Uuid = game["id"].as_str().unwrap().parse().unwrap();
    let (status, _) = send(&app, Method::POST, &format!("/games/{game_id}/join"), Some(&player), None).await;
    assert_eq!(status, StatusCode::OK);

    let addr = serve(app.clone()).await;
    let (mut host_socket, _) = connect_async(format!("ws://{addr}/games/{game_id}/chat?token={host}"))
        .await
        .unwrap();
    let (mut player_socket, _) = connect_async(format!("ws://{addr}/games/{game_id}/chat?token={player}"))
        .await
        .unwrap();
    for _ in 0..100 {
        if state.chat().listeners(game_id) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    host_socket.send(chat_frame("on my way")).await.unwrap();
    for socket in [&mut host_socket, &mut player_socket] {
        let frame = next_frame(socket).await.unwrap();
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["text"], "on my way");
        assert_eq!(frame["sender_id"], host_id.as_str());
    }

    host_socket.send(chat_frame("<img src=x>")).await.unwrap();
    assert_eq!(next_frame(&mut host_socket).await.unwrap()["type"], "error");
    host_socket
        .send(tungstenite::Message::Text(json!({"type": "wave"}).to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_frame(&mut host_socket).await.unwrap()["type"], "error");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/admin/users/{host_id}/ban"),
        Some(&admin),
        Some(json!({"reason": "abuse"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let last = next_frame(&mut host_socket).await.unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["message"], "session revoked");
    assert!(next_frame(&mut host_socket).await.is_none());

    let (status, _) = send(&app, Method::GET, &format!("/games/{game_id}/messages"), Some(&host), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn notification_stream_ends_when_the_user_is_banned() {
    let (app, _) = test_app();
    let (admin, _) = signup(&app, "admin").await;
    let (member, member_id) = signup(&app, "member").await;

    let request = Request::builder()
        .uri("/notifications/stream")
        .header(header::AUTHORIZATION, format!("Bearer {member}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();
    let ready = body.next().await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&ready).contains("event: ready"));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/admin/users/{member_id}/ban"),
        Some(&admin),
        Some(json!({"reason": "spam"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            chunk.unwrap();
        }
    })
    .await;
    assert!(ended.is_ok());
}

#[tokio::test]
async fn game_listing_filters_and_edit_rules() {
    let (app, _) = test_app();
    let (host, host_id) = signup(&app, "host").await;
    let (other, _) = signup(&app, "other").await;
    let (_, first) = send(&app, Method::POST, "/games", Some(&host), Some(game_payload(false))).await;
    let first_id = first["id"].as_str().unwrap().to_owned();
    let mut beginner = game_payload(false);
    beginner["skill_level"] = json!("beginner");
    let (status, second) = send(&app, Method::POST, "/games", Some(&other), Some(beginner)).await;
    assert_eq!(status, StatusCode::CREATED, "{second}");

    let (status, _) = send(&app, Method::POST, &format!("/games/{first_id}/start"), Some(&host), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, ongoing) = send(&app, Method::GET, "/games?status=ongoing", None, None).await;
    assert_eq!(ongoing.as_array().map(Vec::len), Some(1));
    assert_eq!(ongoing[0]["id"], first_id.as_str());

    let (_, beginners) = send(&app, Method::GET, "/games?skill_level=beginner", None, None).await;
    assert_eq!(beginners.as_array().map(Vec::len), Some(1));
    assert_eq!(beginners[0]["id"], second["id"]);

    let (_, hosted) = send(&app, Method::GET, &format!("/games?host_id={host_id}"), None, None).await;
    assert_eq!(hosted.as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/games/{first_id}"),
        Some(&host),
        Some(json!({"title": "Renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
