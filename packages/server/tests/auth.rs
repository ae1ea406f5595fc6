use serde_json::{json, Value};

use crate::common::{routes, spawn_app, spawn_app_with_token_lifetime};

#[tokio::test]
async fn healthz_answers_without_auth() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "pixie core");
}

#[tokio::test]
async fn auth_health_answers_without_auth() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api/auth/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn minted_token_admits_requests() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url(routes::TOKEN))
        .json(&json!({"subject": "service-account"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap();

    let response = app
        .client
        .get(app.url(routes::PHOTOS))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn token_mint_requires_a_subject() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url(routes::TOKEN))
        .json(&json!({"subject": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn missing_and_malformed_headers_are_rejected() {
    let app = spawn_app().await;

    let response = app.client.get(app.url(routes::PHOTOS)).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .get(app.url(routes::PHOTOS))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn revocation_cuts_off_a_live_token() {
    let app = spawn_app().await;
    let token = app.user_token();

    let response = app
        .client
        .get(app.url(routes::PHOTOS))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .post(app.url(routes::REVOKE))
        .json(&json!({"token": token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = app
        .client
        .get(app.url(routes::PHOTOS))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn login_succeeds_for_the_seeded_admin() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url(routes::LOGIN))
        .json(&json!({"username": "admin", "password": "admin123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;

    let wrong_password = app
        .client
        .post(app.url(routes::LOGIN))
        .json(&json!({"username": "admin", "password": "nope"}))
        .send()
        .await
        .unwrap();
    let unknown_user = app
        .client
        .post(app.url(routes::LOGIN))
        .json(&json!({"username": "ghost", "password": "nope"}))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_user.status(), 401);

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn query_parameter_token_channel() {
    let app = spawn_app().await;
    let token = app.user_token();
    let id = app
        .upload(&token, "cat.png", "image/png", b"png-bytes".to_vec())
        .await;

    // Valid token via query parameter, no header at all.
    let response = app
        .client
        .get(app.url(format!("{}?token={token}", routes::photo(&id))))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A revoked token through the same channel is refused.
    app.state.auth.revoke_token(&token);
    let response = app
        .client
        .get(app.url(format!("{}?token={token}", routes::photo(&id))))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn expired_token_is_refused_on_both_channels() {
    let app = spawn_app_with_token_lifetime(1).await;
    let token = app.user_token();
    let id = app
        .upload(&token, "cat.png", "image/png", b"png-bytes".to_vec())
        .await;

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let response = app
        .client
        .get(app.url(routes::photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .get(app.url(format!("{}?token={token}", routes::photo(&id))))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}
