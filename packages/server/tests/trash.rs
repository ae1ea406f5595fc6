use serde_json::Value;

use crate::common::{routes, spawn_app, TestApp};

async fn count(app: &TestApp, token: &str, path: &str) -> usize {
    let body = app.get_json(token, path).await;
    body["photos"].as_array().unwrap().len()
}

#[tokio::test]
async fn trash_restore_purge_lifecycle() {
    let app = spawn_app().await;
    let token = app.user_token();

    let id = app
        .upload(&token, "cat.png", "image/png", b"bytes".to_vec())
        .await;

    // Trash: active list empties, trash list fills.
    let response = app
        .client
        .put(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], id);

    assert_eq!(count(&app, &token, routes::PHOTOS).await, 0);
    assert_eq!(count(&app, &token, routes::TRASH).await, 1);

    // Trashing a trashed photo conflicts.
    let response = app
        .client
        .put(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Restore and the mirror rule.
    let response = app
        .client
        .put(app.url(routes::restore_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(count(&app, &token, routes::PHOTOS).await, 1);

    let response = app
        .client
        .put(app.url(routes::restore_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Trash again, purge the single photo.
    app.client
        .put(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .delete(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    assert_eq!(count(&app, &token, routes::PHOTOS).await, 0);
    assert_eq!(count(&app, &token, routes::TRASH).await, 0);

    let response = app
        .client
        .get(app.url(routes::photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn purging_an_active_photo_conflicts() {
    let app = spawn_app().await;
    let token = app.user_token();
    let id = app
        .upload(&token, "cat.png", "image/png", b"bytes".to_vec())
        .await;

    let response = app
        .client
        .delete(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // The blob is untouched.
    assert!(app.storage.contains(&format!("photos/{id}")));
}

#[tokio::test]
async fn trashing_a_missing_photo_is_404() {
    let app = spawn_app().await;
    let token = app.user_token();

    let response = app
        .client
        .put(app.url(routes::trash_photo(&uuid::Uuid::new_v4().to_string())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn empty_trash_reports_the_purged_count() {
    let app = spawn_app().await;
    let token = app.user_token();

    let keep = app
        .upload(&token, "keep.png", "image/png", b"keep".to_vec())
        .await;
    let purge_a = app
        .upload(&token, "a.png", "image/png", b"a".to_vec())
        .await;
    let purge_b = app
        .upload(&token, "b.png", "image/png", b"b".to_vec())
        .await;

    for id in [&purge_a, &purge_b] {
        app.client
            .put(app.url(routes::trash_photo(id)))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
    }

    let listed = count(&app, &token, routes::TRASH).await;

    let response = app
        .client
        .delete(app.url(routes::TRASH))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"].as_u64().unwrap() as usize, listed);
    assert_eq!(body["message"], "Trash emptied");

    assert_eq!(count(&app, &token, routes::TRASH).await, 0);
    assert_eq!(count(&app, &token, routes::PHOTOS).await, 1);

    // Purged blobs are gone, the kept one is not.
    assert!(!app.storage.contains(&format!("photos/{purge_a}")));
    assert!(!app.storage.contains(&format!("photos/{purge_b}")));
    assert!(app.storage.contains(&format!("photos/{keep}")));
}

#[tokio::test]
async fn purge_removes_thumbnail_blobs_best_effort() {
    let app = spawn_app().await;
    let token = app.user_token();

    let id = app
        .upload(&token, "cat.png", "image/png", b"bytes".to_vec())
        .await;
    let uuid: uuid::Uuid = id.parse().unwrap();

    let thumb_key = format!("thumb/512/{id}.jpg");
    app.storage
        .put(&thumb_key, bytes::Bytes::from_static(b"t"), "image/jpeg")
        .await
        .unwrap();
    app.photos
        .merge_thumbnail(uuid, "512", &thumb_key)
        .await
        .unwrap();

    app.client
        .put(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .delete(app.url(routes::trash_photo(&id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    assert!(!app.storage.contains(&format!("photos/{id}")));
    assert!(!app.storage.contains(&thumb_key));
    assert!(app.storage.is_empty());
}
