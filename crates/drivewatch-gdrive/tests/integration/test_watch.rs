//! Integration tests for push channel registration

use std::time::Duration;

use drivewatch_core::domain::Cursor;
use drivewatch_gdrive::watch::{self, WatchRequest};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_register_and_stop_channel() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/changes/watch"))
        .and(query_param("pageToken", "300"))
        .and(body_partial_json(serde_json::json!({
            "type": "web_hook",
            "address": "https://alerts.example.com/webhook/office"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "api#channel",
            "id": "chan-1",
            "resourceId": "res-1",
            "expiration": "1900000000000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/channels/stop"))
        .and(body_partial_json(serde_json::json!({
            "id": "chan-1",
            "resourceId": "res-1"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let request = WatchRequest::web_hook(
        "https://alerts.example.com/webhook/office",
        None,
        Duration::from_secs(3600),
    );
    let cursor = Cursor::new("300".to_string()).unwrap();

    let channel = watch::watch_changes(&client, &cursor, &request).await.unwrap();
    assert_eq!(channel.id, "chan-1");
    assert_eq!(channel.resource_id, "res-1");
    assert!(channel.expires_at().is_some());

    watch::stop_channel(&client, &channel).await.unwrap();
}
