//! Integration tests for the changes feed
//!
//! - Start page token bootstrap
//! - Single page listing with newStartPageToken
//! - Pagination across pages
//! - Page limit stops at the last nextPageToken
//! - Removed entries

use drivewatch_core::domain::Cursor;
use drivewatch_gdrive::changes;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn cursor(s: &str) -> Cursor {
    Cursor::new(s.to_string()).unwrap()
}

#[tokio::test]
async fn test_start_page_token() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_start_page_token(&server, "4242").await;

    let token = changes::get_start_page_token(&client)
        .await
        .expect("startPageToken failed");

    assert_eq!(token.as_str(), "4242");
}

#[tokio::test]
async fn test_start_page_token_missing_field_is_invalid() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let err = changes::get_start_page_token(&client).await.unwrap_err();
    assert!(matches!(err, drivewatch_gdrive::DriveError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_single_page_uses_new_start_token() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", "100"))
        .and(query_param("supportsAllDrives", "true"))
        .and(query_param("fields", changes::CHANGES_FIELDS))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": [common::change("f1", "nota.pdf", "month")],
            "newStartPageToken": "101"
        })))
        .mount(&server)
        .await;

    let page = changes::list_changes(&client, &cursor("100"), 10)
        .await
        .expect("list_changes failed");

    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].file_id.as_str(), "f1");
    assert_eq!(page.next_cursor, Some(cursor("101")));
}

#[tokio::test]
async fn test_follows_next_page_token() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "100",
        serde_json::json!([common::change("f1", "a.pdf", "p")]),
        Some("p2"),
        None,
    )
    .await;
    common::mount_changes_page(
        &server,
        "p2",
        serde_json::json!([common::change("f2", "b.pdf", "p")]),
        None,
        Some("150"),
    )
    .await;

    let page = changes::list_changes(&client, &cursor("100"), 10)
        .await
        .unwrap();

    let ids: Vec<_> = page.events.iter().map(|e| e.file_id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f2"]);
    assert_eq!(page.next_cursor, Some(cursor("150")));
}

#[tokio::test]
async fn test_page_limit_resumes_from_next_page_token() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "100",
        serde_json::json!([common::change("f1", "a.pdf", "p")]),
        Some("p2"),
        None,
    )
    .await;
    common::mount_changes_page(
        &server,
        "p2",
        serde_json::json!([common::change("f2", "b.pdf", "p")]),
        Some("p3"),
        None,
    )
    .await;

    let page = changes::list_changes(&client, &cursor("100"), 2)
        .await
        .unwrap();

    assert_eq!(page.events.len(), 2);
    assert_eq!(page.next_cursor, Some(cursor("p3")));
}

#[tokio::test]
async fn test_removed_entries_are_kept_as_removed() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "7",
        serde_json::json!([
            {"fileId": "gone", "removed": true},
            common::change("f1", "a.pdf", "p")
        ]),
        None,
        Some("8"),
    )
    .await;

    let page = changes::list_changes(&client, &cursor("7"), 10)
        .await
        .unwrap();

    assert_eq!(page.events.len(), 2);
    assert!(page.events[0].removed);
    assert!(page.events[0].candidate_meta().is_none());
    assert!(page.events[1].candidate_meta().is_some());
}

#[tokio::test]
async fn test_empty_feed() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(&server, "9", serde_json::json!([]), None, Some("9")).await;

    let page = changes::list_changes(&client, &cursor("9"), 10)
        .await
        .unwrap();

    assert!(page.events.is_empty());
    assert_eq!(page.next_cursor, Some(cursor("9")));
}

#[tokio::test]
async fn test_unauthorized_is_reported() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/changes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let err = changes::list_changes(&client, &cursor("1"), 10)
        .await
        .unwrap_err();

    match err {
        drivewatch_gdrive::DriveError::Unauthorized(msg) => assert_eq!(msg, "Invalid Credentials"),
        other => panic!("unexpected error: {other:?}"),
    }
}
