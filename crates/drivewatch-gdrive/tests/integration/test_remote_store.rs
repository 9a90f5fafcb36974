//! Integration tests for DriveRemoteStore through the IRemoteStore port

use drivewatch_core::domain::{Cursor, FileId};
use drivewatch_core::ports::{IRemoteStore, RemoteStoreError};
use drivewatch_gdrive::DriveRemoteStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_port_round_trip() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_start_page_token(&server, "10").await;
    common::mount_changes_page(
        &server,
        "10",
        serde_json::json!([common::change("f1", "nota.pdf", "month")]),
        None,
        Some("11"),
    )
    .await;
    common::mount_file(&server, "month", "2024-03", &["year"]).await;
    common::mount_folder_search(&server, &["root-1"]).await;

    let store = DriveRemoteStore::new(client);

    let start = store.get_start_cursor().await.unwrap();
    assert_eq!(start.as_str(), "10");

    let page = store.list_changes_since(&start).await.unwrap();
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.next_cursor, Some(Cursor::new("11".into()).unwrap()));

    let month = store
        .get_metadata(&FileId::new("month".into()).unwrap())
        .await
        .unwrap();
    assert_eq!(month.name, "2024-03");

    let root = store.find_folder_by_name("Clientes").await.unwrap();
    assert_eq!(root.as_str(), "root-1");
}

#[tokio::test]
async fn test_not_found_maps_to_port_not_found() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_missing_file(&server, "gone").await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .get_metadata(&FileId::new("gone".into()).unwrap())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_auth_failure_maps_to_unavailable() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let err = store.get_start_cursor().await.unwrap_err();

    assert!(matches!(err, RemoteStoreError::Unavailable(_)));
}
