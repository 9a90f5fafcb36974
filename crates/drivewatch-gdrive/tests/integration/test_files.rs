//! Integration tests for metadata and folder lookups

use drivewatch_core::domain::FileId;
use drivewatch_gdrive::{files, DriveError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn id(s: &str) -> FileId {
    FileId::new(s.to_string()).unwrap()
}

#[tokio::test]
async fn test_get_file_metadata() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_file(&server, "f1", "nota.pdf", &["month", "other"]).await;

    let entry = files::get_file_metadata(&client, &id("f1")).await.unwrap();

    assert_eq!(entry.id, id("f1"));
    assert_eq!(entry.name, "nota.pdf");
    assert_eq!(entry.primary_parent(), Some(&id("month")));
    assert_eq!(entry.parent_ids.len(), 2);
}

#[tokio::test]
async fn test_get_file_metadata_requests_fields() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/f1"))
        .and(query_param("fields", "id,name,parents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "f1",
            "name": "x"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = files::get_file_metadata(&client, &id("f1")).await.unwrap();
    assert!(entry.parent_ids.is_empty());
}

#[tokio::test]
async fn test_get_file_metadata_not_found() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_missing_file(&server, "gone").await;

    let err = files::get_file_metadata(&client, &id("gone"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Not found: File not found: gone.");
}

#[tokio::test]
async fn test_find_folder_by_name() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", files::folder_query("Clientes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "root-1", "name": "Clientes"}]
        })))
        .mount(&server)
        .await;

    let folder = files::find_folder_by_name(&client, "Clientes").await.unwrap();
    assert_eq!(folder, id("root-1"));
}

#[tokio::test]
async fn test_find_folder_ambiguous_takes_first() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_folder_search(&server, &["first", "second"]).await;

    let folder = files::find_folder_by_name(&client, "Clientes").await.unwrap();
    assert_eq!(folder, id("first"));
}

#[tokio::test]
async fn test_find_folder_missing() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_folder_search(&server, &[]).await;

    let err = files::find_folder_by_name(&client, "Clientes")
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::NotFound(_)));
}
