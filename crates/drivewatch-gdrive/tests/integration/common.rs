//! Shared test helpers for Drive API integration tests
//!
//! Each helper mounts the necessary mock endpoints on a wiremock server.
//! Clients returned here retry quickly so throttling tests stay fast.

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivewatch_gdrive::client::DriveClient;

/// Starts a mock server and returns a client pointing at it.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("test-access-token", server.uri())
        .with_retry_policy(2, Duration::from_millis(10));
    (server, client)
}

/// Mounts `GET /changes/startPageToken` returning `token`.
pub async fn mount_start_page_token(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "drive#startPageToken",
                "startPageToken": token
            })),
        )
        .mount(server)
        .await;
}

/// Mounts one `GET /changes` page answering requests for `page_token`.
///
/// Exactly one of `next_page_token` / `new_start_page_token` is usually set.
pub async fn mount_changes_page(
    server: &MockServer,
    page_token: &str,
    changes: serde_json::Value,
    next_page_token: Option<&str>,
    new_start_page_token: Option<&str>,
) {
    let mut body = serde_json::json!({
        "kind": "drive#changeList",
        "changes": changes
    });
    if let Some(next) = next_page_token {
        body["nextPageToken"] = serde_json::json!(next);
    }
    if let Some(new_start) = new_start_page_token {
        body["newStartPageToken"] = serde_json::json!(new_start);
    }

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", page_token))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts `GET /files/{id}` returning name and parents.
pub async fn mount_file(server: &MockServer, id: &str, name: &str, parents: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "name": name,
            "parents": parents
        })))
        .mount(server)
        .await;
}

/// Mounts `GET /files/{id}` answering 404 with Google's error envelope.
pub async fn mount_missing_file(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{id}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": 404,
                "message": format!("File not found: {id}.")
            }
        })))
        .mount(server)
        .await;
}

/// Mounts the folder search `GET /files` returning the given ids.
pub async fn mount_folder_search(server: &MockServer, ids: &[&str]) {
    let files: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "name": "Clientes"}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": files
        })))
        .mount(server)
        .await;
}

/// A change entry for an existing file.
pub fn change(file_id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "drive#change",
        "fileId": file_id,
        "removed": false,
        "file": {
            "id": file_id,
            "name": name,
            "parents": [parent],
            "createdTime": "2024-03-10T12:00:00.000Z",
            "modifiedTime": "2024-03-10T12:00:00.000Z"
        }
    })
}
