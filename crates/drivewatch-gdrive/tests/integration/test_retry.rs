//! Integration tests for throttling and server error retries

use std::time::Duration;

use drivewatch_gdrive::{changes, client::DriveClient, DriveError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_429_then_success() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_start_page_token(&server, "55").await;

    let token = changes::get_start_page_token(&client).await.unwrap();
    assert_eq!(token.as_str(), "55");
}

#[tokio::test]
async fn test_5xx_then_success() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_start_page_token(&server, "56").await;

    let token = changes::get_start_page_token(&client).await.unwrap();
    assert_eq!(token.as_str(), "56");
}

#[tokio::test]
async fn test_429_retry_limit_exhausted() {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("t", server.uri())
        .with_retry_policy(1, Duration::from_millis(1));

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let err = changes::get_start_page_token(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::TooManyRequests { .. }));
}

#[tokio::test]
async fn test_server_error_exhausted() {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("t", server.uri())
        .with_retry_policy(0, Duration::from_millis(1));

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = changes::get_start_page_token(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::ServerError(_)));
}

#[tokio::test]
async fn test_4xx_not_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let err = changes::get_start_page_token(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::BadRequest(_)));
}
