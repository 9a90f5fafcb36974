//! File metadata and folder lookups

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use drivewatch_core::domain::{AncestorEntry, FileId};

use crate::client::DriveClient;
use crate::DriveError;

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct DriveFileMetadata {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFileRef>,
}

#[derive(Debug, Deserialize)]
struct DriveFileRef {
    id: String,
}

fn parse_id(raw: String) -> Result<FileId, DriveError> {
    FileId::new(raw).map_err(|e| DriveError::InvalidResponse(e.to_string()))
}

/// Retrieves name and parents of one item (`GET /files/{id}`)
///
/// # Errors
///
/// [`DriveError::NotFound`] if the item was deleted or is not visible
pub async fn get_file_metadata(
    client: &DriveClient,
    file_id: &FileId,
) -> Result<AncestorEntry, DriveError> {
    debug!(file_id = %file_id, "Fetching file metadata");

    let path = format!("/files/{}", file_id.as_str());
    let request = client
        .request(Method::GET, &path)
        .query(&[("fields", "id,name,parents"), ("supportsAllDrives", "true")]);

    let item: DriveFileMetadata = client.get_json(request).await?;

    let parents = item
        .parents
        .into_iter()
        .map(parse_id)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AncestorEntry::new(parse_id(item.id)?, item.name, parents))
}

/// Builds the `q` expression matching a non-trashed folder by exact name
pub fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false")
}

/// Finds a folder by its exact name; the first match wins
///
/// # Errors
///
/// [`DriveError::NotFound`] if no folder carries that name
pub async fn find_folder_by_name(client: &DriveClient, name: &str) -> Result<FileId, DriveError> {
    let query = folder_query(name);
    let request = client.request(Method::GET, "/files").query(&[
        ("q", query.as_str()),
        ("fields", "files(id,name)"),
        ("pageSize", "10"),
        ("supportsAllDrives", "true"),
        ("includeItemsFromAllDrives", "true"),
    ]);

    let list: DriveFileList = client.get_json(request).await?;

    if list.files.len() > 1 {
        debug!(name, matches = list.files.len(), "Folder name is ambiguous, using first match");
    }

    let first = list
        .files
        .into_iter()
        .next()
        .ok_or_else(|| DriveError::NotFound(format!("folder '{name}'")))?;

    parse_id(first.id)
}
