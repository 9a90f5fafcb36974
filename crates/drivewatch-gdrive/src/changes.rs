//! Google Drive changes feed
//!
//! Implements incremental change retrieval:
//!
//! 1. **Bootstrap**: [`get_start_page_token`] returns a cursor at the current
//!    head of the feed, so history is never replayed.
//! 2. **List**: [`list_changes`] fetches the changes after a cursor, following
//!    `nextPageToken` up to a page limit.
//! 3. **Continue**: the returned [`ChangePage::next_cursor`] is either the
//!    feed's `newStartPageToken` (caught up) or the last `nextPageToken`
//!    (page limit reached; the next cycle resumes there).

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use drivewatch_core::domain::{ChangeEvent, ChangePage, Cursor, FileId, FileMeta};

use crate::client::DriveClient;
use crate::DriveError;

const START_PAGE_TOKEN_PATH: &str = "/changes/startPageToken";
const CHANGES_PATH: &str = "/changes";

/// Fields requested from `changes.list`
pub const CHANGES_FIELDS: &str = "changes(fileId,removed,file(id,name,parents,createdTime,modifiedTime)),nextPageToken,newStartPageToken";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageTokenResponse {
    start_page_token: Option<String>,
}

/// Raw response from `GET /changes`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveChangeList {
    #[serde(default)]
    changes: Vec<DriveChange>,
    /// Present while more pages follow
    next_page_token: Option<String>,
    /// Present on the last page only
    new_start_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveChange {
    file_id: Option<String>,
    #[serde(default)]
    removed: bool,
    file: Option<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    parents: Vec<String>,
    created_time: Option<DateTime<Utc>>,
    modified_time: Option<DateTime<Utc>>,
}

// ============================================================================
// ChangesParser
// ============================================================================

/// Converts Drive change entries into domain [`ChangeEvent`]s
pub struct ChangesParser;

impl ChangesParser {
    /// Parses one entry; entries without a usable file id are dropped
    fn parse_change(change: DriveChange) -> Option<ChangeEvent> {
        let Some(file_id) = change.file_id.and_then(|id| FileId::new(id).ok()) else {
            warn!("Skipping change entry without a valid fileId");
            return None;
        };

        let file = change.file.map(|f| {
            let parent_ids = f
                .parents
                .into_iter()
                .filter_map(|p| FileId::new(p).ok())
                .collect();
            FileMeta {
                name: f.name,
                parent_ids,
                created_at: f.created_time,
                modified_at: f.modified_time,
            }
        });

        Some(ChangeEvent {
            file_id,
            removed: change.removed,
            file,
        })
    }

    fn parse_events(list: Vec<DriveChange>) -> Vec<ChangeEvent> {
        list.into_iter().filter_map(Self::parse_change).collect()
    }
}

// ============================================================================
// Change feed functions
// ============================================================================

/// Fetches a cursor positioned at the current head of the change feed
///
/// # Errors
///
/// Any transport or status error, or a response without `startPageToken`
pub async fn get_start_page_token(client: &DriveClient) -> Result<Cursor, DriveError> {
    let request = client
        .request(Method::GET, START_PAGE_TOKEN_PATH)
        .query(&[("supportsAllDrives", "true")]);

    let response: StartPageTokenResponse = client.get_json(request).await?;

    let token = response
        .start_page_token
        .ok_or_else(|| DriveError::InvalidResponse("missing startPageToken".into()))?;

    Cursor::new(token).map_err(|e| DriveError::InvalidResponse(e.to_string()))
}

/// Fetches a single page of changes starting at `page_token`
async fn get_changes_page(
    client: &DriveClient,
    page_token: &str,
) -> Result<DriveChangeList, DriveError> {
    let request = client.request(Method::GET, CHANGES_PATH).query(&[
        ("pageToken", page_token),
        ("fields", CHANGES_FIELDS),
        ("supportsAllDrives", "true"),
        ("includeItemsFromAllDrives", "true"),
    ]);

    client.get_json(request).await
}

/// Lists the changes recorded after `cursor`
///
/// Follows `nextPageToken` until the feed reports `newStartPageToken` or
/// `max_pages` pages have been read.
///
/// # Errors
///
/// Returns an error if any page request fails; nothing from earlier pages is
/// returned in that case, so the caller can retry from the same cursor.
pub async fn list_changes(
    client: &DriveClient,
    cursor: &Cursor,
    max_pages: u32,
) -> Result<ChangePage, DriveError> {
    let max_pages = max_pages.max(1);
    let mut events = Vec::new();
    let mut page_token = cursor.as_str().to_string();
    let mut pages: u32 = 0;

    let next = loop {
        let page = get_changes_page(client, &page_token).await?;
        pages += 1;

        debug!(
            page = pages,
            changes = page.changes.len(),
            has_next = page.next_page_token.is_some(),
            "Received changes page"
        );

        events.extend(ChangesParser::parse_events(page.changes));

        if let Some(new_start) = page.new_start_page_token {
            break Some(new_start);
        }
        match page.next_page_token {
            Some(token) if pages < max_pages => page_token = token,
            Some(token) => {
                debug!(pages, "Page limit reached; resuming next cycle");
                break Some(token);
            }
            None => {
                warn!("Changes page carried neither nextPageToken nor newStartPageToken");
                break None;
            }
        }
    };

    let next_cursor = next
        .map(Cursor::new)
        .transpose()
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;

    debug!(
        total = events.len(),
        pages,
        advanced = next_cursor.is_some(),
        "Change listing complete"
    );

    Ok(ChangePage::new(events, next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_change_list() {
        let json = r#"{
            "changes": [
                {
                    "fileId": "f1",
                    "removed": false,
                    "file": {
                        "id": "f1",
                        "name": "nota.pdf",
                        "parents": ["month-1"],
                        "createdTime": "2024-03-10T12:00:00.000Z",
                        "modifiedTime": "2024-03-10T12:00:05.000Z"
                    }
                },
                { "fileId": "f2", "removed": true }
            ],
            "newStartPageToken": "120"
        }"#;

        let list: DriveChangeList = serde_json::from_str(json).unwrap();
        assert_eq!(list.changes.len(), 2);
        assert_eq!(list.new_start_page_token.as_deref(), Some("120"));
        assert!(list.next_page_token.is_none());

        let events = ChangesParser::parse_events(list.changes);
        assert_eq!(events.len(), 2);

        let meta = events[0].candidate_meta().unwrap();
        assert_eq!(meta.name, "nota.pdf");
        assert_eq!(meta.parent_ids[0].as_str(), "month-1");
        assert!(meta.created_at.is_some());
        assert!(meta.modified_at.is_some());

        assert!(events[1].removed);
        assert!(events[1].file.is_none());
    }

    #[test]
    fn test_entry_without_file_id_dropped() {
        let json = r#"{"changes": [{"removed": false}, {"fileId": "", "removed": false}]}"#;
        let list: DriveChangeList = serde_json::from_str(json).unwrap();
        assert!(ChangesParser::parse_events(list.changes).is_empty());
    }

    #[test]
    fn test_file_without_parents() {
        let json = r#"{"changes": [{"fileId": "shared", "file": {"name": "x"}}]}"#;
        let list: DriveChangeList = serde_json::from_str(json).unwrap();
        let events = ChangesParser::parse_events(list.changes);
        assert!(!events[0].removed);
        assert!(events[0].file.as_ref().unwrap().parent_ids.is_empty());
    }

    #[test]
    fn test_empty_response() {
        let list: DriveChangeList = serde_json::from_str("{}").unwrap();
        assert!(list.changes.is_empty());
    }
}
