//! Integration tests for drivewatch-gdrive
//!
//! Uses wiremock to simulate the Google Drive v3 API and verifies
//! end-to-end behavior of the DriveClient, change feed, file lookups,
//! push channels and the IRemoteStore adapter.

mod common;

mod test_changes;
mod test_files;
mod test_remote_store;
mod test_retry;
mod test_watch;
