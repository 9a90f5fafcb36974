//! DriveWatch Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ChangeEvent`, `AncestorEntry`, `Classification`, `ClassifiedEvent`
//! - **Use cases** - `AncestorResolver`, `PatternClassifier`, `DedupCache`, `RelevancePolicy`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ICursorStore`, `INotificationSink`
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases hold the classification pipeline's algorithms; the cycle
//! orchestrator that drives them lives in `drivewatch-sync`.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
