//! # Datapact
//!
//! A governance backend for structured data agreements ("data contracts").
//!
//! The crate stores a normalized contract model, transcodes it to and from the
//! ODCS-like interchange document, drives the review/publish/deploy workflow,
//! tracks quality profiling runs, and manages versioned lineage.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use datapact::engine::Engine;
//! use datapact::store::SqliteStore;
//!
//! let store = SqliteStore::new("./data/datapact.db").unwrap();
//! store.initialize().unwrap();
//!
//! let engine = Engine::new(Arc::new(store), collaborators);
//! let contract = engine.import_document(&document, "alice").unwrap();
//! ```
//!
//! HTTP routing, authentication, notification delivery, audit storage, and the
//! platform job scheduler are external collaborators; see [`collab`] for the
//! traits a host must provide.

pub mod collab;
pub mod diff;
pub mod document;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;
