//! # opskb
//!
//! An operational knowledge base: versioned articles with an editorial
//! review workflow, two-tier retrieval, citation-bearing question
//! answering, and an idempotent docs-import pipeline, all over a single
//! WAL-journaled SQLite file.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌───────────┐
//! │ Docs tree  │──▶│ Import        │──▶│  SQLite    │
//! │ (markdown) │   │ pipeline      │   │ (WAL, 6   │
//! └────────────┘   └───────────────┘   │  tables)  │
//!                                      └────┬──────┘
//! ┌────────────┐   ┌───────────────┐        │
//! │ Write API  │──▶│ Lifecycle +   │────────┤
//! │            │   │ versioning    │        │
//! └────────────┘   └───────────────┘        ▼
//!                  ┌───────────────┐   ┌───────────┐
//!                  │ Retrieval     │◀──│  CLI/HTTP │
//!                  │ (2-tier)      │   │  surface  │
//!                  └───────────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! opskb init                        # create database
//! opskb import docs --operator ops  # ingest a markdown tree
//! opskb search "upload queue full"
//! opskb ask "how do I drain the upload queue?"
//! opskb serve                       # start the console API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`lifecycle`] | Status vocabulary and the review state machine |
//! | [`store`] | Article store, versioning, audit trail |
//! | [`search`] | Two-tier retrieval, ask, recommendations |
//! | [`import`] | Docs-tree import pipeline |
//! | [`gates`] | Quality-gate thresholds |
//! | [`server`] | Console-facing HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod gates;
pub mod import;
pub mod lifecycle;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
