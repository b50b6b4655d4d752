// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite attendance cache for the Rollcall engine.
//!
//! WAL-mode SQLite with embedded refinery migrations. All statements run on
//! tokio-rusqlite's single background thread, and every record state
//! transition is one conditional write keyed by `(session_code, student_id)`.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
