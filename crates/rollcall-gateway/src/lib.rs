// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Rollcall attendance engine.
//!
//! Exposes session issuance, scan submission, record listing, health, and
//! Prometheus metrics over axum.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, HealthState, router, start_server};
