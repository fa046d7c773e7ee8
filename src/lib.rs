//! TTS Product Monitor
//!
//! Keeps a local table of affiliate products in step with the affiliate open
//! API. A reconciliation run re-checks every stored product in rate-limited
//! batches, records which ones still carry a complete commission plan, and
//! alerts on products that turned invalid until an operator confirms them.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
