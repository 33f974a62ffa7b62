//! Water-quality telemetry relay.
//!
//! An ESP32 node posts pond readings to [`server`]; the latest one is kept in
//! memory, checked against [`ranges`], and breaches are pushed to Telegram
//! through [`alerts`]. [`training`] is the offline LSTM pipeline behind the
//! `pond-trainer` binary; the server never loads its output.

pub mod alerts;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod projection;
pub mod ranges;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod training;
