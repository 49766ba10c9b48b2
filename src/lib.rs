//! Client for the Transient Name Server (TNS) bulk report API.
//!
//! Builds AT reports from candidate light curves, submits them, and polls
//! for the server's feedback.
pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod report;
pub mod services;
pub mod utils;
