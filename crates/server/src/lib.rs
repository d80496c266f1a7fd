//! Webhook front-end for crosstag.

pub mod api;
pub mod state;
