//! Record-keeping core for a multi-tenant language-tutoring platform.
//!
//! The crate owns the decision logic the surrounding CRUD services share:
//! who may create, read, update or delete an owned record, how ownership
//! fans out when a tutor acts on behalf of supervised students, the
//! tutor/student relationship lifecycle, and goal progress aggregation.
//! HTTP routing, credential handling and rendering live in the consuming
//! application, not here.

pub mod activities;
pub mod auth;
pub mod db;
pub mod env;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod test;
