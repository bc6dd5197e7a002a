//! The havoc decision engine.
//!
//! This crate holds everything between "which instances exist" and "kill
//! this one":
//!
//! - `eligible`: filters a deployment tree down to killable instances.
//! - `schedule`: the once-a-day coin flip and time pick per group.
//! - `store`: the termination history guard and schedule store, with
//!   serializable-transaction semantics.
//! - `terminate`: the orchestrator that composes policy checks, selection,
//!   the guard, tracking, and the final kill.
//! - `spinnaker`: the inventory/config/kill collaborator backed by the
//!   Spinnaker API.
//!
//! Collaborators are injected as traits through [`deps::Deps`]; nothing in
//! this crate registers itself globally.

pub mod clock;
pub mod config;
pub mod deps;
pub mod eligible;
pub mod env;
pub mod killer;
pub mod outage;
pub mod schedule;
pub mod spinnaker;
pub mod store;
pub mod terminate;
pub mod tracker;
