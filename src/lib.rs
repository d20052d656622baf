//! Fareline - payment settlement and payout orchestration for a
//! ride-hailing platform.
//!
//! The crate prices completed rides, moves money through interchangeable
//! payment providers, reconciles asynchronous provider webhooks against
//! local state, and pays accrued earnings out to drivers and the operator
//! on a schedule.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
