//! Live evaluation overlay backend: follows a broadcast round, keeps the
//! tracked games' positions and scores current, and flags big swings.

pub mod clients;
pub mod config;
pub mod error;
pub mod feed;
pub mod routes;
pub mod source;
pub mod tracker;
