//! Core engine — the poll → plan → build → submit sweep loop.

pub mod fee;
pub mod builder;
pub mod submitter;
pub mod sweeper;
