//! procaudit - Process Lifecycle Audit Library
//!
//! This library exposes the filter engine, the event correlation core and
//! the agent that wires them to a process event source.

#![forbid(unsafe_code)]

pub mod cli;
pub mod constants;
pub mod daemon;
pub mod filter;
pub mod models;
pub mod monitor;
pub mod output;
