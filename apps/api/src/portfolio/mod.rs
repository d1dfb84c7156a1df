//! Clients and the projects run for them.

pub mod clients;
pub mod handlers;
pub mod projects;
