//! Book reviews plus a minimal username/password token exchange.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod model;
pub mod rest;
pub mod validate;
