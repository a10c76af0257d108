//! Sensor registry with a bounded history of readings per sensor.

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod validate;
