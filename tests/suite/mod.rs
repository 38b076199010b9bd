//! Integration test modules

mod boot;
mod config;
mod scenarios;
