//! API integration tests
//!
//! Drive the composed router against a real Postgres. Set
//! `TEST_DATABASE_URL` and run with `cargo test -- --ignored`.

#![allow(dead_code)]

mod codes;
mod common;
mod concurrency;
mod requests;
mod scenarios;
mod sessions;
