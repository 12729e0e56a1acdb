//! Domain layer for test sessions

pub mod entities;
pub mod error;
pub mod scoring;
pub mod state;
