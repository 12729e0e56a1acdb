//! Domain layer for access control

pub mod codes;
pub mod entities;
pub mod error;
pub mod state;
