// src/services/mod.rs

pub mod generation;
pub mod guard;
pub mod positions;
