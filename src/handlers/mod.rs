// src/handlers/mod.rs

pub mod generate;
pub mod questions;
pub mod sets;
