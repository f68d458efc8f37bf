// src/models/mod.rs

pub mod generation;
pub mod question;
pub mod study_set;
