// src/models/mod.rs

pub mod attempt;
pub mod practical;
pub mod question;
pub mod user;
