// src/handlers/mod.rs

pub mod admin;
pub mod assets;
pub mod attempts;
pub mod auth;
pub mod dashboard;
pub mod practical;
pub mod questions;
