// src/utils/mod.rs

pub mod fit;
pub mod hash;
pub mod imaging;
pub mod inflight;
pub mod jwt;
pub mod render;
