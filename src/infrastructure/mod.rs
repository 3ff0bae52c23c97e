// src/infrastructure/mod.rs
pub mod accounts;
pub mod exchange;
pub mod http;
pub mod market;
pub mod persistence;
