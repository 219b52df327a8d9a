//! # IO Module
//!
//! Interface layer between the HTTP world and the domain services.

pub mod rest;

pub use rest::*;
