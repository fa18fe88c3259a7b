#![allow(clippy::module_name_repetitions, clippy::large_enum_variant)]

pub mod common;
pub mod config;
pub mod diffusion;
pub mod server;
