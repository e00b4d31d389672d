//! Utility modules

pub mod target_parser;
