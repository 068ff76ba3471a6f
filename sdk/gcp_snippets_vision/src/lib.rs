#![doc = include_str!("../README.md")]

pub mod annotate;
pub mod models;
pub mod snippets;
