#![doc = include_str!("../README.md")]

pub mod batch;
pub mod city;
pub mod database;
pub mod field_path;
pub mod field_value;
pub mod query;
pub mod reference;
pub mod snapshot;
pub mod snippets;
pub mod transaction;
pub mod value;
pub mod write;
