pub mod chunking;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod report;
pub mod validate;
