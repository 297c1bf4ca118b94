pub mod annotate;
pub mod boxes;
pub mod config;
pub mod cycles;
pub mod data;
pub mod output;
