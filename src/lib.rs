pub mod cli;
pub mod commands;
pub mod data;
pub mod error;
pub mod fit;
pub mod output;
pub mod selection;
pub mod stats;
