pub mod config;
pub mod data_model;
pub mod error;
pub mod event;
pub mod log;
pub mod pointer;
pub mod program_counter;
pub mod workflow;
