pub mod cli;
pub mod config;
pub mod control;
pub mod logging;
pub mod sink;
pub mod stream;
