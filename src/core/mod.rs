pub mod command;
pub mod config;
pub mod history;
pub mod lib;
pub mod shell;
