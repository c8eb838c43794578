pub mod markdown;
pub mod setup;
pub mod terminal;
