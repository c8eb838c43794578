pub mod ai;

pub use self::ai::ChatCompletionProcessor;
