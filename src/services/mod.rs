pub mod cache;
pub mod clock;
pub mod generation;
pub mod maintenance;
pub mod pipeline;
pub mod prompt;
pub mod queue;
pub mod variations;
