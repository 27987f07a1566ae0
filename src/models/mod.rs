pub mod job;
pub mod progress;
