pub mod analysis;
pub mod content;
pub mod duplicate;
pub mod executor;
pub mod fusion;
pub mod hash;
pub mod history;
pub mod planner;
pub mod rules;
pub mod scanner;
pub mod tags;
pub mod taxonomy;
