pub mod extraction;
pub mod handlers;
pub mod matching;
pub mod prompts;
pub mod skill_gap;
pub mod tools;
