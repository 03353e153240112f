//! Decision-tree quizzes: author a tree as JSON, an indented outline or an
//! arrow diagram, walk it one answer at a time, and count how many people
//! reached each recommendation.

pub mod config;
pub mod quiz;
pub mod store;
pub mod tally;
