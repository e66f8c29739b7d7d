//! Stateful orchestration: cascades, the traveler, running levels.

pub mod agent;
pub mod cascade;
pub mod event;
pub mod level;
pub mod step;
pub mod world;
