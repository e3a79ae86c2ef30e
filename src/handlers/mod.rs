pub mod coach;

pub use coach::{CoachError, CoachHandler};
