//! Pure quiz state machine shared by every widget kind.

mod machine;
mod state;

pub use machine::QuizMachine;
pub use state::{ContinuePlan, Stage, TimeoutAction};
