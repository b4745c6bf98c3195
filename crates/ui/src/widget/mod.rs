pub(crate) mod controller;
pub mod view;

pub use view::{Panel, QuizView, accepts_text};

#[cfg(test)]
mod widget_smoke;
