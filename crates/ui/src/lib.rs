#![forbid(unsafe_code)]

pub mod dom;
pub mod lifecycle;
pub mod markup;
pub mod page;
pub mod registry;
pub mod scope;
pub mod widget;

#[cfg(test)]
mod test_harness;

pub use dom::{Document, DomError, Event, EventKind, NodeId};
pub use lifecycle::{
    Cleanup, ConfirmExit, FixedConfirm, Navigate, NextQuizUrl, QuizModule, WidgetOptions,
    default_next_quiz_url, quiz_url,
};
pub use markup::mount_quiz_markup;
pub use page::{NavTarget, Page};
pub use registry::{ResourceRegistry, TimerCallback, TimerId};
pub use scope::resolve;
