use thiserror::Error;

use crate::model::{QuestionSetError, SkillNameError};
use crate::selection::SelectionError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    SkillName(#[from] SkillNameError),
}
