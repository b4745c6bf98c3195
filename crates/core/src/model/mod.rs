mod assessment;
mod ids;
mod kind;
mod progress;
mod question;
mod session;

pub use assessment::{Level, SkillAssessment};
pub use ids::{QuestionId, SkillName, SkillNameError};
pub use kind::{AssessmentWeights, KindProfile, ParseKindError, QuizKind, TimeoutPolicy};
pub use progress::{SkillProgressCounter, UsedQuestionPool};
pub use question::{
    AnswerInput, Difficulty, Question, QuestionBody, QuestionSet, QuestionSetError, QuestionShape,
    MAX_CHOICE_OPTIONS, SetConfig, TRANSCRIPT_PASS_SIMILARITY,
};
pub use session::{QuestionDetail, SessionAnswer, SessionResult, SubScore};
