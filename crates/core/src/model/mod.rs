mod ids;
mod policy;
mod progress;
mod question;
mod result;
mod review;
mod sitting;

pub use ids::{CategoryId, CourseId, LearnerId, ParseIdError, QuestionId, QuizId, SittingId};
pub use policy::{OrderingMode, PolicyError, QuizPolicy, QuizPolicyBuilder, RevealMode};
pub use progress::{CategoryScore, Progress, ProgressDelta};
pub use question::{Choice, ChoiceId, Correctness, Question, QuestionError, QuestionKind, RawAnswer};
pub use result::{QuestionReport, SittingResult, score_percent};
pub use review::{ReviewSheet, answers_visible};
pub use sitting::{
    Feedback, PersistedSitting, QuestionBank, Sitting, SittingError, SittingProgress, SittingState,
    SubmitOutcome, TimeRemaining,
};
