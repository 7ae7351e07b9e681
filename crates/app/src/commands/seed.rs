use anyhow::Context;
use chrono::{Duration, Utc};
use quiz_core::model::{
    CategoryId, Choice, ChoiceId, CourseId, LearnerId, OrderingMode, Question, QuestionId,
    QuestionKind, QuizId, QuizPolicy, RevealMode,
};
use services::QuizServices;

pub const DEMO_COURSE: CourseId = CourseId::new(1);
pub const DEMO_LEARNER: LearnerId = LearnerId::new(1);
pub const PRACTICE_QUIZ: QuizId = QuizId::new(1);
pub const EXAM_QUIZ: QuizId = QuizId::new(2);

const OWNERSHIP: CategoryId = CategoryId::new(1);
const SYNTAX: CategoryId = CategoryId::new(2);

pub async fn execute(services: &QuizServices) -> anyhow::Result<()> {
    let catalog = services.catalog();

    let practice = QuizPolicy::builder(PRACTICE_QUIZ, DEMO_COURSE, "Rust basics: practice")
        .ordering(OrderingMode::Random)
        .reveal(RevealMode::Immediate)
        .pass_mark(60)
        .attempt_ceiling(3)
        .review_after_submission(true)
        .build()?;
    let exam = QuizPolicy::builder(EXAM_QUIZ, DEMO_COURSE, "Rust basics: exam")
        .exam_paper(true)
        .pass_mark(70)
        .attempt_ceiling(1)
        .time_limit(Some(Duration::minutes(15)))
        .answers_visible_after(Some(Utc::now() + Duration::days(7)))
        .build()?;
    catalog.publish_policy(&practice).await?;
    catalog.publish_policy(&exam).await?;

    for question in practice_questions()?.iter().chain(exam_questions()?.iter()) {
        catalog
            .save_question(question)
            .await
            .with_context(|| format!("saving question {}", question.id()))?;
    }
    catalog.enroll(DEMO_LEARNER, DEMO_COURSE).await?;

    println!(
        "Seeded course {DEMO_COURSE}: quizzes {PRACTICE_QUIZ} (practice) and {EXAM_QUIZ} (exam), learner {DEMO_LEARNER} enrolled"
    );
    Ok(())
}

fn practice_questions() -> anyhow::Result<Vec<Question>> {
    Ok(vec![
        Question::new(
            QuestionId::new(1),
            PRACTICE_QUIZ,
            "Which of these moves a String into a function?",
            "Passing by value transfers ownership.",
            QuestionKind::MultipleChoice {
                choices: vec![
                    Choice::new("a", "f(&s)"),
                    Choice::new("b", "f(s)"),
                    Choice::new("c", "f(&mut s)"),
                ],
                correct: ChoiceId::new("b"),
            },
        )?
        .with_category(OWNERSHIP),
        Question::new(
            QuestionId::new(2),
            PRACTICE_QUIZ,
            "A value can have two mutable borrows alive at once.",
            "Only one mutable borrow may be live at a time.",
            QuestionKind::TrueFalse { answer: false },
        )?
        .with_category(OWNERSHIP),
        Question::new(
            QuestionId::new(3),
            PRACTICE_QUIZ,
            "Which macro prints a line to stdout?",
            "println! appends a newline; print! does not.",
            QuestionKind::FillInBlank {
                expected: "println!".into(),
                case_sensitive: false,
            },
        )?
        .with_category(SYNTAX),
        Question::new(
            QuestionId::new(4),
            PRACTICE_QUIZ,
            "In a sentence or two, why does Rust have no null?",
            "",
            QuestionKind::Essay,
        )?,
    ])
}

fn exam_questions() -> anyhow::Result<Vec<Question>> {
    Ok(vec![
        Question::new(
            QuestionId::new(11),
            EXAM_QUIZ,
            "Which trait lets a type be duplicated implicitly by copying bits?",
            "Copy types are duplicated on assignment.",
            QuestionKind::MultipleChoice {
                choices: vec![
                    Choice::new("a", "Clone"),
                    Choice::new("b", "Copy"),
                    Choice::new("c", "Default"),
                ],
                correct: ChoiceId::new("b"),
            },
        )?
        .with_category(OWNERSHIP),
        Question::new(
            QuestionId::new(12),
            EXAM_QUIZ,
            "`let` bindings are immutable unless marked `mut`.",
            "",
            QuestionKind::TrueFalse { answer: true },
        )?
        .with_category(SYNTAX),
        Question::new(
            QuestionId::new(13),
            EXAM_QUIZ,
            "Which keyword declares a compile-time constant?",
            "",
            QuestionKind::FillInBlank {
                expected: "const".into(),
                case_sensitive: true,
            },
        )?
        .with_category(SYNTAX),
        Question::new(
            QuestionId::new(14),
            EXAM_QUIZ,
            "Describe when you would reach for Rc<RefCell<T>>.",
            "",
            QuestionKind::Essay,
        )?,
    ])
}
