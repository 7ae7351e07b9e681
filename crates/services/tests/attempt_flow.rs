use chrono::Duration;
use quiz_core::model::{
    CategoryId, Choice, ChoiceId, CourseId, Correctness, LearnerId, OrderingMode, Question,
    QuestionId, QuestionKind, QuizId, QuizPolicy, QuizPolicyBuilder, RawAnswer, RevealMode,
    TimeRemaining,
};
use quiz_core::time::fixed_now;
use services::{
    ActivityEvent, Actor, AnswerFormat, Clock, NotAvailableReason, QuizError, QuizServices,
};
use storage::repository::{Storage, StorageError};

const COURSE: CourseId = CourseId::new(1);
const QUIZ: QuizId = QuizId::new(1);

fn learner() -> Actor {
    Actor::learner(LearnerId::new(10))
}

fn staff() -> Actor {
    Actor::staff(LearnerId::new(99))
}

fn policy() -> QuizPolicyBuilder {
    QuizPolicy::builder(QUIZ, COURSE, "Flow")
}

fn services_at(storage: &Storage, offset_secs: i64) -> QuizServices {
    let clock = Clock::fixed(fixed_now()).advanced(Duration::seconds(offset_secs));
    QuizServices::from_storage(storage, clock, Some(7))
}

fn multiple_choice(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        QUIZ,
        "Pick B",
        "B is the second letter",
        QuestionKind::MultipleChoice {
            choices: vec![Choice::new("A", "a"), Choice::new("B", "b"), Choice::new("C", "c")],
            correct: ChoiceId::new("B"),
        },
    )
    .unwrap()
}

fn true_false(id: u64, answer: bool) -> Question {
    Question::new(
        QuestionId::new(id),
        QUIZ,
        format!("Statement {id}"),
        "",
        QuestionKind::TrueFalse { answer },
    )
    .unwrap()
}

fn essay(id: u64) -> Question {
    Question::new(QuestionId::new(id), QUIZ, "Discuss", "", QuestionKind::Essay).unwrap()
}

async fn seed(storage: &Storage, policy: QuizPolicy, questions: Vec<Question>) {
    let services = services_at(storage, 0);
    let catalog = services.catalog();
    catalog.publish_policy(&policy).await.unwrap();
    for question in &questions {
        catalog.save_question(question).await.unwrap();
    }
    catalog.enroll(learner().id, COURSE).await.unwrap();
}

#[tokio::test]
async fn single_attempt_is_scored_discarded_and_exhausted() {
    let storage = Storage::in_memory();
    seed(&storage, policy().build().unwrap(), vec![multiple_choice(1)]).await;
    let services = services_at(&storage, 0);

    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    assert_eq!(handle.attempt_number, 1);
    assert!(!handle.resumed);
    assert_eq!(handle.time_remaining, TimeRemaining::Unbounded);

    let attempts = services.attempts();
    let view = attempts
        .current_question(learner(), handle.sitting_id)
        .await
        .unwrap()
        .expect("question served");
    assert_eq!(view.question_id, QuestionId::new(1));
    assert_eq!((view.position, view.total), (1, 1));
    assert!(matches!(view.format, AnswerFormat::Choice(ref choices) if choices.len() == 3));

    let outcome = attempts
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(1),
            RawAnswer::Choice(ChoiceId::new("B")),
        )
        .await
        .unwrap();
    assert!(outcome.feedback.is_none());
    assert!(!outcome.has_more());

    let finalized = attempts.finalize(learner(), handle.sitting_id).await.unwrap();
    assert_eq!(finalized.result.score_percent, 100);
    assert!(finalized.result.passed);
    assert!(!finalized.result.retained);
    assert!(finalized.events.contains(&ActivityEvent::SittingDiscarded {
        sitting_id: handle.sitting_id
    }));

    let gone = storage.sittings.get_sitting(handle.sitting_id).await;
    assert!(matches!(gone, Err(StorageError::NotFound)));

    let err = services.admission().admit(learner(), QUIZ).await.unwrap_err();
    assert!(matches!(
        err,
        QuizError::AttemptsExhausted {
            used: 1,
            ceiling: 1
        }
    ));
}

#[tokio::test]
async fn late_submit_force_finalizes_with_zero_score() {
    let storage = Storage::in_memory();
    let timed = policy()
        .time_limit(Some(Duration::seconds(10)))
        .build()
        .unwrap();
    seed(&storage, timed, vec![true_false(1, true), true_false(2, false)]).await;

    let handle = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap();
    assert_eq!(
        handle.time_remaining,
        TimeRemaining::Limited(Duration::seconds(10))
    );

    let late = services_at(&storage, 11).attempts();
    let err = late
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(1),
            RawAnswer::Boolean(true),
        )
        .await
        .unwrap_err();
    let QuizError::TimeExpired(result) = err else {
        panic!("expected TimeExpired, got {err:?}");
    };
    assert!(result.forced);
    assert_eq!(result.correct, 0);
    assert_eq!(result.graded_total, 2);
    assert_eq!(result.score_percent, 0);

    let again = late.finalize(learner(), handle.sitting_id).await.unwrap();
    assert!(again.is_repeat());
    assert_eq!(again.result.score_percent, 0);
    assert!(again.result.forced);

    let left = late
        .time_remaining(learner(), handle.sitting_id)
        .await
        .unwrap_err();
    assert!(matches!(left, QuizError::AlreadyComplete));
}

#[tokio::test]
async fn time_remaining_finalizes_an_expired_sitting() {
    let storage = Storage::in_memory();
    let timed = policy()
        .attempt_ceiling(2)
        .time_limit(Some(Duration::seconds(30)))
        .build()
        .unwrap();
    seed(&storage, timed, vec![true_false(1, true)]).await;

    let handle = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap();
    let later = services_at(&storage, 45);
    let left = later
        .attempts()
        .time_remaining(learner(), handle.sitting_id)
        .await
        .unwrap();
    assert!(left.is_exhausted());

    let records = storage
        .attempts
        .list_for_learner(learner().id, QUIZ)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].forced);

    let next = later.admission().admit(learner(), QUIZ).await.unwrap();
    assert_eq!(next.attempt_number, 2);
    assert_ne!(next.sitting_id, handle.sitting_id);
}

#[tokio::test]
async fn expired_sitting_is_finalized_before_readmission() {
    let storage = Storage::in_memory();
    let timed = policy()
        .time_limit(Some(Duration::seconds(5)))
        .build()
        .unwrap();
    seed(&storage, timed, vec![true_false(1, true)]).await;

    services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap();

    let err = services_at(&storage, 60)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::AttemptsExhausted { used: 1, .. }));
}

#[tokio::test]
async fn resubmitting_admission_resumes_the_same_sitting() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().attempt_ceiling(3).build().unwrap(),
        vec![true_false(1, true), true_false(2, true)],
    )
    .await;
    let services = services_at(&storage, 0);

    let first = services.admission().admit(learner(), QUIZ).await.unwrap();
    services
        .attempts()
        .submit_answer(
            learner(),
            first.sitting_id,
            QuestionId::new(1),
            RawAnswer::Boolean(true),
        )
        .await
        .unwrap();

    let second = services.admission().admit(learner(), QUIZ).await.unwrap();
    assert!(second.resumed);
    assert_eq!(second.sitting_id, first.sitting_id);
    assert_eq!(second.attempt_number, 1);
    assert_eq!(second.progress.answered, 1);
    assert_eq!(second.progress.remaining, 1);
}

#[tokio::test]
async fn answers_must_follow_the_served_order() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().build().unwrap(),
        vec![true_false(1, true), true_false(2, true)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();

    let err = services
        .attempts()
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(2),
            RawAnswer::Boolean(true),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizError::OutOfOrderAnswer {
            expected: Some(expected),
            submitted
        } if expected == QuestionId::new(1) && submitted == QuestionId::new(2)
    ));

    let early = services
        .attempts()
        .finalize(learner(), handle.sitting_id)
        .await
        .unwrap_err();
    assert!(matches!(early, QuizError::Incomplete { remaining: 2 }));
}

#[tokio::test]
async fn identical_resubmission_is_a_replay() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().build().unwrap(),
        vec![true_false(1, true), true_false(2, true)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    let attempts = services.attempts();

    let first = attempts
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    let replay = attempts
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    assert!(!first.replayed);
    assert!(replay.replayed);
    assert_eq!(replay.remaining, 1);

    attempts
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(2), RawAnswer::Boolean(true))
        .await
        .unwrap();
    let result = attempts.finalize(learner(), handle.sitting_id).await.unwrap().result;
    assert_eq!((result.correct, result.graded_total), (2, 2));
}

#[tokio::test]
async fn immediate_reveal_returns_feedback_for_each_answer() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().reveal(RevealMode::Immediate).build().unwrap(),
        vec![true_false(1, true)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();

    let outcome = services
        .attempts()
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(1),
            RawAnswer::Boolean(false),
        )
        .await
        .unwrap();
    let feedback = outcome.feedback.expect("immediate feedback");
    assert_eq!(feedback.correctness, Correctness::Incorrect);
    assert_eq!(feedback.correct_answer.as_deref(), Some("True"));

    let result = services
        .attempts()
        .finalize(learner(), handle.sitting_id)
        .await
        .unwrap()
        .result;
    assert!(result.breakdown.is_empty());
}

#[tokio::test]
async fn at_end_result_carries_the_breakdown() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().build().unwrap(),
        vec![true_false(1, true), multiple_choice(2)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    let attempts = services.attempts();
    attempts
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    attempts
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(2),
            RawAnswer::Choice(ChoiceId::new("A")),
        )
        .await
        .unwrap();

    let result = attempts.finalize(learner(), handle.sitting_id).await.unwrap().result;
    assert_eq!(result.score_percent, 50);
    assert!(result.passed);
    assert_eq!(result.breakdown.len(), 2);
    assert_eq!(result.breakdown[1].correctness, Some(Correctness::Incorrect));
    assert_eq!(result.breakdown[1].correct_answer.as_deref(), Some("B) b"));
}

#[tokio::test]
async fn learners_are_gated_and_staff_preview() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().draft(true).build().unwrap(),
        vec![true_false(1, true)],
    )
    .await;
    let services = services_at(&storage, 0);

    let err = services.admission().admit(learner(), QUIZ).await.unwrap_err();
    assert!(matches!(
        err,
        QuizError::NotAvailable {
            reason: NotAvailableReason::Draft
        }
    ));

    let stranger = Actor::learner(LearnerId::new(11));
    let err = services.admission().admit(stranger, QUIZ).await.unwrap_err();
    assert!(matches!(err, QuizError::NotEnrolled { .. }));

    let preview = services.admission().admit(staff(), QUIZ).await.unwrap();
    services
        .attempts()
        .submit_answer(staff(), preview.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    let result = services
        .attempts()
        .finalize(staff(), preview.sitting_id)
        .await
        .unwrap()
        .result;
    assert!(result.retained);
    assert!(storage.sittings.get_sitting(preview.sitting_id).await.is_ok());
}

#[tokio::test]
async fn window_outside_now_is_upcoming_or_closed() {
    let now = fixed_now();
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .available_from(Some(now + Duration::hours(1)))
            .available_until(Some(now + Duration::hours(2)))
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;

    let err = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizError::NotAvailable {
            reason: NotAvailableReason::Upcoming
        }
    ));

    let err = services_at(&storage, 3 * 3600)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizError::NotAvailable {
            reason: NotAvailableReason::Closed
        }
    ));
}

#[tokio::test]
async fn quiz_without_questions_is_empty() {
    let storage = Storage::in_memory();
    seed(&storage, policy().build().unwrap(), Vec::new()).await;

    let err = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::Empty));
    assert_eq!(
        storage
            .attempts
            .count_attempts(learner().id, QUIZ, COURSE)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn exam_paper_is_retained_and_can_be_marked() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy().exam_paper(true).build().unwrap(),
        vec![essay(1), multiple_choice(2)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    let attempts = services.attempts();
    attempts
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(1),
            RawAnswer::Text("A long answer".into()),
        )
        .await
        .unwrap();
    attempts
        .submit_answer(
            learner(),
            handle.sitting_id,
            QuestionId::new(2),
            RawAnswer::Choice(ChoiceId::new("C")),
        )
        .await
        .unwrap();
    let result = attempts.finalize(learner(), handle.sitting_id).await.unwrap().result;
    assert!(result.retained);
    assert_eq!((result.correct, result.graded_total, result.ungraded), (0, 1, 1));

    let marking = services.marking();
    let queue = marking.list_marking(staff(), QUIZ, None).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].ungraded, 1);

    let err = marking
        .mark(learner(), handle.sitting_id, QuestionId::new(1), true)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::Forbidden));

    let remarked = marking
        .mark(staff(), handle.sitting_id, QuestionId::new(1), true)
        .await
        .unwrap();
    assert_eq!((remarked.correct, remarked.graded_total, remarked.ungraded), (1, 2, 0));
    assert_eq!(remarked.score_percent, 50);

    let stored = storage
        .attempts
        .get_record(handle.sitting_id)
        .await
        .unwrap()
        .expect("ledger entry");
    assert_eq!(stored.score_percent, 50);

    let report = services.reports().progress(learner(), learner().id).await.unwrap();
    assert_eq!(report.exam_attempts.len(), 1);
}

#[tokio::test]
async fn discarded_sitting_cannot_be_marked() {
    let storage = Storage::in_memory();
    seed(&storage, policy().build().unwrap(), vec![true_false(1, true)]).await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    services
        .attempts()
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    services.attempts().finalize(learner(), handle.sitting_id).await.unwrap();

    let err = services
        .marking()
        .mark(staff(), handle.sitting_id, QuestionId::new(1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::NotRetained(id) if id == handle.sitting_id));
}

#[tokio::test]
async fn review_follows_the_visibility_rule() {
    let now = fixed_now();
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .attempt_ceiling(2)
            .available_until(Some(now + Duration::hours(1)))
            .answers_visible_after(Some(now + Duration::hours(2)))
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;
    let services = services_at(&storage, 0);

    let err = services.review().review(learner(), QUIZ).await.unwrap_err();
    assert!(matches!(err, QuizError::ReviewUnavailable));

    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    services
        .attempts()
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(false))
        .await
        .unwrap();
    services.attempts().finalize(learner(), handle.sitting_id).await.unwrap();

    let hidden = services.review().review(learner(), QUIZ).await.unwrap();
    assert!(!hidden.show_answers);
    assert!(hidden.answers.is_none());
    assert_eq!(hidden.attempts.len(), 1);

    let shown = services_at(&storage, 3 * 3600)
        .review()
        .review(learner(), QUIZ)
        .await
        .unwrap();
    assert!(shown.show_answers);
    let answers = shown.answers.expect("answers visible");
    assert_eq!(answers[0].correct_answer.as_deref(), Some("True"));
}

#[tokio::test]
async fn immediate_quiz_review_shows_scores_without_a_breakdown() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .reveal(RevealMode::Immediate)
            .review_after_submission(true)
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;
    let services = services_at(&storage, 0);
    let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
    services
        .attempts()
        .submit_answer(learner(), handle.sitting_id, QuestionId::new(1), RawAnswer::Boolean(true))
        .await
        .unwrap();
    services.attempts().finalize(learner(), handle.sitting_id).await.unwrap();

    let view = services.review().review(learner(), QUIZ).await.unwrap();
    assert!(view.show_answers);
    assert_eq!(view.attempts.len(), 1);
    assert_eq!(view.attempts[0].score_percent, 100);
    assert!(view.answers.is_none());
}

#[tokio::test]
async fn closed_quiz_is_reviewable_without_attempts() {
    let now = fixed_now();
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .available_until(Some(now - Duration::hours(1)))
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;

    let view = services_at(&storage, 0)
        .review()
        .review(learner(), QUIZ)
        .await
        .unwrap();
    assert!(view.attempts.is_empty());
    assert!(!view.show_answers);
}

#[tokio::test]
async fn reports_aggregate_the_ledger() {
    let storage = Storage::in_memory();
    let categorised = |id: u64| true_false(id, true).with_category(CategoryId::new(5));
    seed(
        &storage,
        policy()
            .attempt_ceiling(3)
            .ordering(OrderingMode::Random)
            .build()
            .unwrap(),
        vec![categorised(1), categorised(2)],
    )
    .await;

    for (offset, answer) in [(0, false), (100, true)] {
        let services = services_at(&storage, offset);
        let handle = services.admission().admit(learner(), QUIZ).await.unwrap();
        let attempts = services.attempts();
        while let Some(view) = attempts
            .current_question(learner(), handle.sitting_id)
            .await
            .unwrap()
        {
            attempts
                .submit_answer(
                    learner(),
                    handle.sitting_id,
                    view.question_id,
                    RawAnswer::Boolean(answer),
                )
                .await
                .unwrap();
        }
        attempts.finalize(learner(), handle.sitting_id).await.unwrap();
    }

    let reports = services_at(&storage, 200).reports();
    let results = reports.quiz_results(staff(), QUIZ).await.unwrap();
    assert_eq!(results.total_learners(), 1);
    assert_eq!(results.passed_learners(), 1);
    assert_eq!(results.learners[0].attempts, 2);
    assert_eq!(results.learners[0].best.score_percent, 100);
    assert!(results.learners[0].best.breakdown.is_empty());

    let course = reports.course_report(staff(), COURSE).await.unwrap();
    assert_eq!(course, vec![results.clone()]);

    let history = reports
        .attempt_history(learner(), learner().id, COURSE)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].attempt_number, 2);

    let listing = reports.quiz_listing(learner(), COURSE).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].attempts_used, 2);
    assert_eq!(listing[0].attempts_left, 1);

    let progress = reports.progress(learner(), learner().id).await.unwrap();
    let score = progress.progress.category(CategoryId::new(5));
    assert_eq!((score.correct, score.total), (2, 4));
    assert!(progress.exam_attempts.is_empty());

    let err = reports.quiz_results(learner(), QUIZ).await.unwrap_err();
    assert!(matches!(err, QuizError::Forbidden));
}

#[tokio::test]
async fn sweep_finalizes_only_expired_sittings() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .time_limit(Some(Duration::seconds(60)))
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;
    let other = Actor::learner(LearnerId::new(12));
    services_at(&storage, 0)
        .catalog()
        .enroll(other.id, COURSE)
        .await
        .unwrap();

    let early = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap();
    services_at(&storage, 30)
        .admission()
        .admit(other, QUIZ)
        .await
        .unwrap();

    let report = services_at(&storage, 70).sweeper().sweep().await.unwrap();
    assert_eq!(report.finalized.len(), 1);
    assert_eq!(report.finalized[0].result.sitting_id, early.sitting_id);
    assert!(report.finalized[0].result.forced);
    assert_eq!(report.still_running, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn sweep_keeps_expired_staff_previews() {
    let storage = Storage::in_memory();
    seed(
        &storage,
        policy()
            .time_limit(Some(Duration::seconds(60)))
            .build()
            .unwrap(),
        vec![true_false(1, true)],
    )
    .await;

    let preview = services_at(&storage, 0)
        .admission()
        .admit(staff(), QUIZ)
        .await
        .unwrap();
    let attempt = services_at(&storage, 0)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap();

    let report = services_at(&storage, 70).sweeper().sweep().await.unwrap();
    assert_eq!(report.finalized.len(), 2);
    for outcome in &report.finalized {
        let staff_owned = outcome.result.sitting_id == preview.sitting_id;
        assert_eq!(outcome.result.retained, staff_owned);
    }

    let kept = storage.sittings.get_sitting(preview.sitting_id).await.unwrap();
    assert!(kept.is_complete());
    assert!(kept.is_staff_preview());
    assert!(matches!(
        storage.sittings.get_sitting(attempt.sitting_id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn question_edits_wait_for_open_sittings() {
    let storage = Storage::in_memory();
    seed(&storage, policy().build().unwrap(), vec![true_false(1, true)]).await;
    let services = services_at(&storage, 0);
    services.admission().admit(learner(), QUIZ).await.unwrap();

    let err = services
        .catalog()
        .save_question(&true_false(1, false))
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::Forbidden));
}
