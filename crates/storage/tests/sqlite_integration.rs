use chrono::Duration;
use quiz_core::model::{
    CategoryId, Choice, ChoiceId, CourseId, LearnerId, OrderingMode, ProgressDelta, Question,
    QuestionBank, QuestionId, QuestionKind, QuizId, QuizPolicy, RawAnswer, RevealMode, Sitting,
};
use quiz_core::time::fixed_now;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{
    Admission, AttemptRecordRepository, Completion, CompletionOutcome, EnrollmentRepository,
    ProgressRepository, QuizCatalog, SittingRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

fn policy(ceiling: u32) -> QuizPolicy {
    QuizPolicy::builder(QuizId::new(1), CourseId::new(10), "Capitals")
        .ordering(OrderingMode::Random)
        .reveal(RevealMode::AtEnd)
        .attempt_ceiling(ceiling)
        .pass_mark(60)
        .time_limit(Some(Duration::minutes(5)))
        .available_from(Some(fixed_now() - Duration::days(1)))
        .build()
        .unwrap()
}

fn questions() -> Vec<Question> {
    vec![
        Question::new(
            QuestionId::new(1),
            QuizId::new(1),
            "Capital of France?",
            "Paris has been the capital since 987.",
            QuestionKind::MultipleChoice {
                choices: vec![Choice::new("A", "Lyon"), Choice::new("B", "Paris")],
                correct: ChoiceId::new("B"),
            },
        )
        .unwrap()
        .with_category(CategoryId::new(3)),
        Question::new(
            QuestionId::new(2),
            QuizId::new(1),
            "Capital of Italy is ____",
            "",
            QuestionKind::FillInBlank {
                expected: "Rome".into(),
                case_sensitive: false,
            },
        )
        .unwrap()
        .with_category(CategoryId::new(3)),
        Question::new(QuestionId::new(3), QuizId::new(1), "Describe Berlin.", "", QuestionKind::Essay)
            .unwrap(),
    ]
}

fn candidate(learner: u64, seed: u64) -> Sitting {
    let mut rng = StdRng::seed_from_u64(seed);
    Sitting::start(
        LearnerId::new(learner),
        QuizId::new(1),
        CourseId::new(10),
        0,
        vec![QuestionId::new(1), QuestionId::new(2), QuestionId::new(3)],
        OrderingMode::Random,
        &mut rng,
        fixed_now(),
    )
    .unwrap()
}

async fn seeded(url: &str, ceiling: u32) -> SqliteRepository {
    let repo = SqliteRepository::connect(url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo.upsert_policy(&policy(ceiling)).await.unwrap();
    for q in questions() {
        repo.upsert_question(&q).await.unwrap();
    }
    repo
}

fn answer_for(id: QuestionId) -> RawAnswer {
    match id.value() {
        1 => RawAnswer::Choice(ChoiceId::new("B")),
        2 => RawAnswer::Text(" rome ".into()),
        _ => RawAnswer::Text("A city.".into()),
    }
}

#[tokio::test]
async fn sqlite_roundtrips_catalog_and_enrollment() {
    let repo = seeded("sqlite:file:memdb_catalog?mode=memory&cache=shared", 1).await;

    let stored = repo.get_policy(QuizId::new(1)).await.unwrap();
    assert_eq!(stored, policy(1));
    assert_eq!(repo.list_policies(CourseId::new(10)).await.unwrap().len(), 1);
    assert_eq!(repo.list_questions(QuizId::new(1)).await.unwrap(), questions());
    assert!(matches!(
        repo.get_policy(QuizId::new(2)).await,
        Err(StorageError::NotFound)
    ));

    repo.enroll(LearnerId::new(7), CourseId::new(10)).await.unwrap();
    repo.enroll(LearnerId::new(7), CourseId::new(10)).await.unwrap();
    assert!(repo.is_enrolled(LearnerId::new(7), CourseId::new(10)).await.unwrap());
    assert!(!repo.is_enrolled(LearnerId::new(8), CourseId::new(10)).await.unwrap());
    assert_eq!(
        repo.list_learners(CourseId::new(10)).await.unwrap(),
        vec![LearnerId::new(7)]
    );
}

#[tokio::test]
async fn sqlite_sitting_lifecycle_records_result_and_progress() {
    let repo = seeded("sqlite:file:memdb_lifecycle?mode=memory&cache=shared", 2).await;
    let policy = policy(2);
    let bank = QuestionBank::new(repo.list_questions(QuizId::new(1)).await.unwrap());

    let Admission::Created(created) = repo.admit(candidate(7, 1), 2).await.unwrap() else {
        panic!("expected a new sitting");
    };
    assert_eq!(created.attempt_number(), 1);
    assert!(matches!(
        repo.upsert_question(&questions()[0]).await,
        Err(StorageError::Conflict)
    ));

    let mut sitting = repo.get_sitting(created.id()).await.unwrap();
    assert_eq!(sitting, created);
    while let Some(id) = sitting.current_question_id() {
        let revision = sitting.revision();
        sitting
            .submit_answer(&policy, &bank, id, answer_for(id), fixed_now())
            .unwrap();
        repo.save_progress(&sitting, revision).await.unwrap();
    }
    assert!(matches!(
        repo.save_progress(&sitting, 0).await,
        Err(StorageError::Conflict)
    ));

    let reloaded = repo
        .find_active(LearnerId::new(7), QuizId::new(1), CourseId::new(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded, sitting);

    let revision = sitting.revision();
    let result = sitting
        .finalize(&policy, &bank, fixed_now() + Duration::minutes(1), true)
        .unwrap();
    assert_eq!(result.score_percent, 100);
    let delta = ProgressDelta::from_sitting(&sitting, &bank);
    let completion = Completion {
        sitting: &sitting,
        expected_revision: revision,
        result: &result,
        progress: &delta,
        discard_sitting: false,
    };
    let first = repo.commit_completion(completion).await.unwrap();
    assert_eq!(first, CompletionOutcome::Recorded(result.clone()));
    let second = repo.commit_completion(completion).await.unwrap();
    assert_eq!(second, CompletionOutcome::AlreadyRecorded(result.clone()));

    assert_eq!(repo.get_record(sitting.id()).await.unwrap(), Some(result));
    assert_eq!(
        repo.count_attempts(LearnerId::new(7), QuizId::new(1), CourseId::new(10))
            .await
            .unwrap(),
        1
    );
    assert_eq!(repo.list_completed(QuizId::new(1)).await.unwrap().len(), 1);
    assert!(repo.list_active().await.unwrap().is_empty());

    let progress = repo.get_progress(LearnerId::new(7)).await.unwrap();
    let science = progress.category(CategoryId::new(3));
    assert_eq!((science.correct, science.total), (2, 2));
}

#[tokio::test]
async fn sqlite_discarded_sitting_still_counts_against_ceiling() {
    let repo = seeded("sqlite:file:memdb_discard?mode=memory&cache=shared", 1).await;
    let policy = policy(1);
    let bank = QuestionBank::new(repo.list_questions(QuizId::new(1)).await.unwrap());

    let Admission::Created(mut sitting) = repo.admit(candidate(9, 4), 1).await.unwrap() else {
        panic!("expected a new sitting");
    };
    let revision = sitting.revision();
    let result = sitting
        .finalize(&policy, &bank, fixed_now() + Duration::minutes(6), false)
        .unwrap();
    assert!(result.forced);
    repo.commit_completion(Completion {
        sitting: &sitting,
        expected_revision: revision,
        result: &result,
        progress: &ProgressDelta::default(),
        discard_sitting: true,
    })
    .await
    .unwrap();

    assert!(matches!(
        repo.get_sitting(sitting.id()).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(
        repo.admit(candidate(9, 5), 1).await.unwrap(),
        Admission::Exhausted { used: 1 }
    );
    assert_eq!(
        repo.list_for_learner(LearnerId::new(9), QuizId::new(1))
            .await
            .unwrap(),
        vec![result]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_admissions_create_a_single_sitting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("quiz.sqlite3").display());
    let repo = seeded(&url, 1).await;

    let mut handles = Vec::new();
    for seed in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move { repo.admit(candidate(3, seed), 1).await }));
    }

    let mut created = 0;
    let mut resumed = 0;
    for handle in handles {
        match handle.await.expect("join").expect("admit") {
            Admission::Created(_) => created += 1,
            Admission::Resumed(_) => resumed += 1,
            Admission::Exhausted { .. } => panic!("ceiling not reached yet"),
        }
    }
    assert_eq!((created, resumed), (1, 7));
    assert_eq!(repo.list_active().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_question_cannot_move_out_of_a_quiz_in_progress() {
    let repo = seeded("sqlite:file:memdb_move?mode=memory&cache=shared", 1).await;
    let other = QuizPolicy::builder(QuizId::new(2), CourseId::new(10), "Rivers")
        .build()
        .unwrap();
    repo.upsert_policy(&other).await.unwrap();
    repo.admit(candidate(7, 1), 1).await.unwrap();

    let moved = Question::new(QuestionId::new(1), QuizId::new(2), "Longest river?", "", QuestionKind::Essay)
        .unwrap();
    assert!(matches!(
        repo.upsert_question(&moved).await,
        Err(StorageError::Conflict)
    ));
    assert_eq!(repo.list_questions(QuizId::new(1)).await.unwrap(), questions());
    assert!(repo.list_questions(QuizId::new(2)).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_cancelled_admissions_leave_the_pool_usable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("quiz.sqlite3").display());
    let repo = seeded(&url, 1).await;

    for (seed, micros) in (0..200u64).zip((1..=50u64).cycle()) {
        let _ = tokio::time::timeout(
            std::time::Duration::from_micros(micros),
            repo.admit(candidate(5, seed), 1),
        )
        .await;
    }

    for seed in 200..210 {
        let admitted = repo.admit(candidate(5, seed), 1).await.expect("admit after cancellations");
        assert!(!matches!(admitted, Admission::Exhausted { .. }));
    }
    assert_eq!(repo.list_active().await.unwrap().len(), 1);
    repo.upsert_question(&questions()[0]).await.expect_err("sitting still open");
}

#[tokio::test]
async fn sqlite_staff_preview_flag_survives_reload() {
    let repo = seeded("sqlite:file:memdb_preview?mode=memory&cache=shared", 1).await;
    let Admission::Created(created) = repo
        .admit(candidate(99, 2).with_staff_preview(true), 1)
        .await
        .unwrap()
    else {
        panic!("expected a new sitting");
    };

    let reloaded = repo.get_sitting(created.id()).await.unwrap();
    assert!(reloaded.is_staff_preview());
    assert_eq!(reloaded, created);
}
