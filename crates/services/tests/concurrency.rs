use std::collections::HashSet;

use quiz_core::model::{
    CourseId, LearnerId, Question, QuestionId, QuestionKind, QuizId, QuizPolicy, RawAnswer,
};
use quiz_core::time::fixed_now;
use services::{Actor, Clock, QuizError, QuizServices};
use storage::repository::Storage;

const COURSE: CourseId = CourseId::new(3);
const QUIZ: QuizId = QuizId::new(30);

fn learner() -> Actor {
    Actor::learner(LearnerId::new(1))
}

async fn seeded_storage(ceiling: u32) -> Storage {
    let storage = Storage::in_memory();
    let services = QuizServices::from_storage(&storage, Clock::fixed(fixed_now()), None);
    let catalog = services.catalog();
    catalog
        .publish_policy(
            &QuizPolicy::builder(QUIZ, COURSE, "Race")
                .attempt_ceiling(ceiling)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    for id in 1..=2 {
        let question = Question::new(
            QuestionId::new(id),
            QUIZ,
            format!("Claim {id}"),
            "",
            QuestionKind::TrueFalse { answer: true },
        )
        .unwrap();
        catalog.save_question(&question).await.unwrap();
    }
    catalog.enroll(learner().id, COURSE).await.unwrap();
    storage
}

/// Independent service stacks share storage but not in-process locks, so
/// only storage revisions keep them consistent.
fn stacks(storage: &Storage, count: usize) -> Vec<QuizServices> {
    (0..count)
        .map(|_| QuizServices::from_storage(storage, Clock::fixed(fixed_now()), None))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_share_one_sitting() {
    let storage = seeded_storage(2).await;

    let mut handles = Vec::new();
    for services in stacks(&storage, 8) {
        handles.push(tokio::spawn(async move {
            services.admission().admit(learner(), QUIZ).await
        }));
    }

    let mut ids = HashSet::new();
    let mut created = 0;
    for handle in handles {
        let admitted = handle.await.unwrap().unwrap();
        if !admitted.resumed {
            created += 1;
        }
        assert_eq!(admitted.attempt_number, 1);
        ids.insert(admitted.sitting_id);
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(created, 1);
    assert_eq!(storage.sittings.list_active().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_answers_record_exactly_one() {
    let storage = seeded_storage(1).await;
    let sitting_id = QuizServices::from_storage(&storage, Clock::fixed(fixed_now()), None)
        .admission()
        .admit(learner(), QUIZ)
        .await
        .unwrap()
        .sitting_id;

    let mut handles = Vec::new();
    for (i, services) in stacks(&storage, 6).into_iter().enumerate() {
        let answer = RawAnswer::Boolean(i % 2 == 0);
        handles.push(tokio::spawn(async move {
            services
                .attempts()
                .submit_answer(learner(), sitting_id, QuestionId::new(1), answer)
                .await
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) if !outcome.replayed => recorded += 1,
            Ok(_) => {}
            Err(QuizError::OutOfOrderAnswer { expected, submitted }) => {
                assert_eq!(expected, Some(QuestionId::new(2)));
                assert_eq!(submitted, QuestionId::new(1));
            }
            Err(QuizError::Contention) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(recorded, 1);

    let sitting = storage.sittings.get_sitting(sitting_id).await.unwrap();
    assert_eq!(sitting.progress().answered, 1);
    assert_eq!(sitting.current_question_id(), Some(QuestionId::new(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_finalize_emits_events_once() {
    let storage = seeded_storage(1).await;
    let services = QuizServices::from_storage(&storage, Clock::fixed(fixed_now()), None);
    let sitting_id = services.admission().admit(learner(), QUIZ).await.unwrap().sitting_id;
    for id in 1..=2 {
        services
            .attempts()
            .submit_answer(learner(), sitting_id, QuestionId::new(id), RawAnswer::Boolean(true))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for services in stacks(&storage, 5) {
        handles.push(tokio::spawn(async move {
            services.attempts().finalize(learner(), sitting_id).await
        }));
    }

    let mut first_time = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.result.score_percent, 100);
        if !outcome.is_repeat() {
            first_time += 1;
        }
    }
    assert_eq!(first_time, 1);
    assert_eq!(
        storage
            .attempts
            .count_attempts(learner().id, QUIZ, COURSE)
            .await
            .unwrap(),
        1
    );
}
