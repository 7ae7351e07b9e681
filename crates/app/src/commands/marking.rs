use quiz_core::model::{LearnerId, QuestionId, QuizId, SittingId};
use services::QuizServices;

use super::{log_events, operator};

pub async fn list(
    services: &QuizServices,
    quiz: QuizId,
    learner: Option<LearnerId>,
) -> anyhow::Result<()> {
    let entries = services.marking().list_marking(operator(), quiz, learner).await?;
    if entries.is_empty() {
        println!("Nothing retained for quiz {quiz}");
    }
    for entry in entries {
        println!(
            "{} learner {} attempt {}: {} correct, {} to mark, incorrect {:?}",
            entry.sitting_id,
            entry.learner_id,
            entry.attempt_number,
            entry.correct,
            entry.ungraded,
            entry.incorrect.iter().map(QuestionId::value).collect::<Vec<_>>()
        );
    }
    Ok(())
}

pub async fn mark(
    services: &QuizServices,
    sitting: SittingId,
    question: QuestionId,
    correct: bool,
) -> anyhow::Result<()> {
    let result = services
        .marking()
        .mark(operator(), sitting, question, correct)
        .await?;
    println!(
        "Sitting {sitting} now {}/{} ({}%), {} left to mark",
        result.correct, result.graded_total, result.score_percent, result.ungraded
    );
    Ok(())
}

pub async fn sweep(services: &QuizServices) -> anyhow::Result<()> {
    let report = services.sweeper().sweep().await?;
    for outcome in &report.finalized {
        log_events(&outcome.events);
    }
    for (sitting_id, err) in &report.failed {
        tracing::warn!(%sitting_id, error = %err, "sitting left open");
    }
    println!(
        "Finalized {} expired sitting(s); {} still running, {} failed",
        report.finalized.len(),
        report.still_running,
        report.failed.len()
    );
    Ok(())
}
