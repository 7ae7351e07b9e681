pub mod marking;
pub mod reports;
pub mod seed;
pub mod take;

use chrono::Duration;
use quiz_core::model::{LearnerId, SittingResult};
use services::{ActivityEvent, Actor};
use storage::sqlite::SqliteRepository;

/// Identity used for staff-only commands run from the terminal.
pub const OPERATOR: LearnerId = LearnerId::new(0);

pub fn operator() -> Actor {
    Actor::staff(OPERATOR)
}

pub async fn migrate(db_url: &str) -> anyhow::Result<()> {
    let repo = SqliteRepository::connect(db_url).await?;
    repo.migrate().await?;
    println!("Database ready at {db_url}");
    Ok(())
}

pub fn log_events(events: &[ActivityEvent]) {
    for event in events {
        match event {
            ActivityEvent::AttemptCompleted {
                sitting_id,
                learner_id,
                quiz_id,
                score_percent,
                passed,
            } => tracing::info!(
                %sitting_id,
                %learner_id,
                %quiz_id,
                score_percent,
                passed,
                "attempt completed"
            ),
            ActivityEvent::AutoSubmitted {
                sitting_id,
                learner_id,
                quiz_id,
            } => tracing::info!(%sitting_id, %learner_id, %quiz_id, "attempt auto-submitted"),
            ActivityEvent::SittingDiscarded { sitting_id } => {
                tracing::info!(%sitting_id, "sitting discarded");
            }
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}

pub fn print_result(result: &SittingResult) {
    let verdict = if result.passed { "passed" } else { "not passed" };
    println!(
        "Attempt {}: {}/{} correct, {}% ({verdict})",
        result.attempt_number, result.correct, result.graded_total, result.score_percent
    );
    if result.ungraded > 0 {
        println!("  {} answer(s) await marking", result.ungraded);
    }
    if result.forced {
        println!("  submitted automatically when time ran out");
    }
    for item in &result.breakdown {
        let mark = match item.correctness {
            Some(c) if c.is_correct() => "✓",
            Some(c) if !c.is_graded() => "?",
            Some(_) => "✗",
            None => "-",
        };
        let given = item
            .answer
            .as_ref()
            .map_or_else(|| "(no answer)".to_owned(), ToString::to_string);
        println!("  {mark} {}  you: {given}", item.prompt);
        if let Some(expected) = &item.correct_answer {
            println!("      answer: {expected}");
        }
    }
}
