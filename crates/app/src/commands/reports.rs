use quiz_core::model::{CourseId, LearnerId, QuizId};
use services::{Actor, QuizServices};

use super::{format_duration, operator, print_result};

pub async fn quizzes(services: &QuizServices, actor: Actor, course: CourseId) -> anyhow::Result<()> {
    let listing = services.reports().quiz_listing(actor, course).await?;
    if listing.is_empty() {
        println!("No quizzes in course {course}");
    }
    for quiz in listing {
        let kind = if quiz.exam_paper { "exam" } else { "quiz" };
        let best = quiz
            .best
            .as_ref()
            .map_or_else(|| "-".to_owned(), |b| format!("{}%", b.score_percent));
        println!(
            "#{} {} [{kind}, {}] attempts {}/{} best {best}",
            quiz.quiz_id,
            quiz.title,
            quiz.status.as_str(),
            quiz.attempts_used,
            quiz.attempts_used + quiz.attempts_left,
        );
        if let Some(wait) = quiz.time_until_available {
            println!("    opens in {}", format_duration(wait));
        }
        if let Some(left) = quiz.time_until_expires {
            println!("    closes in {}", format_duration(left));
        }
    }
    Ok(())
}

pub async fn review(services: &QuizServices, actor: Actor, quiz: QuizId) -> anyhow::Result<()> {
    let view = services.review().review(actor, quiz).await?;
    println!("{} [{}]", view.title, view.status.as_str());
    for attempt in &view.attempts {
        print_result(attempt);
    }
    match view.answers {
        Some(items) => {
            println!("Answers:");
            for item in items {
                let expected = item.correct_answer.as_deref().unwrap_or("(marked by staff)");
                println!("  {}  answer: {expected}", item.prompt);
                if !item.explanation.is_empty() {
                    println!("      {}", item.explanation);
                }
            }
        }
        None if !view.show_answers => println!("Answers are not visible yet."),
        None => {}
    }
    Ok(())
}

pub async fn history(
    services: &QuizServices,
    learner: LearnerId,
    course: CourseId,
) -> anyhow::Result<()> {
    let history = services
        .reports()
        .attempt_history(Actor::learner(learner), learner, course)
        .await?;
    if history.is_empty() {
        println!("No completed attempts");
    }
    for result in history {
        println!(
            "{}  quiz {} attempt {}: {}%{}",
            result.completed_at.format("%Y-%m-%d %H:%M"),
            result.quiz_id,
            result.attempt_number,
            result.score_percent,
            if result.passed { " (passed)" } else { "" }
        );
    }
    Ok(())
}

pub async fn results(services: &QuizServices, quiz: QuizId) -> anyhow::Result<()> {
    let results = services.reports().quiz_results(operator(), quiz).await?;
    println!(
        "{}: {} of {} learner(s) passed (pass mark {}%)",
        results.title,
        results.passed_learners(),
        results.total_learners(),
        results.pass_mark
    );
    for learner in &results.learners {
        println!(
            "  learner {}: best {}% over {} attempt(s){}",
            learner.learner_id,
            learner.best.score_percent,
            learner.attempts,
            if learner.passed() { ", passed" } else { "" }
        );
    }
    Ok(())
}

pub async fn progress(services: &QuizServices, learner: LearnerId) -> anyhow::Result<()> {
    let report = services.reports().progress(operator(), learner).await?;
    println!("Progress of learner {learner}");
    let mut any = false;
    for (category, score) in report.progress.categories() {
        any = true;
        println!(
            "  category {category}: {}/{} ({}%)",
            score.correct,
            score.total,
            score.percent()
        );
    }
    if !any {
        println!("  no category scores yet");
    }
    for exam in &report.exam_attempts {
        println!(
            "  exam quiz {} attempt {}: {}%",
            exam.quiz_id, exam.attempt_number, exam.score_percent
        );
    }
    Ok(())
}
