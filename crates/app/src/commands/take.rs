use anyhow::bail;
use quiz_core::model::{Feedback, QuizId, SittingResult};
use services::{Actor, AnswerFormat, QuestionView, QuizError, QuizServices};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{format_duration, log_events, print_result};

/// Interactive attempt: one question per prompt, answers read from stdin.
///
/// Closing stdin leaves the sitting open; running the command again resumes it.
pub async fn execute(services: &QuizServices, actor: Actor, quiz_id: QuizId) -> anyhow::Result<()> {
    let handle = services.admission().admit(actor, quiz_id).await?;
    if handle.resumed {
        println!(
            "Resuming attempt {} ({} of {} answered)",
            handle.attempt_number, handle.progress.answered, handle.progress.total
        );
    } else {
        println!(
            "Attempt {}: {} question(s)",
            handle.attempt_number, handle.progress.total
        );
    }

    let bank = services.catalog().question_bank(quiz_id).await?;
    let attempts = services.attempts();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let view = match attempts.current_question(actor, handle.sitting_id).await {
            Ok(Some(view)) => view,
            Ok(None) => break,
            Err(QuizError::TimeExpired(result)) => {
                time_up(&result);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        print_question(&view);

        let Some(line) = lines.next_line().await? else {
            println!("\nInput closed; the attempt stays open and can be resumed.");
            return Ok(());
        };
        let Some(question) = bank.get(view.question_id) else {
            bail!("question {} is missing from quiz {quiz_id}", view.question_id);
        };
        let answer = match question.parse_answer(&line) {
            Ok(answer) => answer,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match attempts
            .submit_answer(actor, handle.sitting_id, view.question_id, answer)
            .await
        {
            Ok(outcome) => {
                if let Some(feedback) = &outcome.feedback {
                    print_feedback(feedback);
                }
            }
            Err(QuizError::TimeExpired(result)) => {
                time_up(&result);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let outcome = attempts.finalize(actor, handle.sitting_id).await?;
    log_events(&outcome.events);
    println!();
    print_result(&outcome.result);
    Ok(())
}

fn time_up(result: &SittingResult) {
    println!("\nTime is up; your answers were submitted.");
    print_result(result);
}

fn print_question(view: &QuestionView) {
    println!();
    match view.time_remaining.seconds() {
        Some(seconds) => println!(
            "[{}/{}] ({} left)",
            view.position,
            view.total,
            format_duration(chrono::Duration::seconds(seconds))
        ),
        None => println!("[{}/{}]", view.position, view.total),
    }
    println!("{}", view.prompt);
    match &view.format {
        AnswerFormat::Choice(choices) => {
            for choice in choices {
                println!("  {}) {}", choice.id, choice.text);
            }
        }
        AnswerFormat::TrueFalse => println!("  (true/false)"),
        AnswerFormat::Text => println!("  (type your answer)"),
        AnswerFormat::Essay => println!("  (free text, marked by staff)"),
    }
    print!("> ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn print_feedback(feedback: &Feedback) {
    if feedback.correctness.is_correct() {
        println!("Correct.");
    } else if !feedback.correctness.is_graded() {
        println!("Recorded for marking.");
    } else {
        match &feedback.correct_answer {
            Some(answer) => println!("Incorrect. Answer: {answer}"),
            None => println!("Incorrect."),
        }
    }
    if !feedback.explanation.is_empty() {
        println!("{}", feedback.explanation);
    }
}
