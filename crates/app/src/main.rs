//! `quiz`: command-line front end for the quiz attempt engine.

use std::process;

use clap::{ArgAction, Parser, Subcommand};
use quiz_core::model::{CourseId, LearnerId, QuestionId, QuizId, SittingId};
use services::{Actor, Clock, QuizServices};

mod commands;
mod config;

use config::GlobalOptions;

#[derive(Parser)]
#[command(name = "quiz", version, about = "Timed, attempt-limited quizzes")]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Load a demo course with a practice quiz and an exam paper
    Seed,

    /// List the quizzes of a course as a learner sees them
    Quizzes {
        #[arg(long)]
        learner: LearnerId,

        #[arg(long, default_value = "1")]
        course: CourseId,
    },

    /// Start or resume an attempt and answer questions from stdin
    Take {
        #[arg(long)]
        learner: LearnerId,

        #[arg(long)]
        quiz: QuizId,

        /// Preview as staff: skips enrollment and availability checks
        #[arg(long)]
        staff: bool,
    },

    /// Show a learner's completed attempts and, when visible, the answers
    Review {
        #[arg(long)]
        learner: LearnerId,

        #[arg(long)]
        quiz: QuizId,
    },

    /// Completed attempts of a learner in a course, most recent first
    History {
        #[arg(long)]
        learner: LearnerId,

        #[arg(long, default_value = "1")]
        course: CourseId,
    },

    /// Best attempt per learner for a quiz
    Results {
        #[arg(long)]
        quiz: QuizId,
    },

    /// Category scores and exam-paper attempts of a learner
    Progress {
        #[arg(long)]
        learner: LearnerId,
    },

    /// List retained sittings of a quiz awaiting marking
    Marking {
        #[arg(long)]
        quiz: QuizId,

        #[arg(long)]
        learner: Option<LearnerId>,
    },

    /// Mark one answer of a retained sitting
    Mark {
        #[arg(long)]
        sitting: SittingId,

        #[arg(long)]
        question: QuestionId,

        #[arg(long, action = ArgAction::Set)]
        correct: bool,
    },

    /// Finalize every sitting whose time limit has elapsed
    Sweep,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_tracing(&cli.global.log);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_url = cli.global.database_url();
    config::prepare_sqlite_file(&db_url)?;

    if matches!(cli.command, Commands::Migrate) {
        return commands::migrate(&db_url).await;
    }

    let services = QuizServices::new_sqlite(&db_url, Clock::system()).await?;
    match cli.command {
        Commands::Migrate => Ok(()),
        Commands::Seed => commands::seed::execute(&services).await,
        Commands::Quizzes { learner, course } => {
            commands::reports::quizzes(&services, Actor::learner(learner), course).await
        }
        Commands::Take {
            learner,
            quiz,
            staff,
        } => {
            let actor = if staff {
                Actor::staff(learner)
            } else {
                Actor::learner(learner)
            };
            commands::take::execute(&services, actor, quiz).await
        }
        Commands::Review { learner, quiz } => {
            commands::reports::review(&services, Actor::learner(learner), quiz).await
        }
        Commands::History { learner, course } => {
            commands::reports::history(&services, learner, course).await
        }
        Commands::Results { quiz } => commands::reports::results(&services, quiz).await,
        Commands::Progress { learner } => commands::reports::progress(&services, learner).await,
        Commands::Marking { quiz, learner } => {
            commands::marking::list(&services, quiz, learner).await
        }
        Commands::Mark {
            sitting,
            question,
            correct,
        } => commands::marking::mark(&services, sitting, question, correct).await,
        Commands::Sweep => commands::marking::sweep(&services).await,
    }
}
