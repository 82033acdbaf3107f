mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "examforge", about = "Ask questions about a PDF and generate exams from it", version)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question about a PDF
    Ask {
        /// PDF to read
        pdf: PathBuf,
        /// The question
        question: String,
    },

    /// Generate an exam from a PDF and write it as a PDF document
    Exam {
        /// PDF to read
        pdf: PathBuf,
        /// Output PDF path
        #[arg(long, default_value = "exam.pdf")]
        out: PathBuf,
        /// Also write a Markdown copy
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// Interactive question loop over one PDF (empty line or `exit` quits)
    Chat {
        /// PDF to read
        pdf: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let app = app::App::new(cli.config.as_deref())?;

    match cli.command {
        Command::Ask { pdf, question } => commands::ask(&app, &pdf, &question)?,
        Command::Exam { pdf, out, markdown } => {
            commands::exam(&app, &pdf, &out, markdown.as_deref())?
        }
        Command::Chat { pdf } => commands::chat(&app, &pdf)?,
    }

    Ok(())
}
