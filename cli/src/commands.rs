use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use ef_ai::exam::{BatchOutcome, BatchProgress};
use ef_ai::retrieve::RagAnswer;
use ef_core::report::{render_exam_markdown, write_exam_pdf};

use crate::app::App;

pub fn ask(app: &App, pdf: &Path, question: &str) -> Result<()> {
    let mut session = app.open(pdf)?;
    let answer = session.ask(question, &app.config, &app.embedder, &app.llm)?;
    print_answer(&answer);
    Ok(())
}

pub fn exam(app: &App, pdf: &Path, out: &Path, markdown: Option<&Path>) -> Result<()> {
    let mut session = app.open(pdf)?;
    let generated = session.generate_exam_with_progress(&app.config, &app.llm, &print_progress)?;

    for w in &generated.warnings {
        eprintln!(
            "warning: batch {} (pages {} to {}) skipped: [{}] {}",
            w.batch_number, w.first_page, w.last_page, w.code, w.message
        );
    }

    write_exam_pdf(out, &generated.exam)?;
    println!(
        "Wrote {} questions ({} MCQ, {} short answer, {} essay) to {}",
        generated.exam.question_count(),
        generated.exam.mcqs.len(),
        generated.exam.short_answers.len(),
        generated.exam.essays.len(),
        out.display()
    );

    if let Some(md) = markdown {
        fs::write(md, render_exam_markdown(&generated.exam))
            .with_context(|| format!("Failed to write {}", md.display()))?;
        println!("Wrote Markdown copy to {}", md.display());
    }
    Ok(())
}

pub fn chat(app: &App, pdf: &Path) -> Result<()> {
    let mut session = app.open(pdf)?;
    println!(
        "Loaded {} pages. Ask a question (empty line or `exit` to quit).",
        session.pages().len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let q = line.trim();
        if q.is_empty() || q.eq_ignore_ascii_case("exit") {
            break;
        }
        // A failed turn is reported and the loop continues; the user may simply ask again.
        match session.ask(q, &app.config, &app.embedder, &app.llm) {
            Ok(answer) => print_answer(&answer),
            Err(e) if e.retryable => eprintln!("error: {e} (you can try again)"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    println!("{} questions asked.", session.history().len());
    Ok(())
}

fn print_answer(answer: &RagAnswer) {
    println!("{}", answer.answer_text.trim());
    let pages: Vec<String> = answer
        .cited_chunks
        .iter()
        .map(|c| c.chunk.source_page.to_string())
        .collect();
    if !pages.is_empty() {
        println!("\n(sources: pages {})", pages.join(", "));
    }
}

fn print_progress(p: &BatchProgress) {
    match &p.outcome {
        BatchOutcome::Started => eprintln!(
            "Processing batch {} of {} (pages {} to {})...",
            p.batch_number, p.batch_count, p.first_page, p.last_page
        ),
        BatchOutcome::Parsed { questions } => {
            eprintln!("  batch {}: {questions} questions", p.batch_number)
        }
        BatchOutcome::Skipped { code } => eprintln!("  batch {}: skipped ({code})", p.batch_number),
    }
}
