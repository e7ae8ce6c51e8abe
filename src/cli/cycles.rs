//! One-shot cycles: reflect, evaluate, research, compress, automate.

use anyhow::Result;

use super::{preview, spinner};
use crate::brain::Brain;
use crate::config::PonderConfig;
use crate::scheduler::CancellationToken;
use crate::stages::CompressOutcome;
use crate::workflow::WorkflowError;

pub fn reflect(config: PonderConfig) -> Result<()> {
    let brain = Brain::open(config)?;
    let pb = spinner("Reflecting");
    let outcome = brain.reflect_cycle();
    pb.finish_and_clear();
    let outcome = outcome?;

    println!("Reflection for {}", outcome.date);
    println!("  File:            {}", outcome.path.display());
    match &outcome.revisited_question {
        Some(q) => println!("  Revisited:       {q}"),
        None => println!("  Revisited:       (no open questions)"),
    }
    println!(
        "  New questions:   {} ({} added to queue)",
        outcome.new_questions.len(),
        outcome.questions_added
    );
    for q in &outcome.new_questions {
        println!("    - {q}");
    }
    Ok(())
}

pub fn evaluate(config: PonderConfig, days: Option<usize>) -> Result<()> {
    let days = days.unwrap_or(config.workflow.evaluate_days);
    let brain = Brain::open(config)?;
    let pb = spinner("Evaluating reflections");
    let report = brain.evaluate_cycle(days);
    pb.finish_and_clear();
    let report = report?;

    println!(
        "Evaluated {} reflection(s), {} malformed response(s) skipped.",
        report.evaluated, report.malformed
    );
    println!("Scores: {}", brain.scores().path().display());
    Ok(())
}

pub fn research(config: PonderConfig, max_questions: Option<usize>) -> Result<()> {
    let max = max_questions.unwrap_or(config.workflow.research_max_questions);
    let brain = Brain::open(config)?;
    let pb = spinner("Researching open questions");
    let report = brain.research_cycle(max, &CancellationToken::new());
    pb.finish_and_clear();
    let report = report?;

    if report.answered.is_empty() && report.skipped.is_empty() {
        println!("No open questions to research.");
        return Ok(());
    }
    println!("Researched {} question(s):", report.answered.len());
    for q in &report.answered {
        println!("  + {q}");
    }
    for q in &report.skipped {
        println!("  ! {q} (no answer, left open)");
    }
    println!("Follow-up questions queued: {}", report.follow_ups_added);
    Ok(())
}

pub fn compress(config: PonderConfig, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(config.workflow.compress_after_days);
    let brain = Brain::open(config)?;
    let pb = spinner("Compressing old reflections");
    let outcome = brain.compress_cycle(days);
    pb.finish_and_clear();

    match outcome? {
        CompressOutcome::NoOp => println!("No reflections older than {days} days to compress."),
        CompressOutcome::Compressed { summary, path, .. } => {
            println!(
                "Compressed {} reflection(s) into {}",
                summary.source_refs.len(),
                path.display()
            );
            for id in &summary.source_refs {
                println!("  archived {id}");
            }
        }
    }
    Ok(())
}

pub fn automate(config: PonderConfig) -> Result<()> {
    let brain = Brain::open(config)?;
    let pb = spinner("Running automation loop");
    let result = brain.automation_cycle(&CancellationToken::new());
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(WorkflowError::Cancelled { .. }) => {
            println!("Automation loop cancelled.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let stages: Vec<_> = report.stages.iter().map(|s| s.as_str()).collect();
    println!("Automation loop complete: {}", stages.join(" -> "));
    if let Some(score) = report.score {
        println!("  Today's quality:   {score:.2}");
    }
    match report.average {
        Some(avg) => println!("  Recent average:    {avg:.2}"),
        None => println!("  Recent average:    (no score history)"),
    }
    if let Some(research) = &report.research {
        println!("  Researched:        {}", research.answered.len());
    }
    match &report.compression {
        Some(CompressOutcome::Compressed { summary, .. }) => {
            println!("  Compressed:        {} reflection(s)", summary.source_refs.len());
            println!("  Summary:           {}", preview(&summary.summary_text, 100));
        }
        _ => println!("  Compressed:        nothing"),
    }
    Ok(())
}
