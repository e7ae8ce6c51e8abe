//! Read-only views: insights, topics, open questions, score metrics, run journal.

use anyhow::Result;

use super::preview;
use crate::artifacts::ScoreSummary;
use crate::brain::Brain;
use crate::config::PonderConfig;
use crate::workflow::decide;

pub fn insights(config: PonderConfig, topic: &str, full: bool) -> Result<()> {
    let brain = Brain::open_offline(config)?;
    let rows = brain.insights().query_by_topic(topic)?;

    if rows.is_empty() {
        println!("No insights found on topic '{topic}'.");
        return Ok(());
    }

    println!("Insights about '{topic}' ({}):\n", rows.len());
    for insight in &rows {
        println!(
            "[{}] {} ({})",
            insight.timestamp.format("%Y-%m-%d %H:%M"),
            insight.question,
            insight.topic
        );
        if full {
            println!("{}", insight.answer.trim());
        } else {
            println!("  {}", preview(&insight.answer, 160));
        }
        if !insight.tags.is_empty() {
            println!("  Tags: {}", insight.tags.join(", "));
        }
        println!();
    }
    Ok(())
}

pub fn topics(config: PonderConfig) -> Result<()> {
    let brain = Brain::open_offline(config)?;
    let topics = brain.insights().list_topics()?;
    if topics.is_empty() {
        println!("No insights recorded yet.");
        return Ok(());
    }
    println!("Topics ({}):", topics.len());
    for topic in &topics {
        println!("  {topic}");
    }
    Ok(())
}

pub fn questions(config: PonderConfig, add: &[String]) -> Result<()> {
    let brain = Brain::open_offline(config)?;
    if !add.is_empty() {
        let added = brain.questions().append(add)?;
        println!("Added {added} question(s) ({} already pending).", add.len() - added);
    }

    let open = brain.questions().load_open()?;
    if open.is_empty() {
        println!("No open questions.");
        return Ok(());
    }
    println!("Open questions ({}):", open.len());
    for (i, q) in open.iter().enumerate() {
        println!("  {:>3}. {q}", i + 1);
    }
    Ok(())
}

pub fn metrics(config: PonderConfig) -> Result<()> {
    let window = config.workflow.score_window;
    let threshold = config.workflow.quality_threshold;
    let brain = Brain::open_offline(config)?;

    let Some(all) = brain.score_summary(None)? else {
        println!("No self-evaluation data yet.");
        return Ok(());
    };

    println!("Average Scores ({} reflection(s))", all.count);
    println!("{}", "=".repeat(40));
    println!("  Clarity:         {:.2}", all.clarity);
    println!("  Novelty:         {:.2}", all.novelty);
    println!("  Actionability:   {:.2}", all.actionability);
    println!("  Redundancy:      {:.2}  (lower is better)", all.redundancy);
    println!("  Quality:         {:.2}", all.quality);
    println!();

    if let Some(recent) = brain.score_summary(Some(window))? {
        println!("{}", routing_line(&recent, threshold));
    }
    Ok(())
}

/// The DecideNext outcome for the recent window, as the workflow would route it.
fn routing_line(recent: &ScoreSummary, threshold: f64) -> String {
    format!(
        "Last {} score(s):   quality {:.2} vs threshold {:.1} -> next loop will {}",
        recent.count,
        recent.quality,
        threshold,
        decide(Some(recent.quality), threshold).as_str()
    )
}

pub fn runs(config: PonderConfig, limit: usize) -> Result<()> {
    let brain = Brain::open_offline(config)?;
    let runs = brain.journal().recent(limit)?;
    if runs.is_empty() {
        println!("No automation runs recorded.");
        return Ok(());
    }

    println!("{:<25} {:<10} {:<12} {:<9} error", "started", "status", "last stage", "route");
    for run in &runs {
        println!(
            "{:<25} {:<10} {:<12} {:<9} {}",
            run.started_at,
            run.status.as_str(),
            run.last_stage.map(|s| s.as_str()).unwrap_or("-"),
            run.route.as_deref().unwrap_or("-"),
            run.error.as_deref().map(|e| preview(e, 60)).unwrap_or_default()
        );
    }
    Ok(())
}
