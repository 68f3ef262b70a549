use anyhow::{Context, Result};
use mailtally::import::AggregateState;
use std::path::Path;

pub fn show_status(state_path: &Path, top: usize) -> Result<()> {
    if !state_path.exists() {
        anyhow::bail!(
            "Checkpoint file not found: {} (no run in progress)",
            state_path.display()
        );
    }

    let state = AggregateState::load(state_path).context("Failed to load checkpoint")?;

    println!("\nCheckpoint Status");
    println!("=================");
    println!("Checkpoint file:     {}", state_path.display());
    println!("Archives completed:  {}", state.completed_archives.len());
    if let Some(last) = state.completed_archives.last() {
        println!("Last archive:        {}", last);
    }
    println!("Files counted:       {}", state.files_count);
    println!("Total words:         {}", state.reported_words());
    println!("Average words:       {:.2}", state.average());
    println!("Recipients scored:   {}", state.top_emails.len());
    if let Some(saved_at) = state.saved_at {
        println!("Saved at:            {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if top > 0 && !state.top_sorted_emails.is_empty() {
        println!("\n{:40} Score", "Email");
        for (address, score) in state.top_sorted_emails.iter().take(top) {
            println!("{:40} {}", address, score);
        }
    }

    println!("\nTo resume, run:\n  mailtally run");

    Ok(())
}
