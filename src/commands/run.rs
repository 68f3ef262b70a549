use anyhow::{Context, Result};
use mailtally::{
    config::Config,
    import::{discover_archives, ImportCoordinator},
};
use tracing::info;

pub fn run_corpus(config: Config, quiet: bool) -> Result<()> {
    let pipeline = config.pipeline;

    info!("Look for zipped emails in \"{}\"", pipeline.email_root.display());
    let archives = discover_archives(&pipeline.email_root, &pipeline.archive_suffix)
        .with_context(|| format!("Failed to list archives in {}", pipeline.email_root.display()))?;
    info!("App got {} files", archives.len());

    let mut coordinator = ImportCoordinator::new(pipeline).with_quiet(quiet);
    let state = coordinator.run(&archives).context("Corpus run failed")?;

    let stats = coordinator.stats();
    info!(
        "Run complete: {} archives processed, {} skipped, {} failed, {} malformed manifests, {} unreadable messages in {:.1}s",
        stats.archives_processed,
        stats.archives_skipped,
        stats.archives_failed,
        stats.manifests_failed,
        stats.messages_failed,
        stats.elapsed_seconds
    );

    if !quiet {
        println!("\nRun Complete!");
        println!("=============");
        println!("Files counted:  {}", state.files_count);
        println!("Total words:    {}", state.reported_words());
        println!("Average words:  {:.2}", state.average());
        println!("Recipients:     {}", state.top_emails.len());
    }

    Ok(())
}
