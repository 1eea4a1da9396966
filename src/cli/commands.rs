use crate::app::{AppContext, Result};
use crate::domain::ScrapeResult;

pub async fn scrape(ctx: &AppContext, url: &str, json: bool) -> Result<()> {
    let result = ctx.scraper.scrape(url).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    if result.success {
        println!();
        println!("{}", result.content);
    }
    Ok(())
}

pub async fn gather(
    ctx: &AppContext,
    conversation_id: &str,
    urls: &[String],
    context: bool,
) -> Result<()> {
    let report = ctx.gatherer.gather(conversation_id, urls).await;

    if context {
        let processed = ctx.processor.process(&report.documents());
        println!("{}", processed.content);
        return Ok(());
    }

    for result in &report.results {
        print_result(result);
    }
    for skipped in &report.skipped {
        eprintln!("  Skipped {}: {}", skipped.url, skipped.reason);
    }

    println!(
        "Gathered {} of {} URLs ({} skipped)",
        report.succeeded(),
        urls.len(),
        report.skipped.len()
    );
    Ok(())
}

pub async fn history(ctx: &AppContext, conversation_id: &str, limit: usize) -> Result<()> {
    let entries = ctx.cache.recent_chat(conversation_id, limit).await;

    if entries.is_empty() {
        println!("No history for {}", conversation_id);
        return Ok(());
    }

    for entry in entries {
        println!("[{}]", entry.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("  user: {}", entry.user_message);
        println!("  assistant: {}", entry.ai_response);
    }
    Ok(())
}

pub async fn purge(ctx: &AppContext) -> Result<()> {
    let removed = ctx.cache.purge_expired().await;
    println!("Removed {} expired cache entries", removed);
    Ok(())
}

fn print_result(result: &ScrapeResult) {
    if result.success {
        let words = result
            .content_stats
            .as_ref()
            .map(|s| s.word_count)
            .unwrap_or_default();
        println!(
            "✓ {} [{}] {} ({} words, {} ms)",
            result.url, result.scrape_method, result.title, words, result.metrics.total_ms
        );
    } else {
        println!(
            "✗ {} [{}] {}",
            result.url,
            result.scrape_method,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}
