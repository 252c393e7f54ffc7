//! Search command - run one query through the full pipeline

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use mishkat_config::MishkatConfig;
use mishkat_core::{Hit, HitPayload};
use mishkat_engine::{RerankerChoice, SearchEngine};

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    query: String,

    /// Refine pipeline: LLM expansion + cross-corpus reranking
    #[arg(long, short = 'r')]
    refine: bool,

    /// Include the book corpus (off by default)
    #[arg(long, short = 'b')]
    books: bool,

    /// Maximum number of per-corpus results
    #[arg(long, short = 'n', default_value = "10")]
    limit: usize,

    /// Disable the reranker in refine mode
    #[arg(long)]
    no_rerank: bool,

    /// Narrow hadith search to these collection slugs
    #[arg(long)]
    collections: Vec<String>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, config: MishkatConfig) -> Result<()> {
    let engine = SearchEngine::connect(config)
        .await
        .context("failed to assemble the search engine")?;

    let mut request = engine.default_request(args.query.as_str());
    request.refine = args.refine;
    request.include_books = args.books;
    request.limit = args.limit;
    if args.no_rerank {
        request.reranker = RerankerChoice::None;
    }
    if !args.collections.is_empty() {
        request.hadith_collections = Some(args.collections.clone());
    }

    let response = engine.search(request).await.context("search failed")?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            print_section("Quran", &response.quran_hits);
            print_section("Hadith", &response.hadith_hits);
            print_section("Books", &response.book_hits);

            if !response.graph_context.entities.is_empty() {
                println!("Entities:");
                for entity in &response.graph_context.entities {
                    println!(
                        "  {} ({:?}) — {}",
                        entity.name_ar, entity.kind, entity.name_en
                    );
                }
                println!();
            }

            if let Some(ref expanded) = response.expanded_queries {
                println!("Expanded queries:");
                for eq in expanded {
                    println!("  - {}", eq.sub_query);
                }
                println!();
            }

            if response.degraded {
                println!(
                    "(degraded: {})",
                    response.debug_stats.degraded_features.join(", ")
                );
            }
            println!("{}ms total", response.debug_stats.total_ms);
        }
    }

    Ok(())
}

fn print_section(title: &str, hits: &[Hit]) {
    if hits.is_empty() {
        return;
    }
    println!("{title}:");
    for hit in hits {
        let rank = hit.rank.unwrap_or(0);
        match &hit.payload {
            HitPayload::Quran(p) => {
                println!(
                    "  {rank}. [{:.3}] {} {}:{} — {}",
                    hit.fused_score, p.surah_name_ar, p.surah_number, p.ayah_number, p.text_uthmani
                );
                if let Some(ref translation) = p.translation {
                    println!("       {translation}");
                }
            }
            HitPayload::Hadith(p) => {
                println!(
                    "  {rank}. [{:.3}] {} {} — {}",
                    hit.fused_score,
                    p.collection_slug,
                    p.hadith_number,
                    mishkat_core::truncate_chars(&p.text_ar, 120)
                );
            }
            HitPayload::Book(p) => {
                println!(
                    "  {rank}. [{:.3}] {} p.{} — {}",
                    hit.fused_score,
                    p.book_title_ar,
                    p.page_number,
                    mishkat_core::truncate_chars(&p.content_plain, 120)
                );
            }
        }
    }
    println!();
}
