use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matcher::config::{semantic_enabled, Config, MatchConfig};
use matcher::dedup::{deduplicate, DedupConfig};
use matcher::extraction::{
    load_seed_skills, EvictionPolicy, ExtractionStore, JsonlStore, SkillExtractionCache,
};
use matcher::matching::{EnrichmentConfig, SemanticEnricher, WeightTable, WeightedF1Scorer};
use matcher::models::PostingRecord;
use matcher::pipeline::{run_batch, BatchContext, CancelFlag, JsonlSink};
use matcher::profile::ProfileCache;
use matcher::ranking::{Ranker, RankingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));

    // Matching knobs are validated before any posting is touched
    let match_config = MatchConfig::from_env().context("Invalid matcher configuration")?;
    info!(
        "Config: threshold {}, fuzzy {}, jaccard {}, workers {}",
        match_config.similarity_threshold,
        match_config.title_fuzzy_min,
        match_config.jaccard_min,
        match_config.max_workers
    );
    let ranking_config = RankingConfig::from_env().context("Invalid ranking configuration")?;
    info!(
        "Ranking: shortlist >= {}, review >= {}",
        ranking_config.thresholds.shortlist, ranking_config.thresholds.review
    );

    let seed_skills = load_seed_skills(&config.seed_skills_path).with_context(|| {
        format!(
            "Failed to read seed skills from {}",
            config.seed_skills_path.display()
        )
    })?;
    info!("Loaded {} seed skills", seed_skills.len());

    // Resume profile (cached by content + seed fingerprint)
    let resume = tokio::fs::read_to_string(&config.resume_path)
        .await
        .with_context(|| format!("Failed to read resume {}", config.resume_path.display()))?;
    let profile_cache =
        ProfileCache::persistent(config.cache_dir.join("resume_profile_cache.json"));
    let profile = profile_cache
        .get_or_build(&resume, &seed_skills, config.rebuild_profile)
        .context("Failed to build resume profile")?;

    // Postings → dedupe
    let raw = tokio::fs::read_to_string(&config.postings_path)
        .await
        .with_context(|| format!("Failed to read postings {}", config.postings_path.display()))?;
    let postings: Vec<PostingRecord> =
        serde_json::from_str(&raw).context("Postings file is not a JSON array of postings")?;
    let dedupe = deduplicate(postings, &DedupConfig::from(&match_config));
    tokio::fs::write(
        &config.assignments_path,
        serde_json::to_vec_pretty(&dedupe.assignments)?,
    )
    .await
    .with_context(|| format!("Failed to write {}", config.assignments_path.display()))?;

    // Extraction cache
    let mut store = JsonlStore::open(config.cache_dir.join("skills_cache.jsonl"))?;
    if config.clear_skill_cache {
        store.clear()?;
        info!("Cleared skill extraction cache");
    }
    let extraction = Arc::new(SkillExtractionCache::new(seed_skills, Box::new(store)));

    // Semantic layer (env toggles resolved here)
    let enricher = semantic_enabled(&match_config, None)
        .then(|| SemanticEnricher::new(EnrichmentConfig::from(&match_config)));

    let stats_path = config.cache_dir.join("corpus_stats.json");
    let weights = Arc::new(WeightTable::load(&stats_path));

    let ctx = BatchContext {
        extraction: Arc::clone(&extraction),
        enricher,
        scorer: Arc::new(WeightedF1Scorer),
        weights: Arc::clone(&weights),
        ranker: Arc::new(Ranker::new(ranking_config)),
        extraction_version: match_config.extraction_cache_version,
        max_workers: match_config.max_workers,
    };

    // Ctrl-C stops the batch between postings
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing in-flight postings");
                cancel.cancel();
            }
        });
    }

    let sink = JsonlSink::create(&config.output_path).await?;
    let report = run_batch(&ctx, profile, dedupe.canonical, &sink, &cancel).await?;

    weights
        .save(&stats_path)
        .with_context(|| format!("Failed to write {}", stats_path.display()))?;
    let evicted = extraction.purge(&EvictionPolicy::default())?;
    if evicted > 0 {
        info!("Evicted {evicted} extraction cache entries");
    }

    info!("Run summary: {}", serde_json::to_string(&report.summary)?);
    Ok(())
}
