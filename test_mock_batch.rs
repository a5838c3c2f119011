use mailsift::classifier::DisabledClassifier;
use mailsift::folders::Folder;
use mailsift::heuristics::KeywordScanner;
use mailsift::pipeline::{IntakePipeline, Mailroom};
use mailsift::similarity::{CsvCorpusLoader, LazySpamIndex};
use mailsift::source::SyntheticSource;
use mailsift::DecisionEngine;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing keyword-only sorting of a synthetic batch...");

    // No model and no vectorizer: only the keyword stage can fire
    let engine = DecisionEngine::new(
        KeywordScanner::new(),
        Arc::new(DisabledClassifier::new("debug run without model")),
        Arc::new(LazySpamIndex::new(CsvCorpusLoader::new("spam.csv", None))),
    );
    let mut mailroom = Mailroom::new(IntakePipeline::new(engine));

    let mut source = SyntheticSource::with_seed(7);
    for _ in 0..12 {
        mailroom.enqueue(source.next_message());
    }
    let report = mailroom.process_incoming();

    for folder in [Folder::Inbox, Folder::Spam] {
        println!();
        println!("{}:", folder);
        for message in mailroom.folders().newest_first(folder) {
            println!(
                "  [{:.2}] {} | {}",
                message.spam_score,
                message.display_subject(),
                message.spam_reason.as_deref().unwrap_or("-")
            );
        }
    }

    println!();
    println!(
        "Processed {} messages: {} inbox, {} spam, {} duplicates",
        report.processed(),
        report.inbox,
        report.spam,
        report.duplicates
    );

    let summary = mailroom.folders().summary();
    if summary.spam == 0 {
        println!("❌ No synthetic spam was caught by the keyword stage");
    } else {
        println!(
            "✅ Keyword stage flagged {}% of the batch",
            summary.spam_ratio_percent
        );
    }

    Ok(())
}
