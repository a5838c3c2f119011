use clap::{Arg, Command};
use log::LevelFilter;
use mailsift::folders::{Folder, FolderStore};
use mailsift::message::NormalizedMessage;
use mailsift::pipeline::{IntakePipeline, IntakeReport, Mailroom};
use mailsift::source::{read_raw_messages, MessageSource, SpoolDirectory, SyntheticSource};
use mailsift::{Config, DecisionEngine};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    let matches = Command::new("mailsift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hybrid spam sorter for incoming mail")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("mailsift.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .value_name("COUNT")
                .help("Generate COUNT synthetic messages and sort them")
                .value_parser(clap::value_parser!(usize))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("ingest")
                .long("ingest")
                .value_name("FILE")
                .help("Sort the messages in a JSON file (one message or an array)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .help("Poll the spool directory until interrupted")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-message")
                .long("test-message")
                .value_name("FILE")
                .help("Classify the messages in a JSON file without storing them")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .value_name("FOLDER")
                .help("List a folder (inbox or spam), newest first")
                .value_parser(clap::value_parser!(Folder))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("move-to-spam")
                .long("move-to-spam")
                .value_name("ID")
                .help("Manually move a message from the inbox to spam")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("move-to-inbox")
                .long("move-to-inbox")
                .value_name("ID")
                .help("Manually move a message from spam to the inbox")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show folder counts and spam ratio")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-message decisions")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        init_logger(LevelFilter::Info);
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("mailsift.yaml");
    let (config, config_found) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.log_level().unwrap_or(LevelFilter::Info)
    };
    init_logger(log_level);

    if !config_found {
        log::warn!(
            "Configuration file '{config_path}' not found, using default configuration"
        );
    }

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    if let Err(e) = config.validate() {
        eprintln!("❌ Invalid configuration: {e}");
        process::exit(1);
    }

    let mut folders = match load_folders(&config) {
        Ok(folders) => folders,
        Err(e) => {
            eprintln!("❌ Failed to load folder state: {e}");
            process::exit(1);
        }
    };

    if let Some(folder) = matches.get_one::<Folder>("list") {
        list_folder(&folders, *folder);
        return;
    }

    if matches.get_flag("stats") {
        print_summary(&folders);
        return;
    }

    if let Some(id) = matches.get_one::<String>("move-to-spam") {
        manual_move(&config, &mut folders, id, Folder::Spam);
        return;
    }

    if let Some(id) = matches.get_one::<String>("move-to-inbox") {
        manual_move(&config, &mut folders, id, Folder::Inbox);
        return;
    }

    let engine = match DecisionEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("❌ Failed to initialize classifier: {e}");
            process::exit(1);
        }
    };

    if let Some(message_file) = matches.get_one::<String>("test-message") {
        test_message_file(&engine, message_file);
        return;
    }

    let mut mailroom = Mailroom::with_folders(IntakePipeline::new(engine), folders);

    if let Some(count) = matches.get_one::<usize>("simulate") {
        simulate(&mut mailroom, *count);
    } else if let Some(path) = matches.get_one::<String>("ingest") {
        match read_raw_messages(path) {
            Ok(messages) => {
                mailroom.enqueue_all(messages);
                let report = mailroom.process_incoming();
                print_report(&report);
            }
            Err(e) => {
                eprintln!("❌ {e:#}");
                process::exit(1);
            }
        }
    } else if matches.get_flag("watch") {
        watch_spool(&config, &mut mailroom);
    } else {
        print_summary(mailroom.folders());
        println!();
        println!(
            "💡 Use --simulate, --ingest or --watch to sort new messages (see --help)"
        );
        return;
    }

    save_folders(&config, mailroom.folders());
    print_summary(mailroom.folders());
}

fn init_logger(level: LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_config(path: &str) -> anyhow::Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        Ok((Config::from_file(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();
    println!("Keywords: {}", config.heuristics.keywords.len());
    println!(
        "Model: {} ({})",
        config.model_path,
        existence(&config.model_path)
    );
    println!(
        "Spam corpus: {} ({})",
        config.corpus.path,
        existence(&config.corpus.path)
    );
    match &config.state_path {
        Some(path) => println!("State file: {path}"),
        None => println!("State file: none (folders kept in memory)"),
    }
    println!(
        "Spool: {} every {}s",
        config.spool.directory, config.spool.poll_interval_seconds
    );

    match config.validate() {
        Ok(()) => println!("✅ Configuration is valid"),
        Err(e) => {
            println!("❌ Configuration validation failed:");
            println!("Error: {e}");
            process::exit(1);
        }
    }
}

fn existence(path: &str) -> &'static str {
    if std::path::Path::new(path).exists() {
        "found"
    } else {
        "missing, signal disabled"
    }
}

fn load_folders(config: &Config) -> anyhow::Result<FolderStore> {
    match &config.state_path {
        Some(path) => Ok(FolderStore::load(path)?),
        None => Ok(FolderStore::new()),
    }
}

fn save_folders(config: &Config, folders: &FolderStore) {
    if let Some(path) = &config.state_path {
        if let Err(e) = folders.save(path) {
            log::error!("Failed to save folder state to {path}: {e}");
        }
    }
}

fn manual_move(config: &Config, folders: &mut FolderStore, id: &str, to: Folder) {
    if folders.move_message(id, to) {
        save_folders(config, folders);
        println!("✅ Moved {id} to {to}");
    } else {
        eprintln!("❌ No message {id} found in {}", to.other());
        process::exit(1);
    }
}

fn simulate(mailroom: &mut Mailroom, count: usize) {
    let mut source = SyntheticSource::new();
    let mut total = IntakeReport::default();

    for _ in 0..count {
        let message = source.next_message();
        let id = message.id.clone();
        mailroom.enqueue(message);
        let report = mailroom.process_incoming();
        total.inbox += report.inbox;
        total.spam += report.spam;
        total.duplicates += report.duplicates;

        let folders = mailroom.folders();
        if let Some(folder) = folders.locate(&id) {
            if let Some(message) = folders.folder(folder).iter().rev().find(|m| m.id == id) {
                print_message(message, folder);
            }
        }
    }

    print_report(&total);
}

fn watch_spool(config: &Config, mailroom: &mut Mailroom) {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, finishing current batch...");
        flag.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to install signal handler: {e}");
    }

    let mut spool = SpoolDirectory::new(&config.spool.directory);
    let interval = Duration::from_secs(config.spool.poll_interval_seconds);
    log::info!(
        "Watching {} source at {} every {}s",
        spool.name(),
        config.spool.directory,
        config.spool.poll_interval_seconds
    );

    while running.load(Ordering::SeqCst) {
        match spool.fetch() {
            Ok(messages) => {
                mailroom.enqueue_all(messages);
                let report = mailroom.process_incoming();
                if report.routed() > 0 {
                    save_folders(config, mailroom.folders());
                }
            }
            Err(e) => log::error!("Spool fetch failed: {e:#}"),
        }

        let started = Instant::now();
        while running.load(Ordering::SeqCst) && started.elapsed() < interval {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    log::info!("Spool watcher stopped");
}

fn test_message_file(engine: &DecisionEngine, path: &str) {
    println!("🧪 Testing message file: {path}");
    println!();

    let messages = match read_raw_messages(path) {
        Ok(messages) => messages,
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    };

    for message in messages {
        let decision = engine.classify(&message.subject, &message.body);
        let sender = message.display_sender();
        let subject = message.display_subject();
        println!("📨 {} - {}", sender, subject);
        println!("  Id: {}", message.id);
        let verdict = if decision.is_spam {
            "🚫 SPAM"
        } else {
            "✅ LEGITIMATE"
        };
        println!("  Verdict: {} (score {:.2})", verdict, decision.score);
        println!("  Diagnosis: {}", decision.reason_text());
        if let Some(similar) = &decision.similar_spam {
            println!("  Closest known spam: {}", truncate_string(similar, 80));
        }
        println!();
    }
}

fn list_folder(folders: &FolderStore, folder: Folder) {
    let messages: Vec<&NormalizedMessage> = folders.newest_first(folder).collect();
    println!("📬 {} ({} messages, newest first)", folder, messages.len());
    println!("═══════════════════════════════════════");

    if messages.is_empty() {
        println!("  (empty)");
        return;
    }
    for message in messages {
        print_message(message, folder);
    }
}

fn print_message(message: &NormalizedMessage, folder: Folder) {
    let marker = match folder {
        Folder::Inbox => "📥",
        Folder::Spam => "🚫",
    };
    println!(
        "{} [{:>3}%] {:<20} {}",
        marker,
        (message.spam_score * 100.0).trunc() as u32,
        truncate_string(message.display_sender(), 20),
        truncate_string(message.display_subject(), 50)
    );
    println!("        id: {}", message.id);
    if let Some(reason) = &message.spam_reason {
        println!("        {}", reason);
    }
    if let Some(similar) = message.similar_spam_match() {
        println!("        similar spam: {}", truncate_string(similar, 70));
    }
    let excerpt = message.excerpt(120);
    if !excerpt.is_empty() {
        println!("        > {}", excerpt);
    }
}

fn print_report(report: &IntakeReport) {
    println!();
    println!(
        "📊 Sorted {} messages: {} inbox, {} spam, {} duplicates dropped",
        report.processed(),
        report.inbox,
        report.spam,
        report.duplicates
    );
}

fn print_summary(folders: &FolderStore) {
    let summary = folders.summary();
    println!();
    println!("📊 Mailsift Folders");
    println!("═══════════════════════════════════════");
    println!("  Total Messages: {}", summary.total);
    println!("  ├─ Inbox: {}", summary.inbox);
    println!("  ├─ Spam: {}", summary.spam);
    println!("  └─ Filter Rate: {}%", summary.spam_ratio_percent);
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
