use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use inbox_sentinel::classifier::ImportanceCriteria;
use inbox_sentinel::config::MonitorConfig;
use inbox_sentinel::dedup::ProcessedLog;
use inbox_sentinel::mailbox::{GmailConfig, GmailMailbox};
use inbox_sentinel::monitor::Monitor;
use inbox_sentinel::notify::{
    NotificationDispatcher, TelegramChannel, TelegramConfig, WhatsAppChannel, WhatsAppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::from_env();
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_monitor(config).await,
        Some("session") => session_command(args.get(1).map(String::as_str), &config).await,
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: inbox-sentinel [session <status|init|force|destroy>]");
            process::exit(2);
        }
    }
}

async fn run_monitor(config: MonitorConfig) -> anyhow::Result<()> {
    eprintln!("📬 Inbox Sentinel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", config.data_dir.display());
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());

    // Mailbox credentials are the one fatal startup requirement.
    let gmail_config = match GmailConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Mailbox credentials unavailable");
            eprintln!("Error: {e}");
            eprintln!("  export GMAIL_ACCESS_TOKEN=ya29...");
            process::exit(1);
        }
    };
    let mailbox = GmailMailbox::new(gmail_config);
    if let Err(e) = mailbox.verify().await {
        error!(error = %e, "Mailbox authentication failed");
        eprintln!("Error: mailbox authentication failed: {e}");
        process::exit(1);
    }
    eprintln!("   Mailbox: authenticated");

    let mut dispatcher = NotificationDispatcher::new();
    if let Some(telegram) = TelegramConfig::from_env() {
        eprintln!("   Telegram: enabled (chat {})", telegram.chat_id);
        dispatcher.register(Arc::new(TelegramChannel::new(telegram)));
    } else {
        eprintln!("   Telegram: disabled");
    }
    if let Some(whatsapp) = WhatsAppConfig::from_env(&config.data_dir) {
        eprintln!("   WhatsApp: enabled ({})", whatsapp.phone);
        dispatcher.register(Arc::new(WhatsAppChannel::new(whatsapp)));
    } else {
        eprintln!("   WhatsApp: disabled");
    }
    if dispatcher.channel_count() == 0 {
        warn!("No notification channels configured; important mail will only be logged");
    }

    let criteria = ImportanceCriteria::from_env();
    eprintln!("   Importance rules: {}\n", criteria.rule_count());

    let processed = ProcessedLog::load(config.processed_log_path())?;
    let mut monitor = Monitor::new(Arc::new(mailbox), criteria, dispatcher, processed, &config);

    tokio::select! {
        _ = monitor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }
    Ok(())
}

/// `session <status|init|force|destroy>` — manage the WhatsApp Web link
/// without running the monitor.
async fn session_command(
    action: Option<&str>,
    config: &MonitorConfig,
) -> anyhow::Result<()> {
    let Some(wa_config) = WhatsAppConfig::from_env(&config.data_dir) else {
        eprintln!("WhatsApp is not configured (set WHATSAPP_ENABLED=true and WHATSAPP_PHONE)");
        process::exit(1);
    };
    let profile_dir = wa_config.profile_dir.clone();
    let channel = WhatsAppChannel::new(wa_config);

    match action.unwrap_or("status") {
        "status" => {
            match channel.session().last_authenticated() {
                Some(at) => println!("Last authenticated: {at}"),
                None => println!("No recorded authentication"),
            }
            println!("State: {:?}", channel.session().validity());
        }
        "init" => {
            if channel.session().is_valid() {
                println!("Session is already valid; use `session force` to re-link.");
            } else if channel.ensure_usable().await {
                println!("Session initialized.");
            } else {
                eprintln!("Session initialization failed.");
                process::exit(1);
            }
        }
        "force" => match channel.authenticate().await {
            Ok(true) => println!("Session re-linked."),
            Ok(false) => {
                eprintln!("Authentication timed out.");
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Authentication failed: {e}");
                process::exit(1);
            }
        },
        "destroy" => {
            channel.session().destroy()?;
            if profile_dir.exists() {
                std::fs::remove_dir_all(&profile_dir)?;
            }
            println!("Session destroyed.");
        }
        other => {
            eprintln!("Unknown session action: {other}");
            eprintln!("Available: status, init, force, destroy");
            process::exit(2);
        }
    }
    Ok(())
}

/// Stderr logging, optionally teeing into the configured log file. The
/// returned guard must stay alive for the file writer to flush.
fn init_tracing(config: &MonitorConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "inbox-sentinel.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer.and(std::io::stderr))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}
