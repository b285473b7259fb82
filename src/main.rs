//! Headless control surface: connects to a playout server, logs
//! now-playing and connectivity transitions, and takes transport commands
//! on stdin.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wavedeck::{
    ApiClient, CommandDispatcher, Config, EventChannel, RefreshScheduler, StateStore, StoreState,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavedeck=info")),
        )
        .init();

    let config = Config::load()?;
    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.server.host.clone());

    let api = Arc::new(ApiClient::new(&host)?);
    let store = Arc::new(StateStore::new());

    announce_transitions(&store);

    let channel = EventChannel::subscribe(Arc::clone(&api), Arc::clone(&store))?;
    let scheduler = Arc::new(RefreshScheduler::with_intervals(
        Arc::clone(&api),
        Arc::clone(&store),
        config.foreground_interval(),
        config.background_interval(),
    ));
    scheduler.schedule_immediate();
    let dispatcher = CommandDispatcher::new(Arc::clone(&api), Arc::clone(&scheduler));

    match api.server_config().await {
        Ok(server) => {
            let news = if server.news { "enabled" } else { "disabled" };
            println!("wavedeck · {host} · news injection {news} · `help` for commands");
        }
        Err(e) => {
            warn!(error = %e, "could not read server config");
            println!("wavedeck · {host} · `help` for commands");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(line) => {
                        if !run_command(line.trim(), &dispatcher, &api, &store, &scheduler).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    channel.unsubscribe();
    scheduler.shutdown();
    Ok(())
}

/// Print a line whenever the airing clip or connectivity changes.
fn announce_transitions(store: &StateStore) {
    let last = Arc::new(Mutex::new((String::new(), true)));
    store.subscribe(move |state: &StoreState| {
        let mut last = last.lock().unwrap();

        if state.connected != last.1 {
            last.1 = state.connected;
            if state.connected {
                println!("-- connection restored");
            } else {
                println!("-- connection lost");
            }
        }

        if let Some(snapshot) = &state.snapshot {
            let label = if snapshot.now.is_idle() {
                "(idle)".to_string()
            } else if snapshot.now.is_pause {
                format!("(pause) {}", snapshot.now.current)
            } else {
                snapshot.now.current.clone()
            };
            if label != last.0 {
                last.0 = label.clone();
                println!("now playing: {label}");
            }
        }
    });
}

async fn run_command(
    line: &str,
    dispatcher: &CommandDispatcher,
    api: &ApiClient,
    store: &StateStore,
    scheduler: &RefreshScheduler,
) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "help" => print_help(),
        "now" => print_state(&store.get()),
        "skip" => report(dispatcher.skip().await, "skipped"),
        "pause" => report(dispatcher.pause().await, "pause toggled"),
        "repeat" => report(dispatcher.repeat().await, "repeat queued"),
        "news" => report(dispatcher.inject_news().await, "news scheduled"),
        "search" => search(api, rest).await,
        "add" => report(dispatcher.schedule(rest.trim()).await, "added to queue"),
        "url" => println!("{}", api.download_url(rest.trim())),
        "bg" => scheduler.set_foreground(false),
        "fg" => scheduler.set_foreground(true),
        "quit" | "exit" => return false,
        other => println!("unknown command `{other}` (try `help`)"),
    }
    true
}

fn print_help() {
    println!(
        "\
  now            show the current snapshot
  skip           skip the current clip
  pause          toggle pause
  repeat         repeat the current clip
  news           inject the news clip (if the server enables it)
  search <text>  search the clip library
  add <id>       queue a clip by id
  url <id>       print a clip's download URL
  bg / fg        simulate backgrounding (slows polling)
  quit"
    );
}

fn print_state(state: &StoreState) {
    let Some(snapshot) = &state.snapshot else {
        println!("no snapshot yet");
        return;
    };

    println!("current: {}", snapshot.now.current);
    if snapshot.now.is_pause {
        println!("         (paused)");
    }
    for entry in &snapshot.now.history {
        let mut flags = String::new();
        if entry.skipped {
            flags.push_str(" [skipped]");
        }
        if entry.user_scheduled {
            flags.push_str(" [requested]");
        }
        println!("  {}  {}{}", entry.local_time_of_day(), entry.title, flags);
    }
    println!(
        "library: {} music / {} hosts / {} other",
        snapshot.library.music, snapshot.library.hosts, snapshot.library.other
    );
    if !snapshot.uptime.is_empty() {
        println!("uptime:  {}", snapshot.uptime);
    }
    if !state.connected {
        println!("(push channel down, data may be stale)");
    }
}

fn report(result: wavedeck::Result<()>, ok: &str) {
    match result {
        Ok(()) => println!("{ok}"),
        Err(e) => println!("failed: {}", e.user_message()),
    }
}

async fn search(api: &ApiClient, query: &str) {
    match api.search(query).await {
        Ok(results) if results.is_empty() => println!("no results"),
        Ok(results) => {
            for entry in results {
                println!("  {}  {}", entry.id, entry.name);
            }
        }
        Err(e) => println!("failed: {}", e.user_message()),
    }
}
