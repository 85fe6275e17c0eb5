//! Terminal entrypoint wiring the store, history, audio, and a command loop
//! around the controller (or a read-only viewer).

use std::{env, sync::Arc, time::Duration};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rink_board::{
    alarm::{NullSink, SoundBank},
    cache::SnapshotCache,
    client::{Controller, DisplayState, Viewer},
    clock::{Clock, SystemClock},
    config::AppConfig,
    dao::{memory::MemoryStore, store::BoardStore},
    error::ClientError,
    history::GameHistory,
    ident::GameId,
    presence::MemoryPresence,
    state::{ResetOptions, Team},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let args: Vec<String> = env::args().skip(1).collect();
    let view_only = args.iter().any(|a| a == "--view");
    let requested = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| env::var("RINK_BOARD_GAME").ok());

    let mut history = GameHistory::load(&config.history_path);
    let created_here = requested.as_deref() == Some("new");
    let game = match requested.as_deref() {
        Some("new") => GameId::generate(),
        Some(raw) => GameId::sanitize(raw)
            .ok_or_else(|| ClientError::InvalidGameId(raw.to_string()))?,
        None => GameId::resolve(None, history.last_game_id()),
    };
    history.touch(&game, created_here, clock.now_ms());
    history.save();
    info!(game = %game, view_only, "joining game");

    let store = open_store(Arc::clone(&clock)).await;
    let presence = MemoryPresence::new();
    let cache = Arc::new(SnapshotCache::new(&config.cache_dir));

    if view_only {
        let viewer = Viewer::connect(
            game,
            store,
            clock,
            &presence,
            cache,
            config.tick_interval_ms,
        )
        .await;
        run_viewer(viewer).await;
        return Ok(());
    }

    let sounds = SoundBank::load(&config.sounds_dir);
    let controller = Controller::connect(
        game.clone(),
        store,
        clock,
        &presence,
        cache,
        Arc::new(NullSink),
        sounds,
        config.tick_interval_ms,
    )
    .await;

    run_controller(controller, history, game).await
}

/// Open the CouchDB store when configured, otherwise fall back to a
/// process-local store (useful for rehearsing without a server).
async fn open_store(clock: Arc<dyn Clock>) -> Arc<dyn BoardStore> {
    #[cfg(feature = "couch-store")]
    {
        use rink_board::dao::couchdb::{CouchBoardStore, CouchConfig};
        use tokio::time::sleep;

        const CONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
        const CONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

        if env::var_os("COUCH_BASE_URL").is_some() {
            let config = match CouchConfig::from_env() {
                Ok(config) => config,
                Err(error) => {
                    warn!(%error, "incomplete CouchDB configuration; using local store");
                    return Arc::new(MemoryStore::new(clock));
                }
            };

            let mut delay = CONNECT_INITIAL_DELAY;
            loop {
                match CouchBoardStore::connect(config.clone(), Arc::clone(&clock)).await {
                    Ok(store) => {
                        info!("connected to CouchDB");
                        return Arc::new(store);
                    }
                    Err(error) => {
                        warn!(%error, "CouchDB connection attempt failed; retrying");
                        sleep(delay).await;
                        delay = (delay * 2).min(CONNECT_MAX_DELAY);
                    }
                }
            }
        }
    }

    warn!("no store configured; state will not leave this process");
    Arc::new(MemoryStore::new(clock))
}

/// Print every display change until interrupted.
async fn run_viewer(viewer: Viewer) {
    let mut display = viewer.display();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    println!("{}", render(&display.borrow()));
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", render(&display.borrow()));
            }
        }
    }
}

/// Interactive command loop for the controller.
async fn run_controller(
    controller: Controller,
    mut history: GameHistory,
    game: GameId,
) -> anyhow::Result<()> {
    // Pick up a name another device may have assigned to this game.
    match controller.bridge().read_friendly_name().await {
        Ok(Some(name)) => {
            history.set_name(&game, Some(name));
            history.save();
        }
        Ok(None) => {}
        Err(error) => warn!(%error, "friendly name read failed"),
    }

    println!("commands: start stop reset time score period advance theme show name rename league minutes horn status quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if handle_command(&controller, &mut history, &game, line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Flush the final state so viewers do not keep a stale running clock.
    if let Err(error) = controller.sync_now().await {
        warn!(%error, "final state write failed");
    }
    Ok(())
}

/// Apply one command line; returns true when the loop should exit.
async fn handle_command(
    controller: &Controller,
    history: &mut GameHistory,
    game: &GameId,
    line: &str,
) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return false;
    };
    let rest: Vec<&str> = parts.collect();

    match command {
        "start" => controller.start_timer().await,
        "stop" => controller.stop_timer().await,
        "reset" => controller.reset_timer().await,
        "newgame" => controller.reset_game(ResetOptions::default()).await,
        "time" => match rest.first() {
            Some(text) => controller.set_timer_text(text).await,
            None => println!("usage: time MM:SS"),
        },
        "score" => match (rest.first().and_then(|t| Team::parse(t)), rest.get(1)) {
            (Some(team), Some(delta)) => match delta.parse::<i32>() {
                Ok(delta) => controller.add_score(team, delta).await,
                Err(_) => println!("usage: score a|b <delta>"),
            },
            _ => println!("usage: score a|b <delta>"),
        },
        "period" => match rest.first().map(|d| *d == "-") {
            Some(true) => controller.change_period(-1).await,
            _ => controller.change_period(1).await,
        },
        "advance" => controller.advance_phase().await,
        "theme" => {
            let theme = controller.toggle_theme().await;
            println!("theme: {theme:?}");
        }
        "show" | "hide" => match rest.first() {
            Some(key) => {
                controller
                    .set_visibility((*key).to_string(), command == "show")
                    .await
            }
            None => println!("usage: {command} <elementKey>"),
        },
        "name" => match (rest.first().and_then(|t| Team::parse(t)), rest.len() > 1) {
            (Some(team), true) => controller.set_team_name(team, rest[1..].join(" ")).await,
            _ => println!("usage: name a|b <team name>"),
        },
        "rename" => {
            if rest.is_empty() {
                println!("usage: rename <game name>");
            } else {
                let name = rest.join(" ");
                if let Err(error) = controller.bridge().write_friendly_name(name.clone()).await {
                    warn!(%error, "friendly name write failed");
                }
                history.set_name(game, Some(name));
                history.save();
            }
        }
        "league" => {
            if rest.is_empty() {
                println!("usage: league <name>");
            } else {
                controller.set_league_name(rest.join(" ")).await;
            }
        }
        "minutes" => match rest.first().and_then(|m| m.parse::<u32>().ok()) {
            Some(minutes) => controller.set_default_period_minutes(minutes).await,
            None => println!("usage: minutes <1-99>"),
        },
        "horn" => match rest.first() {
            Some(&"on") => controller.set_auto_minute_horn(true).await,
            Some(&"off") => controller.set_auto_minute_horn(false).await,
            _ => println!("usage: horn on|off"),
        },
        "status" => {
            let session = controller.bridge().session();
            let link = *controller.bridge().link().borrow();
            let display = DisplayState::project(&*session.read().await, link);
            println!("{}", render(&display));
        }
        "quit" | "exit" => return true,
        other => println!("unknown command `{other}` (try `status`)"),
    }

    false
}

fn render(display: &DisplayState) -> String {
    format!(
        "[{:?}] {} | {} {} - {} {} | {}{}",
        display.link,
        display.phase_label,
        display.team_a_name,
        display.score_a,
        display.score_b,
        display.team_b_name,
        display.clock_text,
        if display.running { " (running)" } else { "" },
    )
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
