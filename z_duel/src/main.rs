use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use console::{Key, Term};
use z_duel::{
    Action, AnsiTermStyle, DuelScreen, MatchCommand, MatchConfig, MatchEvent, MatchOutcome, MatchSession,
    StepResult, TermRender,
};
use zenoh::key_expr::KeyExpr;
use zenoh_duel::{PlayerId, RoomId, RoomStore, SessionExt, SyncConfig, Transport};

/// z_duel - two-player falling-block duel over Zenoh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Player name
    #[arg(short, long)]
    name: Option<String>,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed seed for the piece sequence
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a room and wait for an opponent
    Create,
    /// Join a waiting room
    Join {
        /// Room identifier
        room: String,
    },
    /// List waiting rooms, newest first
    List,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr, the board owns stdout
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let zenoh_config = match &args.config {
        Some(path) => zenoh::Config::from_file(path).map_err(|e| anyhow!("Failed to load config file: {}", e))?,
        None => zenoh::Config::default(),
    };
    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow!("Failed to open zenoh session: {}", e))?;

    let mut config = SyncConfig::default();
    if let Some(prefix) = args.prefix.clone() {
        config = config.with_keyexpr_prefix(prefix);
    }
    let me = match args.name.clone() {
        Some(name) => PlayerId::from_name(name)?,
        None => PlayerId::generate(),
    };

    let store: Arc<dyn RoomStore> = Arc::new(
        session
            .declare_room_store()
            .prefix(config.keyexpr_prefix.clone())
            .query_timeout_ms(config.step_timeout_ms)
            .await?,
    );
    let transport: Arc<dyn Transport> = Arc::new(
        session
            .declare_duel_transport()
            .prefix(config.keyexpr_prefix.clone())
            .await?,
    );
    let mut match_config = MatchConfig::default();
    if let Some(seed) = args.seed {
        match_config = match_config.with_seed(seed);
    }

    let mut duel = match args.command {
        Some(Command::List) => {
            let rooms = store.list_waiting(config.room_list_limit).await?;
            if rooms.is_empty() {
                println!("No waiting rooms");
            }
            for room in rooms {
                println!("{}  hosted by {}", room.id, room.host);
            }
            return Ok(());
        }
        Some(Command::Create) => MatchSession::host(me, store, transport, config, match_config).await?,
        Some(Command::Join { room }) => {
            let room = RoomId::parse(room)?;
            MatchSession::join(me, &room, store, transport, config, match_config).await?
        }
        None => match store.list_waiting(1).await?.into_iter().next() {
            Some(room) => MatchSession::join(me, &room.id, store, transport, config, match_config).await?,
            None => MatchSession::host(me, store, transport, config, match_config).await?,
        },
    };

    println!("=== z_duel ===");
    println!("Player: {}", duel.player());
    println!("Room: {}", duel.room().id);
    println!("Controls:");
    println!("  ← → - Move left/right");
    println!("  ↓ - Soft drop");
    println!("  ↑ / x - Rotate");
    println!("  Space - Hard drop");
    println!("  q - Quit");
    println!();

    let keyboard_sender = duel.sender();
    let keyboard_task = tokio::task::spawn_blocking(move || {
        let input_term = Term::stdout();
        loop {
            let Ok(key) = input_term.read_key() else {
                continue;
            };
            let command = match key {
                Key::ArrowLeft => Some(MatchCommand::Input(Action::MoveLeft)),
                Key::ArrowRight => Some(MatchCommand::Input(Action::MoveRight)),
                Key::ArrowDown => Some(MatchCommand::Input(Action::SoftDrop)),
                Key::ArrowUp | Key::Char('x') | Key::Char('X') => Some(MatchCommand::Input(Action::Rotate)),
                Key::Char(' ') => Some(MatchCommand::Input(Action::HardDrop)),
                Key::Char('q') | Key::Char('Q') => {
                    let _ = keyboard_sender.send(MatchCommand::Stop);
                    break;
                }
                _ => None,
            };
            if let Some(command) = command
                && keyboard_sender.send(command).is_err()
            {
                break;
            }
        }
    });

    let render_term = Term::stdout();
    render_term.clear_screen()?;
    let mut last_render = std::time::Instant::now();
    let render_interval = Duration::from_millis(50);
    let room_line = format!("Room {}", duel.room().id);
    let mut notice: Option<String> = None;

    loop {
        let result = duel.step().await?;
        for event in duel.take_events() {
            if let Some(text) = event_message(&event) {
                notice = Some(text);
            }
        }
        let started = result == StepResult::Started;
        match result {
            StepResult::Stop => break,
            StepResult::GameOver(outcome) => {
                let text = outcome_message(&outcome, duel.player());
                render(&render_term, &duel, &[room_line.clone(), text])?;
                break;
            }
            StepResult::Started | StepResult::Updated | StepResult::Timeout => {
                if started || last_render.elapsed() >= render_interval {
                    let second = if duel.is_waiting() {
                        "Waiting for an opponent...".to_string()
                    } else {
                        notice.clone().unwrap_or_default()
                    };
                    render(&render_term, &duel, &[room_line.clone(), second])?;
                    last_render = std::time::Instant::now();
                }
            }
        }
    }

    keyboard_task.abort();
    let _ = keyboard_task.await;

    println!();
    println!("{}", duel.stats());
    Ok(())
}

fn event_message(event: &MatchEvent) -> Option<String> {
    match event {
        MatchEvent::LinesCleared { rows } => Some(format!("Cleared {} line(s)", rows)),
        MatchEvent::Combo(combo) => Some(format!("Combo x{}", combo)),
        MatchEvent::AttackSent(rows) => Some(format!("Sent {} garbage row(s)", rows)),
        MatchEvent::AttackReceived(rows) => Some(format!("{} garbage row(s) incoming", rows)),
        MatchEvent::LevelUp(level) => Some(format!("Level {}", level)),
        _ => None,
    }
}

fn outcome_message(outcome: &MatchOutcome, me: &PlayerId) -> String {
    match &outcome.winner {
        Some(winner) if winner == me => format!("You win! ({} points)", outcome.report.score),
        Some(winner) => format!("{} wins ({} points for you)", winner, outcome.report.score),
        None => format!("No winner ({} points)", outcome.report.score),
    }
}

fn render(term: &Term, duel: &MatchSession, messages: &[String]) -> anyhow::Result<()> {
    let opponent_name = duel.room().opponent_of(duel.player()).map(|p| p.as_str());
    let screen = DuelScreen::new(
        duel.engine(),
        duel.opponent(),
        duel.player().as_str(),
        opponent_name,
        messages,
        duel.is_degraded(),
    );
    term.move_cursor_to(0, 0)?;
    for line in screen.render(&AnsiTermStyle) {
        term.write_line(&line)?;
    }
    term.flush()?;
    Ok(())
}
