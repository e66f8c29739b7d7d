/// Entry point: headless campaign driver.
///
/// Plays levels in order from `--level`, one move script per level. Moves
/// are fed whenever no cascade is in flight and the simulation steps at the
/// configured tick until the level is won, lost, or the tick limit runs out.
/// A win advances to the next level when `--all` is set; a loss restarts the
/// same level up to `--retries` times.
///
/// Exit status: 0 won, 1 lost or unfinished, 2 bad input.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, info, warn, LevelFilter};

use hexlift::config::GameConfig;
use hexlift::domain::hex::Axial;
use hexlift::domain::tile::MoveDir;
use hexlift::sim::event::LevelEvent;
use hexlift::sim::level::{self, Campaign, LevelDef};
use hexlift::sim::step::step;
use hexlift::sim::world::{Level, Outcome};

/// Play a Hexlift level without a screen.
#[derive(Parser)]
#[command(about, long_about = None, version)]
struct Args {
    /// List the available levels
    #[arg(short, long, default_value_t = false)]
    list: bool,

    /// Level to play, counting from 1
    #[arg(short = 'n', long, default_value_t = 1)]
    level: usize,

    /// Read levels from this file instead of the levels directory
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Player moves for one level, e.g. "1,0,lower 2,0,raise". Repeat for
    /// the following levels.
    #[arg(short, long)]
    moves: Vec<String>,

    /// Keep going through the following levels after a win
    #[arg(short, long, default_value_t = false)]
    all: bool,

    /// Restart a lost level at most this many times
    #[arg(short, long, default_value_t = 0)]
    retries: u32,

    /// Give up after this many ticks
    #[arg(short = 't', long, default_value_t = 20_000)]
    max_ticks: u64,

    /// Enable debug messages
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.debug {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let config = GameConfig::load();
    let levels = match &args.file {
        Some(path) => match level::load_file(path) {
            Ok(levels) => levels,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(2);
            }
        },
        None => level::available_levels(&config),
    };

    if args.list {
        for (i, def) in levels.iter().enumerate() {
            println!("{:>3}. {} (raise {}, lower {})", i + 1, def.name, def.raise, def.lower);
        }
        return ExitCode::SUCCESS;
    }

    let scripts = match args.moves.iter().map(|m| parse_moves(m)).collect::<Result<Vec<_>, _>>() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let campaign = match Campaign::starting_at(levels, args.level.saturating_sub(1)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}. Use --list to see the available levels.");
            return ExitCode::from(2);
        }
    };

    let plan = RunPlan { all: args.all, retries: args.retries, max_ticks: args.max_ticks };
    match run_campaign(campaign, &config, &scripts, &plan) {
        Ok(summary) => {
            println!(
                "{:?}: {} cleared, {} restarts",
                summary.outcome, summary.cleared, summary.restarts
            );
            if summary.outcome == Outcome::Won {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}

struct RunPlan {
    all: bool,
    retries: u32,
    max_ticks: u64,
}

#[derive(Debug, PartialEq, Eq)]
struct Summary {
    /// Outcome of the last level played.
    outcome: Outcome,
    cleared: usize,
    restarts: u32,
}

/// Play from the campaign's current level. Script `i` drives the `i`-th
/// level played; restarts replay the same script.
fn run_campaign(
    mut campaign: Campaign,
    config: &GameConfig,
    scripts: &[VecDeque<(Axial, MoveDir)>],
    plan: &RunPlan,
) -> Result<Summary, Box<dyn std::error::Error>> {
    let mut summary = Summary { outcome: Outcome::Playing, cleared: 0, restarts: 0 };
    let mut current = campaign.current().cloned();

    while let Some(def) = current {
        let moves = scripts.get(summary.cleared).cloned().unwrap_or_default();
        summary.outcome = play(&def, config, moves, plan.max_ticks)?;

        current = match summary.outcome {
            Outcome::Won => {
                summary.cleared += 1;
                if plan.all { campaign.advance().cloned() } else { None }
            }
            Outcome::Lost if summary.restarts < plan.retries => {
                summary.restarts += 1;
                info!("{}: restarting ({}/{})", def.name, summary.restarts, plan.retries);
                campaign.restart().cloned()
            }
            Outcome::Lost | Outcome::Playing => None,
        };
    }

    if campaign.is_complete() {
        info!("campaign complete");
    }
    Ok(summary)
}

fn play(
    def: &LevelDef,
    config: &GameConfig,
    mut moves: VecDeque<(Axial, MoveDir)>,
    max_ticks: u64,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let mut level = Level::load(def, &config.timing)?;
    let tick = config.timing.tick();
    info!("{}: raise {}, lower {}", level.name, level.budget().raise, level.budget().lower);

    for _ in 0..max_ticks {
        if level.coordinator().is_idle() {
            if let Some((pos, dir)) = moves.pop_front() {
                // The level warns with the reason; the script carries on.
                if level.request_move(pos, dir).is_err() {
                    debug!("{}: skipped scripted {dir} at {pos}", level.name);
                }
            }
        }

        for event in step(&mut level, tick) {
            log_event(&event);
        }

        match level.outcome() {
            Outcome::Playing => {}
            outcome => {
                println!("{}: {:?} after {} ticks", level.name, outcome, level.tick());
                return Ok(outcome);
            }
        }
    }

    warn!("{}: still playing after {max_ticks} ticks", level.name);
    println!("{}: unfinished", level.name);
    Ok(Outcome::Playing)
}

fn log_event(event: &LevelEvent) {
    match event {
        LevelEvent::TileMoveStarted { position, dir, cascaded } => {
            if *cascaded {
                debug!("{position} follows ({dir})");
            } else {
                info!("{dir} {position}");
            }
        }
        LevelEvent::TileSettled { position, height } => debug!("{position} settled at {height}"),
        LevelEvent::GraphChanged { revision } => debug!("terrain revision {revision}"),
        LevelEvent::PathUpdated { waypoints: 0, .. } => info!("no route to the goal"),
        LevelEvent::PathUpdated { waypoints, .. } => info!("route of {waypoints} tiles"),
        LevelEvent::WaypointReached { position } => debug!("traveler at {position}"),
        LevelEvent::LevelWon => info!("goal reached"),
        LevelEvent::LevelLost => info!("traveler is stranded"),
    }
}

/// `"q,r,dir q,r,dir ..."` where dir is `up`/`raise` or `down`/`lower`.
fn parse_moves(text: &str) -> Result<VecDeque<(Axial, MoveDir)>, String> {
    text.split_whitespace().map(parse_move).collect()
}

fn parse_move(token: &str) -> Result<(Axial, MoveDir), String> {
    let bad = || format!("bad move `{token}`, expected q,r,raise or q,r,lower");
    let mut parts = token.split(',');
    let (Some(q), Some(r), Some(dir), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(bad());
    };
    let q = q.trim().parse().map_err(|_| bad())?;
    let r = r.trim().parse().map_err(|_| bad())?;
    let dir = match dir.trim() {
        "up" | "raise" => MoveDir::Up,
        "down" | "lower" => MoveDir::Down,
        _ => return Err(bad()),
    };
    Ok((Axial::new(q, r), dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_scripts() {
        let moves = parse_moves(" 1,0,lower  -2,3,up ").unwrap();
        assert_eq!(
            moves,
            VecDeque::from([(Axial::new(1, 0), MoveDir::Down), (Axial::new(-2, 3), MoveDir::Up)])
        );
        assert!(parse_moves("").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_moves() {
        assert!(parse_move("1,0").is_err());
        assert!(parse_move("1,0,sideways").is_err());
        assert!(parse_move("a,0,up").is_err());
        assert!(parse_move("1,0,up,again").is_err());
    }

    #[test]
    fn scripted_embedded_level_is_won() {
        let def = &level::embedded_levels()[3];
        let config = GameConfig::default();
        let moves = parse_moves("1,0,lower 2,0,raise").unwrap();
        assert_eq!(play(def, &config, moves, 5_000).unwrap(), Outcome::Won);
    }

    #[test]
    fn rejected_script_move_is_skipped() {
        let def = &level::embedded_levels()[3];
        let config = GameConfig::default();
        // The first move targets a gap and the second a pinned tile.
        let moves = parse_moves("9,9,raise 0,0,lower 1,0,lower 2,0,raise").unwrap();
        assert_eq!(play(def, &config, moves, 5_000).unwrap(), Outcome::Won);
    }

    #[test]
    fn campaign_runs_every_embedded_level() {
        let campaign = Campaign::new(level::embedded_levels());
        let scripts = ["1,0,lower", "1,0,up 1,0,up", "2,0,up 2,0,down", "1,0,lower 2,0,raise"]
            .iter()
            .map(|s| parse_moves(s).unwrap())
            .collect::<Vec<_>>();
        let plan = RunPlan { all: true, retries: 0, max_ticks: 5_000 };
        let summary = run_campaign(campaign, &GameConfig::default(), &scripts, &plan).unwrap();
        assert_eq!(summary, Summary { outcome: Outcome::Won, cleared: 4, restarts: 0 });
    }

    #[test]
    fn single_level_stops_after_a_win() {
        let campaign = Campaign::new(level::embedded_levels());
        let scripts = vec![parse_moves("1,0,lower").unwrap()];
        let plan = RunPlan { all: false, retries: 0, max_ticks: 5_000 };
        let summary = run_campaign(campaign, &GameConfig::default(), &scripts, &plan).unwrap();
        assert_eq!(summary, Summary { outcome: Outcome::Won, cleared: 1, restarts: 0 });
    }

    #[test]
    fn lost_level_restarts_up_to_the_limit() {
        let defs = level::parse_pack("# Wall\n0a 1 0g\n").unwrap();
        let plan = RunPlan { all: true, retries: 2, max_ticks: 5_000 };
        let summary = run_campaign(Campaign::new(defs), &GameConfig::default(), &[], &plan).unwrap();
        assert_eq!(summary, Summary { outcome: Outcome::Lost, cleared: 0, restarts: 2 });
    }
}
