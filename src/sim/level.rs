/// Level loader with pack support.
///
/// ## Sources (priority order):
///   1. `levels/` directory (`.txt` and `.hlp` files, sorted by filename)
///   2. Built-in embedded levels
///
/// ## Layout format:
///   ```text
///   # Level Name
///   @ raise=2 lower=1
///   0 0  1
///    0 0a 1
///   0 0  2g
///   ```
///
/// `#` names the level, `@` sets the starting power (missing keys are 0).
/// Every other non-blank line is a row of whitespace-separated tokens in
/// odd-r offset layout: odd rows sit half a cell to the right, which the
/// indentation only hints at.
///
/// ## Token legend:
///   `.`   = gap (no tile)
///   `N`   = tile of height N (may be negative)
///   `Na`  = tile of height N, traveler starts here
///   `Ng`  = tile of height N, the goal
///
/// Heights stay within `HEIGHT_LIMIT`. Start and goal must differ.
///
/// ## Pack format (`.hlp`, Hexlift Level Pack):
///   Levels separated by a line containing only `---`. Lines starting with
///   `##` are comments (pack title, author notes).

use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

use crate::config::GameConfig;
use crate::domain::error::GraphError;
use crate::domain::hex::Axial;
use crate::domain::tile::HEIGHT_LIMIT;

/// Runtime level data (owned strings, loaded from file or embedded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelDef {
    pub name: String,
    pub raise: u32,
    pub lower: u32,
    pub tiles: Vec<(Axial, i32)>,
    pub start: Axial,
    pub goal: Axial,
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("line {line}: bad tile token `{token}`")]
    BadToken { line: usize, token: String },
    #[error("line {line}: bad power line `{text}`")]
    BadBudget { line: usize, text: String },
    #[error("line {line}: second `{marker}` marker")]
    DuplicateMarker { line: usize, marker: char },
    #[error("line {line}: start and goal on the same tile")]
    SharedMarker { line: usize },
    #[error("layout has no tiles")]
    Empty,
    #[error("layout has no traveler start (`a`)")]
    MissingStart,
    #[error("layout has no goal (`g`)")]
    MissingGoal,
    #[error("level {index} out of range ({count} available)")]
    NoSuchLevel { index: usize, count: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("could not read {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Every level available to play: the configured directory if it holds any
/// valid level, the embedded set otherwise.
pub fn available_levels(config: &GameConfig) -> Vec<LevelDef> {
    let dir = &config.levels_dir;
    if dir.is_dir() {
        let levels = load_from_directory(dir);
        if !levels.is_empty() {
            debug!("{} levels from {}", levels.len(), dir.display());
            return levels;
        }
    }
    embedded_levels()
}

/// Read one file: a single level or a `---` separated pack.
pub fn load_file(path: &Path) -> Result<Vec<LevelDef>, LevelError> {
    let content = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_pack(&content)
}

// ══════════════════════════════════════════════════════════════
// Pack parsing
// ══════════════════════════════════════════════════════════════

/// Parse all levels of a pack. Sections holding only comments are skipped.
pub fn parse_pack(content: &str) -> Result<Vec<LevelDef>, LevelError> {
    let mut levels = vec![];
    let mut section = String::new();

    for line in content.lines() {
        if line.trim() == "---" {
            flush_section(&section, &mut levels)?;
            section.clear();
            continue;
        }
        section.push_str(line);
        section.push('\n');
    }
    flush_section(&section, &mut levels)?;

    Ok(levels)
}

fn flush_section(section: &str, levels: &mut Vec<LevelDef>) -> Result<(), LevelError> {
    let has_rows = section.lines().any(|l| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with('#') && !t.starts_with('@')
    });
    if has_rows {
        levels.push(parse_level(section)?);
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Single-level parsing
// ══════════════════════════════════════════════════════════════

/// Parse a single level from text content. Line numbers in errors are
/// 1-based within `content`.
pub fn parse_level(content: &str) -> Result<LevelDef, LevelError> {
    let mut name = String::new();
    let mut raise = 0;
    let mut lower = 0;
    let mut tiles = vec![];
    let mut start = None;
    let mut goal = None;
    let mut row = 0;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with("##") {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            if name.is_empty() {
                name = rest.trim().to_string();
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('@') {
            (raise, lower) = parse_budget(rest, line_no)?;
            continue;
        }

        for (col, token) in trimmed.split_whitespace().enumerate() {
            if token == "." {
                continue;
            }
            let pos = Axial::from_offset(col as i32, row);
            let (height, marks) = parse_token(token, line_no)?;
            if marks.contains('a') && marks.contains('g') {
                return Err(LevelError::SharedMarker { line: line_no });
            }
            for mark in marks.chars() {
                let slot = if mark == 'a' { &mut start } else { &mut goal };
                if slot.replace(pos).is_some() {
                    return Err(LevelError::DuplicateMarker { line: line_no, marker: mark });
                }
            }
            tiles.push((pos, height));
        }
        row += 1;
    }

    if tiles.is_empty() {
        return Err(LevelError::Empty);
    }
    let start = start.ok_or(LevelError::MissingStart)?;
    let goal = goal.ok_or(LevelError::MissingGoal)?;

    if name.is_empty() {
        name = "Unnamed Level".to_string();
    }

    Ok(LevelDef { name, raise, lower, tiles, start, goal })
}

/// `raise=N lower=M`, either key optional.
fn parse_budget(text: &str, line: usize) -> Result<(u32, u32), LevelError> {
    let bad = || LevelError::BadBudget { line, text: text.trim().to_string() };
    let mut raise = 0;
    let mut lower = 0;
    for pair in text.split_whitespace() {
        let (key, value) = pair.split_once('=').ok_or_else(bad)?;
        let value: u32 = value.parse().map_err(|_| bad())?;
        match key {
            "raise" => raise = value,
            "lower" => lower = value,
            _ => return Err(bad()),
        }
    }
    Ok((raise, lower))
}

/// Split `-2a` into `(-2, "a")`. Heights beyond `HEIGHT_LIMIT` are refused.
fn parse_token(token: &str, line: usize) -> Result<(i32, &str), LevelError> {
    let bad = || LevelError::BadToken { line, token: token.to_string() };
    let digits = token.trim_end_matches(|c: char| c == 'a' || c == 'g');
    let marks = &token[digits.len()..];
    let height: i32 = digits.parse().map_err(|_| bad())?;
    if height.unsigned_abs() > HEIGHT_LIMIT.unsigned_abs() {
        return Err(bad());
    }
    Ok((height, marks))
}

// ══════════════════════════════════════════════════════════════
// Directory loading (.txt levels and .hlp packs)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("could not list {}: {e}", dir.display());
            return vec![];
        }
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |e| e == "txt" || e == "hlp"))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut levels = vec![];
    for path in files {
        match load_file(&path) {
            Ok(mut defs) => levels.append(&mut defs),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    levels
}

// ══════════════════════════════════════════════════════════════
// Campaign: level progression
// ══════════════════════════════════════════════════════════════

/// Walks a level list in order. Winning moves on; losing or restarting
/// replays the same definition from scratch.
#[derive(Clone, Debug)]
pub struct Campaign {
    levels: Vec<LevelDef>,
    index: usize,
}

impl Campaign {
    pub fn new(levels: Vec<LevelDef>) -> Self {
        Campaign { levels, index: 0 }
    }

    /// Start at level `index` (0-based).
    pub fn starting_at(levels: Vec<LevelDef>, index: usize) -> Result<Self, LevelError> {
        if index >= levels.len() {
            return Err(LevelError::NoSuchLevel { index, count: levels.len() });
        }
        Ok(Campaign { levels, index })
    }

    pub fn levels(&self) -> &[LevelDef] {
        &self.levels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The level being played, or `None` once every level is cleared.
    pub fn current(&self) -> Option<&LevelDef> {
        self.levels.get(self.index)
    }

    /// Move on after a win. Returns the next level, if any.
    pub fn advance(&mut self) -> Option<&LevelDef> {
        if self.index < self.levels.len() {
            self.index += 1;
        }
        self.current()
    }

    /// Same level again, from its layout definition.
    pub fn restart(&self) -> Option<&LevelDef> {
        self.current()
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.levels.len()
    }
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: &str = "\
## Hexlift - built-in levels
---
# Level 1 - Stepping Stone
@ raise=0 lower=1
0a 1 0g
 0 1 0
---
# Level 2 - Sunken Road
@ raise=2 lower=0
0a -2 0g
 . -2 .
---
# Level 3 - Landslide
@ raise=1 lower=1
1a 0 1 0 1g
 -1 -1 -1 -1 -1
---
# Level 4 - Seesaw
@ raise=1 lower=1
1a 2 0 1g
 1 2 0 1
";

pub fn embedded_levels() -> Vec<LevelDef> {
    match parse_pack(EMBEDDED) {
        Ok(levels) => levels,
        Err(e) => {
            warn!("built-in levels are broken: {e}");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::TimingConfig;
    use crate::domain::error::MoveError;
    use crate::domain::tile::MoveDir;
    use crate::sim::event::LevelEvent;
    use crate::sim::step::step;
    use crate::sim::world::{Level, Outcome};

    const TICK: Duration = Duration::from_millis(100);

    fn timing() -> TimingConfig {
        TimingConfig { fail_check_delay_ms: 300, ..TimingConfig::default() }
    }

    fn load(text: &str) -> Level {
        Level::load(&parse_level(text).unwrap(), &timing()).unwrap()
    }

    /// Step until the level ends or `max` ticks pass, collecting every event.
    fn run(level: &mut Level, max: usize) -> Vec<LevelEvent> {
        let mut events = vec![];
        for _ in 0..max {
            events.extend(step(level, TICK));
            if level.outcome() != Outcome::Playing {
                break;
            }
        }
        events
    }

    // ── Parsing ──

    #[test]
    fn parses_name_budget_and_markers() {
        let def = parse_level("# Ridge\n@ raise=2 lower=1\n0 0 0\n 0 0a 1\n0 0 2g\n").unwrap();
        assert_eq!(def.name, "Ridge");
        assert_eq!((def.raise, def.lower), (2, 1));
        assert_eq!(def.tiles.len(), 9);
        assert_eq!(def.start, Axial::from_offset(1, 1));
        assert_eq!(def.goal, Axial::from_offset(2, 2));
        assert!(def.tiles.contains(&(Axial::from_offset(2, 2), 2)));
    }

    #[test]
    fn gaps_and_negative_heights() {
        let def = parse_level("-1a . -3g\n").unwrap();
        assert_eq!(def.tiles, vec![(Axial::new(0, 0), -1), (Axial::new(2, 0), -3)]);
        assert_eq!(def.name, "Unnamed Level");
        assert_eq!((def.raise, def.lower), (0, 0));
    }

    #[test]
    fn rejects_malformed_layouts() {
        assert!(matches!(parse_level("0a x 0g"), Err(LevelError::BadToken { line: 1, .. })));
        assert!(matches!(parse_level("0a 0 0"), Err(LevelError::MissingGoal)));
        assert!(matches!(parse_level("0 0 0g"), Err(LevelError::MissingStart)));
        assert!(matches!(
            parse_level("0a 0a 0g"),
            Err(LevelError::DuplicateMarker { line: 1, marker: 'a' })
        ));
        assert!(matches!(
            parse_level("@ raise=1 jump=2\n0a 0g"),
            Err(LevelError::BadBudget { line: 1, .. })
        ));
        assert!(matches!(parse_level("# Nothing\n"), Err(LevelError::Empty)));
    }

    #[test]
    fn rejects_heights_out_of_range() {
        assert!(matches!(
            parse_level("2147483647a -2147483648 0g"),
            Err(LevelError::BadToken { line: 1, .. })
        ));
        assert!(matches!(
            parse_level("0a -1000001 0g"),
            Err(LevelError::BadToken { line: 1, .. })
        ));
        let def = parse_level("1000000a -1000000 0g").unwrap();
        assert_eq!(def.tiles[1].1, -HEIGHT_LIMIT);
    }

    #[test]
    fn start_and_goal_need_their_own_tiles() {
        assert!(matches!(parse_level("0 0ag 0"), Err(LevelError::SharedMarker { line: 1 })));
        assert!(matches!(parse_level("# Loop\n0 0\n 0ga"), Err(LevelError::SharedMarker { line: 3 })));
    }

    #[test]
    fn pack_splits_on_separator_and_skips_header() {
        let pack = "## My Pack\n## by someone\n---\n# One\n0a 0g\n---\n# Two\n@ raise=1\n0a 1 0g\n";
        let levels = parse_pack(pack).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].name, "One");
        assert_eq!(levels[1].name, "Two");
        assert_eq!(levels[1].raise, 1);
    }

    #[test]
    fn embedded_levels_parse_and_load() {
        let levels = embedded_levels();
        assert_eq!(levels.len(), 4);
        for def in &levels {
            let level = Level::load(def, &timing()).unwrap();
            assert!(!level.is_goal_reachable(), "{} starts solved", def.name);
        }
    }

    #[test]
    fn missing_directory_falls_back_to_embedded() {
        let config = GameConfig {
            levels_dir: "/nonexistent/hexlift/levels".into(),
            ..GameConfig::default()
        };
        assert_eq!(available_levels(&config), embedded_levels());
    }

    // ── Campaign ──

    #[test]
    fn campaign_advances_and_completes() {
        let mut campaign = Campaign::new(embedded_levels());
        assert_eq!(campaign.current().map(|d| d.name.as_str()), Some("Level 1 - Stepping Stone"));
        assert_eq!(campaign.restart().map(|d| d.name.as_str()), Some("Level 1 - Stepping Stone"));
        for _ in 0..3 {
            assert!(campaign.advance().is_some());
        }
        assert!(campaign.advance().is_none());
        assert!(campaign.is_complete());
        assert!(campaign.advance().is_none());
    }

    #[test]
    fn campaign_rejects_out_of_range_start() {
        assert!(matches!(
            Campaign::starting_at(embedded_levels(), 9),
            Err(LevelError::NoSuchLevel { index: 9, count: 4 })
        ));
        assert_eq!(Campaign::starting_at(embedded_levels(), 2).unwrap().index(), 2);
    }

    // ── Scenarios ──

    #[test]
    fn flat_patch_raise_moves_only_the_center() {
        let mut level = load("@ raise=1\n0 0 0 0g\n 0 0 0 0\n0a 0 0 0\n");
        let center = Axial::from_offset(1, 1);
        assert_eq!(level.request_move(center, MoveDir::Up).unwrap(), vec![center]);
        let events = run(&mut level, 8);
        assert!(events.contains(&LevelEvent::TileSettled { position: center, height: 1 }));
        assert_eq!(level.graph().find_tile(center).unwrap().height(), 1);
        for n in level.graph().find_tile(center).unwrap().neighbors().iter().flatten() {
            assert!(!level.graph().adjacent(center, *n));
        }
    }

    #[test]
    fn cascade_notifies_once_per_move() {
        let mut level = load("@ raise=1\n0a 0 1 0 0g\n");
        let members = level.request_move(Axial::new(2, 0), MoveDir::Up).unwrap();
        assert_eq!(members.len(), 3);
        let events = run(&mut level, 20);
        let changes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, LevelEvent::GraphChanged { .. }))
            .collect();
        assert_eq!(changes, vec![&LevelEvent::GraphChanged { revision: 1 }]);
        let settled = events.iter().filter(|e| matches!(e, LevelEvent::TileSettled { .. })).count();
        assert_eq!(settled, 3);
    }

    #[test]
    fn opening_a_route_wins() {
        let mut level = Level::load(&embedded_levels()[0], &timing()).unwrap();
        level.request_move(Axial::new(1, 0), MoveDir::Down).unwrap();
        let events = run(&mut level, 100);

        assert_eq!(level.outcome(), Outcome::Won);
        assert_eq!(events.last(), Some(&LevelEvent::LevelWon));
        assert!(events.contains(&LevelEvent::PathUpdated { revision: 1, waypoints: 3 }));
        assert!(events.contains(&LevelEvent::WaypointReached { position: Axial::new(1, 0) }));
        assert!(events.contains(&LevelEvent::WaypointReached { position: Axial::new(2, 0) }));
        assert!(step(&mut level, TICK).is_empty());
        assert_eq!(level.request_move(Axial::new(1, 0), MoveDir::Down), Err(MoveError::LevelOver));
    }

    #[test]
    fn cascade_then_counter_move_wins() {
        let mut level = Level::load(&embedded_levels()[2], &timing()).unwrap();
        assert_eq!(level.request_move(Axial::new(2, 0), MoveDir::Up).unwrap().len(), 7);
        // A second move waits for the first cascade to settle.
        assert_eq!(
            level.request_move(Axial::new(2, 0), MoveDir::Down),
            Err(MoveError::CascadeInFlight)
        );
        for _ in 0..20 {
            step(&mut level, TICK);
            if level.coordinator().is_idle() {
                break;
            }
        }
        assert!(!level.is_goal_reachable());
        assert_eq!(level.request_move(Axial::new(2, 0), MoveDir::Down).unwrap(), vec![Axial::new(2, 0)]);
        run(&mut level, 200);
        assert_eq!(level.outcome(), Outcome::Won);
    }

    #[test]
    fn stranded_without_power_loses_after_delay() {
        let mut level = load("0a 1 0g\n");
        assert!(step(&mut level, TICK).is_empty());
        assert!(step(&mut level, TICK).is_empty());
        assert_eq!(level.outcome(), Outcome::Playing);
        assert_eq!(step(&mut level, TICK), vec![LevelEvent::LevelLost]);
        assert_eq!(level.outcome(), Outcome::Lost);
        assert!(level.request_move(Axial::new(1, 0), MoveDir::Down).is_err());
    }

    #[test]
    fn spending_the_last_move_on_a_dead_end_loses() {
        let mut level = load("@ raise=1\n0a 1 0g\n");
        level.request_move(Axial::new(1, 0), MoveDir::Up).unwrap();
        let events = run(&mut level, 50);
        assert_eq!(level.outcome(), Outcome::Lost);
        // The lose check waits for the cascade and then the grace period.
        let changed = events.iter().position(|e| matches!(e, LevelEvent::GraphChanged { .. }));
        let lost = events.iter().position(|e| *e == LevelEvent::LevelLost);
        assert!(changed < lost);
    }

    #[test]
    fn cutting_the_only_route_strands_the_traveler() {
        let mut level = load("@ raise=1\n0a 0 0g\n");
        assert!(level.is_goal_reachable());
        level.request_move(Axial::new(1, 0), MoveDir::Up).unwrap();
        let events = run(&mut level, 50);

        assert!(events.contains(&LevelEvent::PathUpdated { revision: 1, waypoints: 0 }));
        assert!(level.agent().active_path().is_empty());
        assert_eq!(level.agent().current_tile(), Axial::new(0, 0));
        assert_eq!(level.outcome(), Outcome::Lost);
    }

    #[test]
    fn traveler_waits_beside_a_moving_tile() {
        let slow = TimingConfig { tile_speed: 0.5, ..timing() };
        let def = parse_level("@ raise=1\n0a 0 0 0g\n").unwrap();
        let mut level = Level::load(&def, &slow).unwrap();
        let next = Axial::new(1, 0);
        level.request_move(next, MoveDir::Up).unwrap();

        let events = run(&mut level, 8);
        assert!(level.graph().find_tile(next).unwrap().is_moving());
        assert_eq!(level.agent().current_tile(), Axial::new(0, 0));
        assert!(!events.contains(&LevelEvent::WaypointReached { position: next }));
        assert!(!level.graph().find_tile(level.agent().current_tile()).unwrap().is_moving());

        run(&mut level, 40);
        assert_eq!(level.agent().current_tile(), Axial::new(0, 0));
        assert!(level.agent().active_path().is_empty());
    }

    #[test]
    fn power_left_never_loses() {
        let mut level = load("@ lower=1\n0a 1 0g\n");
        run(&mut level, 50);
        assert_eq!(level.outcome(), Outcome::Playing);
    }
}
