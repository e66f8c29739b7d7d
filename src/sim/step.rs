/// The step function: advances a level by one tick of `dt`.
///
/// Processing order:
///   1. Events queued by player moves since the last step
///   2. Cascade progress (tile motion, settling, the single graph notification)
///   3. Traveler replanning (one per notification received)
///   4. Traveler movement (waits while the next tile is mid-move)
///   5. Win check
///   6. Lose check (power exhausted, terrain settled, grace period elapsed)
///
/// Replanning runs after the cascade in the same tick, so a route opened by
/// the last settling tile is walked without a frame of delay.

use std::time::Duration;

use log::{info, warn};

use crate::domain::path::find_path;
use super::agent::AgentStep;
use super::event::LevelEvent;
use super::world::{Level, Outcome};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(level: &mut Level, dt: Duration) -> Vec<LevelEvent> {
    if level.outcome != Outcome::Playing { return vec![]; }

    let mut events = std::mem::take(&mut level.pending);
    level.tick += 1;

    resolve_cascade(level, dt, &mut events);
    resolve_replan(level, &mut events);
    resolve_agent(level, dt, &mut events);
    if resolve_win(level, &mut events) { return events; }
    resolve_lose(level, dt, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// Cascade
// ══════════════════════════════════════════════════════════════

fn resolve_cascade(level: &mut Level, dt: Duration, events: &mut Vec<LevelEvent>) {
    let progress = match level.coordinator.advance(&mut level.graph, dt) {
        Ok(p) => p,
        Err(e) => {
            // Retried next tick from the Settling phase.
            warn!("cascade could not complete: {e}");
            return;
        }
    };
    for (position, height) in progress.settled {
        events.push(LevelEvent::TileSettled { position, height });
    }
    if let Some(revision) = progress.revision {
        events.push(LevelEvent::GraphChanged { revision });
    }
}

// ══════════════════════════════════════════════════════════════
// Traveler
// ══════════════════════════════════════════════════════════════

fn resolve_replan(level: &mut Level, events: &mut Vec<LevelEvent>) {
    if let Some(revision) = level.agent.sync(&level.graph) {
        events.push(LevelEvent::PathUpdated {
            revision,
            waypoints: level.agent.active_path().len(),
        });
    }
}

fn resolve_agent(level: &mut Level, dt: Duration, events: &mut Vec<LevelEvent>) {
    match level.agent.advance(&level.graph, dt) {
        AgentStep::Reached(position) => events.push(LevelEvent::WaypointReached { position }),
        AgentStep::Arrived => events.push(LevelEvent::WaypointReached {
            position: level.agent.current_tile(),
        }),
        AgentStep::Walking | AgentStep::Holding | AgentStep::Stranded => {}
    }
}

// ══════════════════════════════════════════════════════════════
// Win / lose
// ══════════════════════════════════════════════════════════════

fn resolve_win(level: &mut Level, events: &mut Vec<LevelEvent>) -> bool {
    if !level.agent.has_arrived() { return false; }
    level.outcome = Outcome::Won;
    info!("{}: won after {} ticks", level.name, level.tick);
    events.push(LevelEvent::LevelWon);
    true
}

/// Runs the route check once: nothing can change the terrain afterwards.
fn resolve_lose(level: &mut Level, dt: Duration, events: &mut Vec<LevelEvent>) {
    if level.fail_checked { return; }
    if !level.budget.is_exhausted() || !level.coordinator.is_idle() {
        level.exhausted_for = Duration::ZERO;
        return;
    }

    level.exhausted_for += dt;
    if level.exhausted_for < level.fail_check_delay { return; }

    level.fail_checked = true;
    let route = find_path(&level.graph, level.agent.current_tile(), level.agent.target_tile());
    if route.is_empty() {
        level.outcome = Outcome::Lost;
        info!("{}: lost, no route to the goal and no power left", level.name);
        events.push(LevelEvent::LevelLost);
    }
}
