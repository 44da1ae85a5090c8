//! Standings calculator: ranking order, folding results, recompute from scratch.

use crate::models::{CompetitorId, EngineError, Entrant, GameMatch, Standing, BYE_SCORE};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Points for a match win.
pub const POINTS_PER_WIN: i64 = 3;

/// Ranking order, best first.
///
/// points, match wins, game wins, fewer game losses, fewer match losses, round record,
/// Buchholz. Anything still equal compares `Equal` so a stable sort keeps seed order.
pub fn compare_standings(a: &Standing, b: &Standing) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.match_wins.cmp(&a.match_wins))
        .then_with(|| b.game_wins.cmp(&a.game_wins))
        .then_with(|| a.game_losses.cmp(&b.game_losses))
        .then_with(|| a.match_losses.cmp(&b.match_losses))
        .then_with(|| compare_round_record(a, b))
        .then_with(|| b.buchholz.cmp(&a.buchholz))
}

/// A competitor with no rounds lost ranks above one with any, whatever the differential.
fn compare_round_record(a: &Standing, b: &Standing) -> Ordering {
    match (a.rounds_lost == 0, b.rounds_lost == 0) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.round_differential().cmp(&a.round_differential()),
    }
}

/// Sort into ranking order with seed order as the tie base.
pub fn rank(standings: &mut [Standing]) {
    standings.sort_by_key(|s| s.seed);
    standings.sort_by(compare_standings);
}

fn index_of(standings: &[Standing], competitor: CompetitorId) -> Result<usize, EngineError> {
    standings
        .iter()
        .position(|s| s.competitor == competitor)
        .ok_or(EngineError::MissingStanding(competitor))
}

/// Fold one finished match into the standings. Buchholz is not touched; call
/// [`refresh_buchholz`] once after a batch of folds.
pub fn apply_match(standings: &mut [Standing], game: &GameMatch) -> Result<(), EngineError> {
    if !game.completed {
        return Err(EngineError::Inconsistent(format!(
            "match {} folded into standings before completion",
            game.id
        )));
    }
    match (game.slot_a, game.slot_b) {
        (Some(Entrant::Team(c)), Some(Entrant::Bye)) | (Some(Entrant::Bye), Some(Entrant::Team(c))) => {
            let i = index_of(standings, c)?;
            let s = &mut standings[i];
            s.points += POINTS_PER_WIN;
            s.match_wins += 1;
            s.game_wins += BYE_SCORE.0;
            s.game_losses += BYE_SCORE.1;
            s.opponents.push(Entrant::Bye);
            Ok(())
        }
        (Some(Entrant::Team(a)), Some(Entrant::Team(b))) => {
            let ia = index_of(standings, a)?;
            let ib = index_of(standings, b)?;
            standings[ia].opponents.push(Entrant::Team(b));
            standings[ib].opponents.push(Entrant::Team(a));
            if game.forfeited {
                standings[ia].match_draws += 1;
                standings[ib].match_draws += 1;
                return Ok(());
            }
            apply_played(standings, game, ia, ib)
        }
        _ => Err(EngineError::Inconsistent(format!(
            "match {} completed without two entrants",
            game.id
        ))),
    }
}

fn apply_played(standings: &mut [Standing], game: &GameMatch, ia: usize, ib: usize) -> Result<(), EngineError> {
    let winner = game
        .winner
        .ok_or_else(|| EngineError::Inconsistent(format!("match {} completed without a winner", game.id)))?;
    let (iw, il) = if winner == standings[ia].competitor {
        (ia, ib)
    } else if winner == standings[ib].competitor {
        (ib, ia)
    } else {
        return Err(EngineError::Inconsistent(format!(
            "winner {} of match {} is not one of its competitors",
            winner, game.id
        )));
    };
    standings[iw].points += POINTS_PER_WIN;
    standings[iw].match_wins += 1;
    standings[il].match_losses += 1;

    if game.admin_override {
        return Ok(());
    }
    if game.maps.is_empty() {
        // The match's own scores count as one game.
        standings[iw].game_wins += 1;
        standings[il].game_losses += 1;
        add_rounds(standings, ia, ib, game.score_a, game.score_b);
    } else {
        for map in &game.maps {
            match map.score_a.cmp(&map.score_b) {
                Ordering::Greater => {
                    standings[ia].game_wins += 1;
                    standings[ib].game_losses += 1;
                }
                Ordering::Less => {
                    standings[ib].game_wins += 1;
                    standings[ia].game_losses += 1;
                }
                Ordering::Equal => {}
            }
            add_rounds(standings, ia, ib, map.score_a, map.score_b);
        }
    }
    Ok(())
}

fn add_rounds(standings: &mut [Standing], ia: usize, ib: usize, score_a: u32, score_b: u32) {
    standings[ia].rounds_won += score_a;
    standings[ia].rounds_lost += score_b;
    standings[ib].rounds_won += score_b;
    standings[ib].rounds_lost += score_a;
}

/// Recompute every Buchholz score from current points.
pub fn refresh_buchholz(standings: &mut [Standing]) -> Result<(), EngineError> {
    let points: HashMap<CompetitorId, i64> = standings.iter().map(|s| (s.competitor, s.points)).collect();
    for s in standings.iter_mut() {
        let mut total: i64 = 0;
        for opponent in &s.opponents {
            if let Entrant::Team(id) = opponent {
                total += *points.get(id).ok_or(EngineError::MissingStanding(*id))?;
            }
        }
        s.buchholz = total;
    }
    Ok(())
}

/// Zero `standings` and fold every completed match in `(round, ordinal)` order.
///
/// This is the single source of truth for standings: incremental updates must agree with it.
pub fn recompute(standings: &mut [Standing], matches: &[GameMatch]) -> Result<(), EngineError> {
    for s in standings.iter_mut() {
        s.reset();
    }
    let mut finished: Vec<&GameMatch> = matches.iter().filter(|m| m.completed).collect();
    finished.sort_by_key(|m| (m.round, m.ordinal));
    for game in finished {
        apply_match(standings, game)?;
    }
    refresh_buchholz(standings)
}
