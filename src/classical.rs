use log::debug;

use crate::board::Board;
use crate::error::EngineError;
use crate::evaluate;
use crate::types::{Coord, Player};
use crate::GomokuAI;

/// One-ply pattern engine: immediate win, then immediate block, then the
/// candidate with the best combined attack/defense score.
#[derive(Default)]
pub struct ClassicalEngine;

impl ClassicalEngine {
  pub fn new() -> Self {
    Self
  }
}

impl GomokuAI for ClassicalEngine {
  fn choose(&self, board: &Board, player: Player) -> Result<Coord, EngineError> {
    choose_move(board, player)
  }
}

fn better(score: i64, coord: Coord, best: &mut Option<(i64, Coord)>) {
  let replace = match best {
    None => true,
    Some((s, c)) => {
      score > *s || (score == *s && (coord.x, coord.y) < (c.x, c.y))
    }
  };
  if replace {
    *best = Some((score, coord));
  }
}

pub(crate) fn choose_move(board: &Board, player: Player) -> Result<Coord, EngineError> {
  let center = Coord {
    x: board.size() / 2,
    y: board.size() / 2,
  };
  if board.stone_count() == 0 {
    return Ok(center);
  }

  let candidates = evaluate::candidate_moves(board);
  if candidates.is_empty() {
    return first_empty(board).ok_or(EngineError::NoMove);
  }

  let opponent = player.other();
  let mut best_win: Option<(i64, Coord)> = None;
  let mut best_block: Option<(i64, Coord)> = None;
  let mut best_combined: Option<(i64, Coord)> = None;

  for &coord in &candidates {
    let attack = i64::from(evaluate::evaluate_move(board, coord, player));
    let defense = i64::from(evaluate::evaluate_move(board, coord, opponent));
    // 1.1 * attack + defense, scaled by 10 to stay in integers
    let combined = 11 * attack + 10 * defense;

    if board.makes_five(coord.x, coord.y, player) {
      better(attack, coord, &mut best_win);
    }
    if board.makes_five(coord.x, coord.y, opponent) {
      better(defense, coord, &mut best_block);
    }
    better(combined, coord, &mut best_combined);
  }

  if let Some((_, coord)) = best_win {
    debug!("classical: winning move ({}, {})", coord.x, coord.y);
    return Ok(coord);
  }
  if let Some((_, coord)) = best_block {
    debug!("classical: blocking move ({}, {})", coord.x, coord.y);
    return Ok(coord);
  }
  let (score, coord) = best_combined.ok_or(EngineError::NoMove)?;
  debug!("classical: best move ({}, {}) score {}", coord.x, coord.y, score);
  Ok(coord)
}

fn first_empty(board: &Board) -> Option<Coord> {
  for x in 0..board.size() {
    for y in 0..board.size() {
      if board.is_empty(x, y) {
        return Some(Coord { x, y });
      }
    }
  }
  None
}
