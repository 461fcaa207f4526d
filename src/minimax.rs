//! Depth-limited alpha-beta search with a Zobrist-hashed transposition
//! table and incremental pattern evaluation.
//!
//! The search works on a signed grid relative to the engine: `1` is the
//! engine's stone, `-1` the opponent's, `0` empty. The running board value
//! is positive when the engine stands better and is updated by pattern
//! deltas on make/unmake instead of re-scoring the whole board.

use std::collections::HashSet;

use lazy_static::lazy_static;
use log::debug;

use crate::board::{Board, ZOBRIST_TABLE};
use crate::error::EngineError;
use crate::evaluate;
use crate::types::{Coord, MinimaxConfig, Player};
use crate::GomokuAI;

const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

const INF: i64 = i64::MAX / 2;

lazy_static! {
  static ref PATTERN_DICT: Vec<(Vec<i8>, i32)> = create_pattern_dict();
}

// Signed pattern dictionary over {1, 0, -1}: one entry set per side, the
// score carries the side's sign.
fn create_pattern_dict() -> Vec<(Vec<i8>, i32)> {
  let mut dict: Vec<(Vec<i8>, i32)> = Vec::new();
  for sign in [1i8, -1] {
    let x = sign;
    let y = -sign;
    let s = sign as i32;
    let mut push = |cells: Vec<i8>, score: i32| dict.push((cells, score * s));
    // five
    push(vec![x, x, x, x, x], 1_000_000);
    // live four
    push(vec![0, x, x, x, x, 0], 30_000);
    push(vec![0, x, x, x, 0, x, 0], 20_000);
    push(vec![0, x, 0, x, x, x, 0], 20_000);
    push(vec![0, x, x, 0, x, x, 0], 20_000);
    // four with one open end
    push(vec![0, x, x, x, x, y], 10_000);
    push(vec![y, x, x, x, x, 0], 10_000);
    // dead four
    push(vec![y, x, x, x, x, y], 100);
    // live three
    push(vec![0, x, x, x, 0], 7_000);
    push(vec![0, x, 0, x, x, 0], 7_000);
    push(vec![0, x, x, 0, x, 0], 7_000);
    // sleeping three
    push(vec![0, 0, x, x, x, y], 100);
    push(vec![y, x, x, x, 0, 0], 100);
    push(vec![0, x, 0, x, x, y], 100);
    push(vec![y, x, x, 0, x, 0], 100);
    push(vec![0, x, x, 0, x, y], 100);
    push(vec![y, x, 0, x, x, 0], 100);
    push(vec![x, 0, 0, x, x], 100);
    push(vec![x, x, 0, 0, x], 100);
    push(vec![x, 0, x, 0, x], 100);
    push(vec![y, 0, x, x, x, 0, y], 100);
    // dead three
    push(vec![y, x, x, x, y], 10);
    // live two
    push(vec![0, 0, x, x, 0], 100);
    push(vec![0, x, x, 0, 0], 100);
    push(vec![0, x, 0, x, 0], 100);
    push(vec![0, x, 0, 0, x, 0], 100);
    // sleeping two
    push(vec![0, 0, 0, x, x, y], 10);
    push(vec![y, x, x, 0, 0, 0], 10);
    push(vec![0, 0, x, 0, x, y], 10);
    push(vec![y, x, 0, x, 0, 0], 10);
    push(vec![0, x, 0, 0, x, y], 10);
    push(vec![y, x, 0, 0, x, 0], 10);
    push(vec![x, 0, 0, 0, x], 10);
    push(vec![y, 0, x, 0, x, 0, y], 10);
    push(vec![y, 0, x, x, 0, 0, y], 10);
    push(vec![y, 0, 0, x, x, 0, y], 10);
    // dead two
    push(vec![y, x, x, y], 1);
  }
  dict
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TtFlag {
  Exact,
  LowerBound,
  UpperBound,
}

#[derive(Clone, Copy)]
struct TtEntry {
  hash: u64,
  depth: u8,
  score: i64,
  flag: TtFlag,
}

// Fixed-size transposition table with depth-preferred replacement.
struct TranspositionTable {
  entries: Vec<Option<TtEntry>>,
}

impl TranspositionTable {
  fn new(capacity: usize) -> Self {
    Self {
      entries: vec![None; capacity.max(1)],
    }
  }

  fn probe(&self, hash: u64, depth: u8) -> Option<TtEntry> {
    let index = (hash as usize) % self.entries.len();
    match self.entries[index] {
      Some(entry) if entry.hash == hash && entry.depth >= depth => Some(entry),
      _ => None,
    }
  }

  fn store(&mut self, hash: u64, depth: u8, score: i64, flag: TtFlag) {
    let index = (hash as usize) % self.entries.len();
    let should_replace = match &self.entries[index] {
      None => true,
      Some(existing) => depth >= existing.depth,
    };
    if should_replace {
      self.entries[index] = Some(TtEntry {
        hash,
        depth,
        score,
        flag,
      });
    }
  }
}

pub struct MinimaxEngine {
  config: MinimaxConfig,
}

impl MinimaxEngine {
  pub fn new(config: MinimaxConfig) -> Self {
    Self { config }
  }
}

impl GomokuAI for MinimaxEngine {
  fn choose(&self, board: &Board, player: Player) -> Result<Coord, EngineError> {
    let center = Coord {
      x: board.size() / 2,
      y: board.size() / 2,
    };
    if board.stone_count() == 0 {
      return Ok(center);
    }
    if let Some(forced) = evaluate::urgent_move(board, player) {
      debug!("minimax: forced move ({}, {})", forced.x, forced.y);
      return Ok(forced);
    }

    let mut search = Search::new(board, player, self.config);
    match search.search_root(self.config.depth.max(1)) {
      Some(best) => Ok(best),
      None => first_empty(board).ok_or(EngineError::NoMove),
    }
  }
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

struct BoundDelta {
  was_member: bool,
  added: Vec<Coord>,
}

struct Search {
  size: usize,
  grid: Vec<i8>,
  work: Board,
  ai: Player,
  bound: HashSet<Coord>,
  board_value: i64,
  hash: u64,
  tt: TranspositionTable,
  nodes: u64,
}

impl Search {
  fn new(board: &Board, ai: Player, config: MinimaxConfig) -> Self {
    let size = board.size();
    let mut grid = vec![0i8; size * size];
    let mut hash = 0u64;
    for x in 0..size {
      for y in 0..size {
        if let Some(player) = board.get(x, y) {
          let stone: i8 = if player == ai { 1 } else { -1 };
          grid[x * size + y] = stone;
          hash ^= zobrist_for(x * size + y, stone);
        }
      }
    }

    // Bound set: empty cells adjacent (Chebyshev <= 1) to any stone.
    let mut bound = HashSet::new();
    for x in 0..size {
      for y in 0..size {
        if grid[x * size + y] == 0 {
          continue;
        }
        for dx in -1i32..=1 {
          for dy in -1i32..=1 {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0
              && ny >= 0
              && (nx as usize) < size
              && (ny as usize) < size
              && grid[nx as usize * size + ny as usize] == 0
            {
              bound.insert(Coord {
                x: nx as usize,
                y: ny as usize,
              });
            }
          }
        }
      }
    }

    let mut search = Self {
      size,
      grid,
      work: board.clone(),
      ai,
      bound,
      board_value: 0,
      hash,
      tt: TranspositionTable::new(config.table_capacity),
      nodes: 0,
    };
    search.board_value = search.full_value();
    search
  }

  fn at(&self, x: usize, y: usize) -> i8 {
    self.grid[x * self.size + y]
  }

  // Absolute value of the starting position; later positions are reached
  // by pattern deltas only.
  fn full_value(&self) -> i64 {
    let mut value = 0i64;
    for &(ref pattern, score) in PATTERN_DICT.iter() {
      for x in 0..self.size {
        for y in 0..self.size {
          for (dx, dy) in DIRECTIONS {
            if self.window_matches(x as i32, y as i32, dx, dy, pattern, None) {
              value += i64::from(score);
            }
          }
        }
      }
    }
    value
  }

  // Does `pattern` lie at (sx, sy) along (dx, dy)? With `probe`, the cell
  // at the given coordinate reads as the given stone instead of the grid.
  fn window_matches(
    &self,
    sx: i32,
    sy: i32,
    dx: i32,
    dy: i32,
    pattern: &[i8],
    probe: Option<(Coord, i8)>,
  ) -> bool {
    for (k, &want) in pattern.iter().enumerate() {
      let cx = sx + k as i32 * dx;
      let cy = sy + k as i32 * dy;
      if cx < 0 || cy < 0 || cx as usize >= self.size || cy as usize >= self.size {
        return false;
      }
      let mut cell = self.at(cx as usize, cy as usize);
      if let Some((c, value)) = probe {
        if c.x == cx as usize && c.y == cy as usize {
          cell = value;
        }
      }
      if cell != want {
        return false;
      }
    }
    true
  }

  // Score change from placing `stone` at `c`: every pattern window through
  // the cell is counted before and after.
  fn pattern_delta(&self, c: Coord, stone: i8) -> i64 {
    let mut delta = 0i64;
    for &(ref pattern, score) in PATTERN_DICT.iter() {
      let len = pattern.len() as i32;
      for (dx, dy) in DIRECTIONS {
        for offset in (1 - len)..=0 {
          let sx = c.x as i32 + offset * dx;
          let sy = c.y as i32 + offset * dy;
          let before = self.window_matches(sx, sy, dx, dy, pattern, Some((c, 0)));
          let after = self.window_matches(sx, sy, dx, dy, pattern, Some((c, stone)));
          if after && !before {
            delta += i64::from(score);
          } else if before && !after {
            delta -= i64::from(score);
          }
        }
      }
    }
    delta
  }

  fn make(&mut self, c: Coord, stone: i8, delta: i64) -> BoundDelta {
    let player = if stone == 1 { self.ai } else { self.ai.other() };
    self.grid[c.x * self.size + c.y] = stone;
    self.work.set(c.x, c.y, player);
    self.hash ^= zobrist_for(c.x * self.size + c.y, stone);
    self.board_value += delta;

    let was_member = self.bound.remove(&c);
    let mut added = Vec::new();
    for dx in -1i32..=1 {
      for dy in -1i32..=1 {
        let nx = c.x as i32 + dx;
        let ny = c.y as i32 + dy;
        if nx >= 0
          && ny >= 0
          && (nx as usize) < self.size
          && (ny as usize) < self.size
          && self.at(nx as usize, ny as usize) == 0
        {
          let coord = Coord {
            x: nx as usize,
            y: ny as usize,
          };
          if self.bound.insert(coord) {
            added.push(coord);
          }
        }
      }
    }
    BoundDelta { was_member, added }
  }

  fn unmake(&mut self, c: Coord, stone: i8, delta: i64, bound_delta: BoundDelta) {
    for coord in bound_delta.added {
      self.bound.remove(&coord);
    }
    if bound_delta.was_member {
      self.bound.insert(c);
    }
    self.grid[c.x * self.size + c.y] = 0;
    self.work.clear_cell(c.x, c.y);
    self.hash ^= zobrist_for(c.x * self.size + c.y, stone);
    self.board_value -= delta;
  }

  fn five_at(&self, c: Coord, stone: i8) -> bool {
    for (dx, dy) in DIRECTIONS {
      let mut count = 1;
      for dir in [1i32, -1] {
        let mut step = 1;
        loop {
          let cx = c.x as i32 + dir * step * dx;
          let cy = c.y as i32 + dir * step * dy;
          if cx < 0 || cy < 0 || cx as usize >= self.size || cy as usize >= self.size {
            break;
          }
          if self.at(cx as usize, cy as usize) != stone {
            break;
          }
          count += 1;
          step += 1;
        }
      }
      if count >= 5 {
        return true;
      }
    }
    false
  }

  fn ranked_candidates(&self, maximizing: bool) -> Vec<(i32, Coord)> {
    let side = if maximizing { self.ai } else { self.ai.other() };
    let mut scored: Vec<(i32, Coord)> = self
      .bound
      .iter()
      .map(|&c| (evaluate::evaluate_move(&self.work, c, side), c))
      .collect();
    evaluate::sort_scored(&mut scored);
    scored
  }

  fn search_root(&mut self, depth: u8) -> Option<Coord> {
    let candidates = self.ranked_candidates(true);
    let mut alpha = -INF;
    let beta = INF;
    let mut best: Option<(i64, Coord)> = None;

    for (_, c) in candidates {
      let delta = self.pattern_delta(c, 1);
      let bound_delta = self.make(c, 1, delta);
      let value = self.alpha_beta(depth - 1, alpha, beta, false, (c, 1));
      self.unmake(c, 1, delta, bound_delta);

      // Candidates come pre-sorted with the deterministic tie-break, so
      // only a strictly better value replaces the incumbent.
      if best.map_or(true, |(v, _)| value > v) {
        best = Some((value, c));
      }
      alpha = alpha.max(value);
    }

    debug!(
      "minimax: depth {} searched {} nodes, best {:?}",
      depth, self.nodes, best
    );
    best.map(|(_, c)| c)
  }

  fn alpha_beta(
    &mut self,
    depth: u8,
    mut alpha: i64,
    mut beta: i64,
    maximizing: bool,
    last: (Coord, i8),
  ) -> i64 {
    self.nodes += 1;

    let (last_coord, last_stone) = last;
    if self.five_at(last_coord, last_stone) {
      // The five pattern dominates the incremental value
      return self.board_value;
    }
    if depth == 0 {
      return self.board_value;
    }

    let original_alpha = alpha;
    let original_beta = beta;
    if let Some(entry) = self.tt.probe(self.hash, depth) {
      match entry.flag {
        TtFlag::Exact => return entry.score,
        TtFlag::LowerBound => alpha = alpha.max(entry.score),
        TtFlag::UpperBound => beta = beta.min(entry.score),
      }
      if alpha >= beta {
        return entry.score;
      }
    }

    let candidates = self.ranked_candidates(maximizing);
    if candidates.is_empty() {
      return self.board_value;
    }

    let stone: i8 = if maximizing { 1 } else { -1 };
    let mut best = if maximizing { -INF } else { INF };

    for (_, c) in candidates {
      let delta = self.pattern_delta(c, stone);
      let bound_delta = self.make(c, stone, delta);
      let value = self.alpha_beta(depth - 1, alpha, beta, !maximizing, (c, stone));
      self.unmake(c, stone, delta, bound_delta);

      if maximizing {
        best = best.max(value);
        alpha = alpha.max(value);
      } else {
        best = best.min(value);
        beta = beta.min(value);
      }
      if beta <= alpha {
        break;
      }
    }

    let flag = if best <= original_alpha {
      TtFlag::UpperBound
    } else if best >= original_beta {
      TtFlag::LowerBound
    } else {
      TtFlag::Exact
    };
    self.tt.store(self.hash, depth, best, flag);

    best
  }
}

fn zobrist_for(index: usize, stone: i8) -> u64 {
  let slot = if stone == 1 { 0 } else { 1 };
  ZOBRIST_TABLE[index][slot]
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::board::Board;
  use crate::types::Player;

  fn board_with(moves: &[(usize, usize, Player)]) -> Board {
    let mut board = Board::new();
    for &(x, y, player) in moves {
      board.place(x, y, player).unwrap();
    }
    board
  }

  fn engine(depth: u8) -> MinimaxEngine {
    MinimaxEngine::new(MinimaxConfig {
      depth,
      table_capacity: 1 << 14,
    })
  }

  #[test]
  fn empty_board_opens_at_centre() {
    let mv = engine(3).choose(&Board::new(), Player::Black).unwrap();
    assert_eq!(mv, Coord { x: 7, y: 7 });
  }

  #[test]
  fn completes_own_five() {
    let board = board_with(&[
      (7, 7, Player::Black),
      (6, 7, Player::White),
      (7, 8, Player::Black),
      (6, 8, Player::White),
      (7, 9, Player::Black),
      (6, 9, Player::White),
      (7, 10, Player::Black),
    ]);
    let mv = engine(3).choose(&board, Player::Black).unwrap();
    assert!(mv == Coord { x: 7, y: 6 } || mv == Coord { x: 7, y: 11 });
  }

  #[test]
  fn blocks_opponent_open_four() {
    let board = board_with(&[
      (7, 7, Player::Black),
      (6, 7, Player::White),
      (8, 8, Player::Black),
      (6, 8, Player::White),
      (9, 9, Player::Black),
      (6, 9, Player::White),
      (10, 10, Player::Black),
    ]);
    let mv = engine(3).choose(&board, Player::White).unwrap();
    assert!(mv == Coord { x: 6, y: 6 } || mv == Coord { x: 11, y: 11 });
  }

  #[test]
  fn answers_an_open_three() {
    // Black has an open three; White must respond to it or build a bigger
    // threat of its own. With an otherwise quiet board only the block makes
    // sense at depth 2.
    let board = board_with(&[
      (7, 6, Player::Black),
      (0, 0, Player::White),
      (7, 7, Player::Black),
      (0, 1, Player::White),
      (7, 8, Player::Black),
    ]);
    let mv = engine(2).choose(&board, Player::White).unwrap();
    assert!(
      mv == Coord { x: 7, y: 5 } || mv == Coord { x: 7, y: 9 },
      "expected a block at (7,5) or (7,9), got ({}, {})",
      mv.x,
      mv.y
    );
  }

  #[test]
  fn deterministic_across_runs() {
    let board = board_with(&[
      (7, 7, Player::Black),
      (8, 8, Player::White),
      (7, 9, Player::Black),
    ]);
    let first = engine(3).choose(&board, Player::White).unwrap();
    for _ in 0..3 {
      assert_eq!(engine(3).choose(&board, Player::White).unwrap(), first);
    }
  }

  #[test]
  fn pattern_delta_round_trips_with_unmake() {
    let board = board_with(&[(7, 7, Player::Black), (8, 8, Player::White)]);
    let mut search = Search::new(&board, Player::Black, MinimaxConfig::default());
    let initial_value = search.board_value;
    let initial_hash = search.hash;
    let initial_bound = search.bound.clone();

    let c = Coord { x: 7, y: 8 };
    let delta = search.pattern_delta(c, 1);
    let bound_delta = search.make(c, 1, delta);
    assert_ne!(search.hash, initial_hash);
    search.unmake(c, 1, delta, bound_delta);

    assert_eq!(search.board_value, initial_value);
    assert_eq!(search.hash, initial_hash);
    assert_eq!(search.bound, initial_bound);
  }

  #[test]
  fn incremental_value_matches_full_rescan() {
    let board = board_with(&[(7, 7, Player::Black), (8, 8, Player::White)]);
    let mut search = Search::new(&board, Player::Black, MinimaxConfig::default());

    let c = Coord { x: 7, y: 8 };
    let delta = search.pattern_delta(c, 1);
    let bound_delta = search.make(c, 1, delta);
    assert_eq!(search.board_value, search.full_value());
    search.unmake(c, 1, delta, bound_delta);
    assert_eq!(search.board_value, search.full_value());
  }

  #[test]
  fn five_on_the_grid_is_recognized() {
    let board = board_with(&[
      (3, 3, Player::Black),
      (0, 0, Player::White),
      (3, 4, Player::Black),
      (0, 1, Player::White),
      (3, 5, Player::Black),
      (0, 2, Player::White),
      (3, 6, Player::Black),
      (0, 3, Player::White),
      (3, 7, Player::Black),
    ]);
    let search = Search::new(&board, Player::Black, MinimaxConfig::default());
    assert!(search.five_at(Coord { x: 3, y: 5 }, 1));
    assert!(!search.five_at(Coord { x: 0, y: 1 }, -1));
  }
}
