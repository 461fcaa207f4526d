//! Pattern evaluation: scores the value of placing a stone on an empty
//! cell from line patterns around it, for both attack and defense.

use crate::board::Board;
use crate::types::{Coord, Player};

/// A score at or above this completes five in a row.
pub const WIN_THRESHOLD: i32 = 1_000_000;

pub const DOUBLE_THREE_BONUS: i32 = 15_000;
pub const DOUBLE_FOUR_BONUS: i32 = 200_000;

// 横、竖、两条对角线
const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Search neighbourhood: empty cells within this Chebyshev distance of a
/// stone are move candidates.
pub const CANDIDATE_RADIUS: i32 = 2;

// Windows are 9 cells: 4 back, the candidate itself, 4 forward.
// O = own stone, _ = empty, X = opponent stone or wall.
const WINDOW: usize = 9;

const ATTACK_PATTERNS: &[(&[u8], i32)] = &[
  // five
  (b"OOOOO", 1_000_000),
  // open four
  (b"_OOOO_", 100_000),
  // closed four
  (b"XOOOO_", 10_000),
  (b"_OOOOX", 10_000),
  // open three
  (b"_OOO_", 5_000),
  (b"__OOO__", 8_000),
  // closed three, including broken shapes
  (b"XOOO_", 1_000),
  (b"_OOOX", 1_000),
  (b"XO_OO_", 800),
  (b"_OO_OX", 800),
  // open two
  (b"_OO_", 200),
  (b"__OO__", 300),
  // closed two
  (b"XOO_", 50),
  (b"_OOX", 50),
];

// Opponent threats the move would block. Encoded from the opponent's
// perspective, so the shapes read as O-runs here as well; magnitudes are
// roughly halved because a blocked threat is recounted on the opponent's
// next evaluation.
const DEFENSE_PATTERNS: &[(&[u8], i32)] = &[
  (b"OOOOO", 500_000),
  (b"_OOOO_", 50_000),
  (b"XOOOO_", 10_000),
  (b"_OOOOX", 10_000),
  (b"_OOO_", 5_000),
  (b"__OOO__", 8_000),
  (b"XOOO_", 1_000),
  (b"_OOOX", 1_000),
];

fn contains(window: &[u8], pattern: &[u8]) -> bool {
  window.windows(pattern.len()).any(|w| w == pattern)
}

// Encode one axis around (x, y) as seen by `player`, with the candidate
// cell itself counted as an own stone. Off-board cells encode as walls.
fn line_window(board: &Board, x: usize, y: usize, dx: i32, dy: i32, player: Player) -> [u8; WINDOW] {
  let mut window = [b'X'; WINDOW];
  for (slot, step) in (-4i32..=4).enumerate() {
    if step == 0 {
      window[slot] = b'O';
      continue;
    }
    let cx = x as i32 + step * dx;
    let cy = y as i32 + step * dy;
    if cx < 0 || cy < 0 || !board.in_bounds(cx as usize, cy as usize) {
      continue; // off-board stays a wall
    }
    window[slot] = match board.get(cx as usize, cy as usize) {
      None => b'_',
      Some(p) if p == player => b'O',
      Some(_) => b'X',
    };
  }
  window
}

/// Signed utility of `player` playing the empty cell `coord`: attack
/// patterns, blocked opponent threats, double-threat bonuses and a small
/// positional term. Higher is better; deterministic for a given board.
pub fn evaluate_move(board: &Board, coord: Coord, player: Player) -> i32 {
  debug_assert!(board.is_empty(coord.x, coord.y));
  let Coord { x, y } = coord;
  let opponent = player.other();

  let mut score = 0i32;
  let mut open_threes = 0;
  let mut fours = 0;

  for (dx, dy) in DIRECTIONS {
    let attack = line_window(board, x, y, dx, dy, player);
    for &(pattern, value) in ATTACK_PATTERNS {
      if contains(&attack, pattern) {
        score += value;
      }
    }
    if contains(&attack, b"_OOO_") || contains(&attack, b"__OOO__") {
      open_threes += 1;
    }
    if contains(&attack, b"OOOO") {
      fours += 1;
    }

    let defense = line_window(board, x, y, dx, dy, opponent);
    for &(pattern, value) in DEFENSE_PATTERNS {
      if contains(&defense, pattern) {
        score += value;
      }
    }
  }

  // The bonuses reward the combination; the individual shapes are already
  // counted above.
  if open_threes >= 2 {
    score += DOUBLE_THREE_BONUS;
  }
  if fours >= 2 {
    score += DOUBLE_FOUR_BONUS;
  }

  score + positional_value(board, x, y)
}

fn positional_value(board: &Board, x: usize, y: usize) -> i32 {
  let center = (board.size() / 2) as f64;
  let dist = ((x as f64 - center).powi(2) + (y as f64 - center).powi(2)).sqrt();
  let center_value = (100.0 - dist * 5.0).max(0.0) as i32;

  let mut density = 0i32;
  for dx in -CANDIDATE_RADIUS..=CANDIDATE_RADIUS {
    for dy in -CANDIDATE_RADIUS..=CANDIDATE_RADIUS {
      if dx == 0 && dy == 0 {
        continue;
      }
      let cx = x as i32 + dx;
      let cy = y as i32 + dy;
      if cx < 0 || cy < 0 {
        continue;
      }
      if board.get(cx as usize, cy as usize).is_some() {
        let chebyshev = dx.abs().max(dy.abs());
        density += (3 - chebyshev) * 10;
      }
    }
  }

  center_value + density
}

/// Empty cells within Chebyshev distance 2 of any stone, in row-major
/// order. An empty board yields the centre.
pub fn candidate_moves(board: &Board) -> Vec<Coord> {
  let size = board.size();
  let mut near = vec![false; size * size];
  let mut has_stones = false;
  for x in 0..size {
    for y in 0..size {
      if board.get(x, y).is_none() {
        continue;
      }
      has_stones = true;
      for dx in -CANDIDATE_RADIUS..=CANDIDATE_RADIUS {
        for dy in -CANDIDATE_RADIUS..=CANDIDATE_RADIUS {
          let nx = x as i32 + dx;
          let ny = y as i32 + dy;
          if nx >= 0 && ny >= 0 && board.is_empty(nx as usize, ny as usize) {
            near[nx as usize * size + ny as usize] = true;
          }
        }
      }
    }
  }

  if !has_stones {
    let c = size / 2;
    return vec![Coord { x: c, y: c }];
  }

  let mut candidates = Vec::new();
  for x in 0..size {
    for y in 0..size {
      if near[x * size + y] {
        candidates.push(Coord { x, y });
      }
    }
  }
  candidates
}

/// Candidates scored for `player` and sorted best-first with the
/// deterministic tie-break: higher score, then lower row, then lower column.
pub fn ranked_moves(board: &Board, player: Player) -> Vec<(i32, Coord)> {
  let mut scored: Vec<(i32, Coord)> = candidate_moves(board)
    .into_iter()
    .map(|c| (evaluate_move(board, c, player), c))
    .collect();
  sort_scored(&mut scored);
  scored
}

pub(crate) fn sort_scored(scored: &mut [(i32, Coord)]) {
  scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.x.cmp(&b.1.x)).then(a.1.y.cmp(&b.1.y)));
}

/// Forced move, if one exists: complete an own five, otherwise block an
/// opponent five. Shared by all engines; mandatory for MCTS.
pub fn urgent_move(board: &Board, player: Player) -> Option<Coord> {
  let candidates = candidate_moves(board);
  if let Some(&win) = candidates.iter().find(|c| board.makes_five(c.x, c.y, player)) {
    return Some(win);
  }
  let opponent = player.other();
  candidates
    .iter()
    .find(|c| board.makes_five(c.x, c.y, opponent))
    .copied()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Player;

  fn board_with(moves: &[(usize, usize, Player)]) -> Board {
    let mut board = Board::new();
    for &(x, y, player) in moves {
      board.place(x, y, player).unwrap();
    }
    board
  }

  #[test]
  fn threat_scores_are_strictly_ordered() {
    // Completing a five
    let five = board_with(&[
      (7, 5, Player::Black),
      (0, 0, Player::White),
      (7, 6, Player::Black),
      (0, 1, Player::White),
      (7, 8, Player::Black),
      (0, 2, Player::White),
      (7, 9, Player::Black),
      (0, 3, Player::White),
    ]);
    let five_score = evaluate_move(&five, Coord { x: 7, y: 7 }, Player::Black);

    // Completing an open four
    let four = board_with(&[
      (7, 5, Player::Black),
      (0, 0, Player::White),
      (7, 6, Player::Black),
      (0, 1, Player::White),
      (7, 8, Player::Black),
      (0, 2, Player::White),
    ]);
    let four_score = evaluate_move(&four, Coord { x: 7, y: 7 }, Player::Black);

    // Completing an open three
    let three = board_with(&[
      (7, 6, Player::Black),
      (0, 0, Player::White),
      (7, 8, Player::Black),
      (0, 1, Player::White),
    ]);
    let three_score = evaluate_move(&three, Coord { x: 7, y: 7 }, Player::Black);

    assert!(five_score >= WIN_THRESHOLD);
    assert!(five_score > four_score);
    assert!(four_score > three_score);
    assert!(four_score >= 100_000);
  }

  #[test]
  fn ordering_holds_on_vertical_and_diagonal_axes() {
    let vertical = board_with(&[
      (5, 7, Player::Black),
      (0, 0, Player::White),
      (6, 7, Player::Black),
      (0, 1, Player::White),
      (8, 7, Player::Black),
      (0, 2, Player::White),
      (9, 7, Player::Black),
      (0, 3, Player::White),
    ]);
    let diag = board_with(&[
      (5, 5, Player::Black),
      (0, 0, Player::White),
      (6, 6, Player::Black),
      (0, 1, Player::White),
      (8, 8, Player::Black),
      (0, 2, Player::White),
    ]);
    let v5 = evaluate_move(&vertical, Coord { x: 7, y: 7 }, Player::Black);
    let d4 = evaluate_move(&diag, Coord { x: 7, y: 7 }, Player::Black);
    assert!(v5 >= WIN_THRESHOLD);
    assert!(d4 >= 100_000);
    assert!(v5 > d4);
  }

  #[test]
  fn blocking_an_open_four_scores_as_defense() {
    let board = board_with(&[
      (7, 6, Player::White),
      (0, 0, Player::Black),
      (7, 7, Player::White),
      (0, 1, Player::Black),
      (7, 8, Player::White),
      (0, 2, Player::Black),
      (7, 9, Player::White),
    ]);
    // Black to move must see the open four at both ends
    let left = evaluate_move(&board, Coord { x: 7, y: 5 }, Player::Black);
    let right = evaluate_move(&board, Coord { x: 7, y: 10 }, Player::Black);
    let far = evaluate_move(&board, Coord { x: 5, y: 5 }, Player::Black);
    assert!(left >= 500_000);
    assert!(right >= 500_000);
    assert!(left > far);
    assert!(right > far);
  }

  #[test]
  fn double_three_gets_the_combination_bonus() {
    // Placing at (7,7) makes an open three on the row and on the column
    let board = board_with(&[
      (7, 6, Player::Black),
      (0, 0, Player::White),
      (7, 8, Player::Black),
      (0, 1, Player::White),
      (6, 7, Player::Black),
      (0, 2, Player::White),
      (8, 7, Player::Black),
      (0, 3, Player::White),
    ]);
    let double = evaluate_move(&board, Coord { x: 7, y: 7 }, Player::Black);

    let single = board_with(&[
      (7, 6, Player::Black),
      (0, 0, Player::White),
      (7, 8, Player::Black),
      (0, 1, Player::White),
    ]);
    let single_score = evaluate_move(&single, Coord { x: 7, y: 7 }, Player::Black);

    assert!(double >= DOUBLE_THREE_BONUS);
    assert!(double > single_score + DOUBLE_THREE_BONUS / 2);
  }

  #[test]
  fn candidates_stay_near_stones() {
    let board = board_with(&[(7, 7, Player::Black)]);
    let candidates = candidate_moves(&board);
    assert!(!candidates.is_empty());
    assert!(candidates.iter().all(|c| {
      let dx = (c.x as i32 - 7).abs();
      let dy = (c.y as i32 - 7).abs();
      dx.max(dy) <= CANDIDATE_RADIUS && board.is_empty(c.x, c.y)
    }));
  }

  #[test]
  fn empty_board_candidates_are_the_centre() {
    let board = Board::new();
    assert_eq!(candidate_moves(&board), vec![Coord { x: 7, y: 7 }]);
  }

  #[test]
  fn ranked_moves_are_sorted_with_deterministic_tie_break() {
    let board = board_with(&[(7, 7, Player::Black), (7, 8, Player::White)]);
    let ranked = ranked_moves(&board, Player::Black);
    for pair in ranked.windows(2) {
      let (sa, ca) = pair[0];
      let (sb, cb) = pair[1];
      assert!(sa > sb || (sa == sb && (ca.x, ca.y) < (cb.x, cb.y)));
    }
  }

  #[test]
  fn urgent_move_finds_win_before_block() {
    // Black can win at (7,11); White threatens at (9,4)..(9,7)
    let board = board_with(&[
      (7, 7, Player::Black),
      (9, 4, Player::White),
      (7, 8, Player::Black),
      (9, 5, Player::White),
      (7, 9, Player::Black),
      (9, 6, Player::White),
      (7, 10, Player::Black),
      (9, 7, Player::White),
    ]);
    let urgent = urgent_move(&board, Player::Black).unwrap();
    assert!(board.makes_five(urgent.x, urgent.y, Player::Black));
  }

  #[test]
  fn urgent_move_blocks_opponent_five() {
    let board = board_with(&[
      (7, 7, Player::Black),
      (9, 4, Player::White),
      (7, 8, Player::Black),
      (9, 5, Player::White),
      (2, 2, Player::Black),
      (9, 6, Player::White),
      (2, 3, Player::Black),
      (9, 7, Player::White),
    ]);
    // White threatens (9,3) and (9,8); Black has no five
    let urgent = urgent_move(&board, Player::Black).unwrap();
    assert!(board.makes_five(urgent.x, urgent.y, Player::White));
  }
}
