use lazy_static::lazy_static;
use rand::Rng;

use crate::error::MoveError;
use crate::types::{Coord, Move, Player};

pub const BOARD_SIZE: usize = 15;

const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

// Zobrist hashing table for transposition tables.
// 225 = 15x15 board, 2 players (Black and White).
lazy_static! {
  pub(crate) static ref ZOBRIST_TABLE: [[u64; 2]; 225] = {
    let mut table = [[0u64; 2]; 225];
    let mut rng = rand::thread_rng();
    for entry in table.iter_mut() {
      entry[0] = rng.gen(); // Black
      entry[1] = rng.gen(); // White
    }
    table
  };
}

fn zobrist_key(index: usize, player: Player) -> u64 {
  let player_idx = match player {
    Player::Black => 0,
    Player::White => 1,
  };
  ZOBRIST_TABLE[index][player_idx]
}

/// 15x15 board with stones, move history and redo stack. All engines read
/// it through clones or `&Board`; only the coordinator and the search
/// internals mutate it.
#[derive(Clone, Debug)]
pub struct Board {
  size: usize,
  cells: Vec<Option<Player>>,
  hash: u64, // Cached Zobrist hash for O(1) lookup
  move_history: Vec<Move>,
  redo_stack: Vec<Move>,
  winner: Option<Player>,
  winning_line: Vec<Coord>,
}

impl Board {
  pub fn new() -> Self {
    Self {
      size: BOARD_SIZE,
      cells: vec![None; BOARD_SIZE * BOARD_SIZE],
      hash: 0, // Empty board has hash 0
      move_history: Vec::new(),
      redo_stack: Vec::new(),
      winner: None,
      winning_line: Vec::new(),
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn in_bounds(&self, x: usize, y: usize) -> bool {
    x < self.size && y < self.size
  }

  fn index(&self, x: usize, y: usize) -> usize {
    x * self.size + y
  }

  pub fn get(&self, x: usize, y: usize) -> Option<Player> {
    if !self.in_bounds(x, y) {
      return None;
    }
    self.cells[self.index(x, y)]
  }

  pub fn is_empty(&self, x: usize, y: usize) -> bool {
    self.in_bounds(x, y) && self.get(x, y).is_none()
  }

  pub fn is_full(&self) -> bool {
    self.cells.iter().all(|cell| cell.is_some())
  }

  pub fn stone_count(&self) -> usize {
    self.move_history.len()
  }

  /// Side to move: Black opens, afterwards the opposite of the last stone.
  pub fn to_move(&self) -> Player {
    self
      .move_history
      .last()
      .map(|mv| mv.player.other())
      .unwrap_or(Player::Black)
  }

  pub fn winner(&self) -> Option<Player> {
    self.winner
  }

  pub fn winning_line(&self) -> &[Coord] {
    &self.winning_line
  }

  pub fn move_history(&self) -> &[Move] {
    &self.move_history
  }

  pub fn has_undo(&self) -> bool {
    !self.move_history.is_empty()
  }

  pub fn has_redo(&self) -> bool {
    !self.redo_stack.is_empty()
  }

  // Cached Zobrist hash - O(1)
  pub fn hash(&self) -> u64 {
    self.hash
  }

  /// Flattened copy of the grid, row-major.
  pub fn cells(&self) -> Vec<Option<Player>> {
    self.cells.clone()
  }

  /// Raw mutator for search make/unmake: no history, no win detection.
  /// Keeps the cached hash incremental.
  pub(crate) fn set(&mut self, x: usize, y: usize, player: Player) {
    let idx = self.index(x, y);
    debug_assert!(self.cells[idx].is_none());
    self.cells[idx] = Some(player);
    self.hash ^= zobrist_key(idx, player);
  }

  /// Raw mutator for search make/unmake, inverse of `set`.
  pub(crate) fn clear_cell(&mut self, x: usize, y: usize) {
    let idx = self.index(x, y);
    if let Some(player) = self.cells[idx] {
      self.hash ^= zobrist_key(idx, player);
    }
    self.cells[idx] = None;
  }

  /// Place a stone for `player`, append it to the history, drop any redo
  /// moves and detect a win through the new stone.
  pub fn place(&mut self, x: usize, y: usize, player: Player) -> Result<(), MoveError> {
    if self.winner.is_some() {
      return Err(MoveError::GameOver);
    }
    if !self.in_bounds(x, y) {
      return Err(MoveError::OutOfRange { x, y });
    }
    if self.get(x, y).is_some() {
      return Err(MoveError::Occupied { x, y });
    }

    self.set(x, y, player);
    self.move_history.push(Move { x, y, player });
    self.redo_stack.clear();
    self.detect_win(x, y, player);
    Ok(())
  }

  /// Take back the last move. The redo stack is kept (asymmetry from
  /// `place`), so an undone move can be replayed.
  pub fn undo(&mut self) -> Result<Move, MoveError> {
    let mv = self.move_history.pop().ok_or(MoveError::NothingToUndo)?;
    self.redo_stack.push(mv);
    self.clear_cell(mv.x, mv.y);
    self.winner = None;
    self.winning_line.clear();
    Ok(mv)
  }

  /// Replay the most recently undone move.
  pub fn redo(&mut self) -> Result<Move, MoveError> {
    let mv = self.redo_stack.pop().ok_or(MoveError::NothingToRedo)?;
    self.set(mv.x, mv.y, mv.player);
    self.move_history.push(mv);
    self.detect_win(mv.x, mv.y, mv.player);
    Ok(mv)
  }

  pub fn clear(&mut self) {
    self.cells.fill(None);
    self.hash = 0;
    self.move_history.clear();
    self.redo_stack.clear();
    self.winner = None;
    self.winning_line.clear();
  }

  /// Would placing `player` at the empty cell (x, y) complete five or more
  /// in a row? Pure query, no mutation.
  pub fn makes_five(&self, x: usize, y: usize, player: Player) -> bool {
    if !self.is_empty(x, y) {
      return false;
    }
    for (dx, dy) in DIRECTIONS {
      let count =
        1 + self.count_dir(x, y, dx, dy, player) + self.count_dir(x, y, -dx, -dy, player);
      if count >= 5 {
        return true;
      }
    }
    false
  }

  /// Is the stone at (x, y) part of a run of five or more? Used by search
  /// internals after a raw `set`.
  pub(crate) fn has_five_at(&self, x: usize, y: usize) -> bool {
    let Some(player) = self.get(x, y) else {
      return false;
    };
    for (dx, dy) in DIRECTIONS {
      let count =
        1 + self.count_dir(x, y, dx, dy, player) + self.count_dir(x, y, -dx, -dy, player);
      if count >= 5 {
        return true;
      }
    }
    false
  }

  fn detect_win(&mut self, x: usize, y: usize, player: Player) {
    for (dx, dy) in DIRECTIONS {
      let back = self.count_dir(x, y, -dx, -dy, player);
      let forward = self.count_dir(x, y, dx, dy, player);
      let run = 1 + back + forward;
      if run >= 5 {
        self.winner = Some(player);
        self.winning_line = self.extract_line(x, y, dx, dy, back, run);
        return;
      }
    }
  }

  // The reported window always contains the just-placed stone, even when
  // the run is an overline.
  fn extract_line(
    &self,
    x: usize,
    y: usize,
    dx: i32,
    dy: i32,
    back: usize,
    run: usize,
  ) -> Vec<Coord> {
    // Window start in run coordinates; the placed stone sits at offset `back`.
    let start = (back as i32 - 4).max(0).min(run as i32 - 5);
    let mut line = Vec::with_capacity(5);
    for step in 0..5 {
      let offset = start + step - back as i32;
      let cx = (x as i32 + offset * dx) as usize;
      let cy = (y as i32 + offset * dy) as usize;
      line.push(Coord { x: cx, y: cy });
    }
    line
  }

  fn count_dir(&self, x: usize, y: usize, dx: i32, dy: i32, player: Player) -> usize {
    let mut count = 0;
    let mut cx = x as i32 + dx;
    let mut cy = y as i32 + dy;

    while cx >= 0 && cy >= 0 {
      let ux = cx as usize;
      let uy = cy as usize;
      if !self.in_bounds(ux, uy) {
        break;
      }
      if self.get(ux, uy) != Some(player) {
        break;
      }
      count += 1;
      cx += dx;
      cy += dy;
    }

    count
  }
}

impl Default for Board {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for Board {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "   ")?;
    for y in 0..self.size {
      write!(f, "{y:2} ")?;
    }
    writeln!(f)?;
    for x in 0..self.size {
      write!(f, "{x:2} ")?;
      for y in 0..self.size {
        let glyph = match self.get(x, y) {
          None => " .",
          Some(Player::Black) => " X",
          Some(Player::White) => " O",
        };
        write!(f, "{glyph} ")?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}
