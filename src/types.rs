use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Player {
  Black,
  White,
}

impl Player {
  pub fn other(self) -> Self {
    match self {
      Player::Black => Player::White,
      Player::White => Player::Black,
    }
  }
}

/// Board position. `x` is the row, `y` is the column, both in `0..15`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coord {
  pub x: usize,
  pub y: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
  pub x: usize,
  pub y: usize,
  pub player: Player,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
  Classical,
  Minimax,
  Mcts,
}

impl Default for EngineKind {
  fn default() -> Self {
    EngineKind::Classical
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimaxConfig {
  #[serde(default = "default_depth")]
  pub depth: u8,
  #[serde(default = "default_table_capacity")]
  pub table_capacity: usize,
}

impl Default for MinimaxConfig {
  fn default() -> Self {
    Self {
      depth: default_depth(),
      table_capacity: default_table_capacity(),
    }
  }
}

fn default_depth() -> u8 {
  3
}

fn default_table_capacity() -> usize {
  65536
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MctsConfig {
  #[serde(default = "default_total_iterations")]
  pub total_iterations: u32,
  #[serde(default = "default_max_time_secs")]
  pub max_time_secs: f64,
  #[serde(default = "default_c_puct")]
  pub c_puct: f64,
  /// 0 means "pick from available parallelism".
  #[serde(default)]
  pub num_workers: usize,
  #[serde(default = "default_max_simulation_depth")]
  pub max_simulation_depth: u32,
  #[serde(default = "default_min_visits_for_expansion")]
  pub min_visits_for_expansion: u64,
  #[serde(default = "default_progressive_widening_exponent")]
  pub progressive_widening_exponent: f64,
  /// Fixed base seed for reproducible searches; `None` draws one per search.
  #[serde(default)]
  pub seed: Option<u64>,
}

impl Default for MctsConfig {
  fn default() -> Self {
    Self {
      total_iterations: default_total_iterations(),
      max_time_secs: default_max_time_secs(),
      c_puct: default_c_puct(),
      num_workers: 0,
      max_simulation_depth: default_max_simulation_depth(),
      min_visits_for_expansion: default_min_visits_for_expansion(),
      progressive_widening_exponent: default_progressive_widening_exponent(),
      seed: None,
    }
  }
}

fn default_total_iterations() -> u32 {
  3000
}

fn default_max_time_secs() -> f64 {
  8.0
}

fn default_c_puct() -> f64 {
  1.414
}

fn default_max_simulation_depth() -> u32 {
  20
}

fn default_min_visits_for_expansion() -> u64 {
  3
}

fn default_progressive_widening_exponent() -> f64 {
  0.4
}

/// Read-only view of a running game for front-ends: the flattened board,
/// whose turn it is and how the game stands.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
  pub board_size: usize,
  pub board: Vec<Option<Player>>,
  pub to_move: Player,
  pub winner: Option<Player>,
  pub winning_line: Vec<Coord>,
  pub moves: Vec<Move>,
  pub can_undo: bool,
  pub can_redo: bool,
}

/// Host-facing configuration for the whole decision core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
  #[serde(default)]
  pub engine: EngineKind,
  #[serde(default = "default_ai_side")]
  pub ai_side: Player,
  #[serde(default)]
  pub minimax: MinimaxConfig,
  #[serde(default)]
  pub mcts: MctsConfig,
}

impl Default for CoreConfig {
  fn default() -> Self {
    Self {
      engine: EngineKind::default(),
      ai_side: default_ai_side(),
      minimax: MinimaxConfig::default(),
      mcts: MctsConfig::default(),
    }
  }
}

fn default_ai_side() -> Player {
  Player::White
}
