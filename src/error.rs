use thiserror::Error;

use crate::types::Player;

/// Domain errors for board mutation and turn handling. All of these are
/// recoverable by the caller and leave the board untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
  #[error("position ({x}, {y}) is outside the board")]
  OutOfRange { x: usize, y: usize },

  #[error("position ({x}, {y}) is already occupied")]
  Occupied { x: usize, y: usize },

  #[error("game is already finished")]
  GameOver,

  #[error("it is {expected:?}'s turn")]
  WrongTurn { expected: Player },

  #[error("no move to undo")]
  NothingToUndo,

  #[error("no move to redo")]
  NothingToRedo,
}

/// Failures inside an engine. The coordinator resolves these with the
/// classical fallback so the game never aborts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  #[error("no legal move available")]
  NoMove,

  #[error("search budget exhausted before any move was visited")]
  BudgetExhausted,

  #[error("engine failure: {0}")]
  Internal(String),
}
