//! Gomoku (five-in-a-row) AI decision core.
//!
//! Three interchangeable engines behind one trait: a one-ply pattern
//! heuristic, a depth-limited alpha-beta search with a transposition
//! table, and a root-parallel Monte Carlo Tree Search. The shared board
//! model handles placement, win detection and undo/redo; the coordinator
//! owns a live game and dispatches between the human and the engine.
//!
//! ```
//! use gomoku_core::{Coordinator, CoreConfig, Phase};
//!
//! let mut game = Coordinator::from_config(&CoreConfig::default());
//! game.human_place(7, 7).unwrap();
//! assert_eq!(game.phase(), Phase::AwaitingAI);
//! let reply = game.ai_move().unwrap();
//! assert!(game.board().get(reply.x, reply.y).is_some());
//! ```

pub mod board;
pub mod classical;
pub mod coordinator;
pub mod error;
pub mod evaluate;
pub mod mcts;
pub mod minimax;
pub mod types;

pub use board::{Board, BOARD_SIZE};
pub use classical::ClassicalEngine;
pub use coordinator::{Coordinator, Phase};
pub use error::{EngineError, MoveError};
pub use mcts::MctsEngine;
pub use minimax::MinimaxEngine;
pub use types::{
  Coord, CoreConfig, EngineKind, GameSnapshot, MctsConfig, MinimaxConfig, Move, Player,
};

/// The contract all engines implement. Engines never mutate the board
/// they are given; they search on internal clones.
pub trait GomokuAI: Send + Sync {
  fn choose(&self, board: &Board, player: Player) -> Result<Coord, EngineError>;
}
