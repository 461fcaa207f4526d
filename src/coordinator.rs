use log::warn;

use crate::board::Board;
use crate::classical::{self, ClassicalEngine};
use crate::error::MoveError;
use crate::mcts::MctsEngine;
use crate::minimax::MinimaxEngine;
use crate::types::{Coord, CoreConfig, EngineKind, GameSnapshot, Player};
use crate::GomokuAI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
  AwaitingHuman,
  AwaitingAI,
  GameOver,
}

/// Owns the live board and the selected engine, validates turn order and
/// applies the moves both sides make. Engine failures never abort the
/// game: the classical engine replays a safe move instead.
pub struct Coordinator {
  board: Board,
  engine: Box<dyn GomokuAI>,
  ai_side: Player,
  phase: Phase,
}

impl Coordinator {
  pub fn new(engine: Box<dyn GomokuAI>, ai_side: Player) -> Self {
    let phase = initial_phase(ai_side);
    Self {
      board: Board::new(),
      engine,
      ai_side,
      phase,
    }
  }

  pub fn from_config(config: &CoreConfig) -> Self {
    let engine: Box<dyn GomokuAI> = match config.engine {
      EngineKind::Classical => Box::new(ClassicalEngine::new()),
      EngineKind::Minimax => Box::new(MinimaxEngine::new(config.minimax)),
      EngineKind::Mcts => Box::new(MctsEngine::new(config.mcts)),
    };
    Self::new(engine, config.ai_side)
  }

  pub fn board(&self) -> &Board {
    &self.board
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn ai_side(&self) -> Player {
    self.ai_side
  }

  pub fn human_side(&self) -> Player {
    self.ai_side.other()
  }

  pub fn human_place(&mut self, x: usize, y: usize) -> Result<(), MoveError> {
    match self.phase {
      Phase::GameOver => return Err(MoveError::GameOver),
      Phase::AwaitingAI => {
        return Err(MoveError::WrongTurn {
          expected: self.ai_side,
        })
      }
      Phase::AwaitingHuman => {}
    }
    self.board.place(x, y, self.human_side())?;
    self.phase = self.phase_from_board();
    Ok(())
  }

  /// Ask the engine for its move and apply it. Must only be called while
  /// the AI is to move and the game is running.
  pub fn ai_move(&mut self) -> Result<Coord, MoveError> {
    match self.phase {
      Phase::GameOver => return Err(MoveError::GameOver),
      Phase::AwaitingHuman => {
        return Err(MoveError::WrongTurn {
          expected: self.human_side(),
        })
      }
      Phase::AwaitingAI => {}
    }

    let mv = match self.engine.choose(&self.board, self.ai_side) {
      Ok(mv) if self.board.is_empty(mv.x, mv.y) => mv,
      Ok(bad) => {
        warn!(
          "engine returned occupied cell ({}, {}), replaying safe move",
          bad.x, bad.y
        );
        self.safe_move()?
      }
      Err(err) => {
        warn!("engine failed ({err}), replaying safe move");
        self.safe_move()?
      }
    };

    self.board.place(mv.x, mv.y, self.ai_side)?;
    self.phase = self.phase_from_board();
    Ok(mv)
  }

  /// Take back moves until the human is to move again: two plies after an
  /// AI reply, one if only the human has moved.
  pub fn undo(&mut self) -> Result<(), MoveError> {
    self.board.undo()?;
    if self.board.to_move() != self.human_side() && self.board.has_undo() {
      self.board.undo()?;
    }
    self.phase = self.phase_from_board();
    Ok(())
  }

  /// Replay what `undo` popped: the human ply and, when present, the AI
  /// reply.
  pub fn redo(&mut self) -> Result<(), MoveError> {
    self.board.redo()?;
    if self.board.has_redo() && self.board.to_move() == self.ai_side {
      self.board.redo()?;
    }
    self.phase = self.phase_from_board();
    Ok(())
  }

  pub fn restart(&mut self) {
    self.board.clear();
    self.phase = initial_phase(self.ai_side);
  }

  pub fn snapshot(&self) -> GameSnapshot {
    GameSnapshot {
      board_size: self.board.size(),
      board: self.board.cells(),
      to_move: self.board.to_move(),
      winner: self.board.winner(),
      winning_line: self.board.winning_line().to_vec(),
      moves: self.board.move_history().to_vec(),
      can_undo: self.board.has_undo(),
      can_redo: self.board.has_redo(),
    }
  }

  fn safe_move(&self) -> Result<Coord, MoveError> {
    classical::choose_move(&self.board, self.ai_side).map_err(|_| MoveError::GameOver)
  }

  fn phase_from_board(&self) -> Phase {
    if self.board.winner().is_some() || self.board.is_full() {
      Phase::GameOver
    } else if self.board.to_move() == self.ai_side {
      Phase::AwaitingAI
    } else {
      Phase::AwaitingHuman
    }
  }
}

fn initial_phase(ai_side: Player) -> Phase {
  if ai_side == Player::Black {
    Phase::AwaitingAI
  } else {
    Phase::AwaitingHuman
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::EngineError;
  use crate::types::{MctsConfig, MinimaxConfig};

  fn classical_vs_human() -> Coordinator {
    Coordinator::new(Box::new(ClassicalEngine::new()), Player::White)
  }

  #[test]
  fn turn_order_alternates_and_is_enforced() {
    let mut game = classical_vs_human();
    assert_eq!(game.phase(), Phase::AwaitingHuman);
    assert_eq!(game.ai_move(), Err(MoveError::WrongTurn { expected: Player::Black }));

    game.human_place(7, 7).unwrap();
    assert_eq!(game.phase(), Phase::AwaitingAI);
    assert_eq!(
      game.human_place(8, 8),
      Err(MoveError::WrongTurn { expected: Player::White })
    );

    let reply = game.ai_move().unwrap();
    assert_eq!(game.board().get(reply.x, reply.y), Some(Player::White));
    assert_eq!(game.phase(), Phase::AwaitingHuman);
  }

  #[test]
  fn ai_black_moves_first_with_centre() {
    let mut game = Coordinator::new(Box::new(ClassicalEngine::new()), Player::Black);
    assert_eq!(game.phase(), Phase::AwaitingAI);
    let mv = game.ai_move().unwrap();
    assert_eq!(mv, Coord { x: 7, y: 7 });
    assert_eq!(game.phase(), Phase::AwaitingHuman);
  }

  #[test]
  fn undo_pops_the_ai_reply_too() {
    let mut game = classical_vs_human();
    game.human_place(7, 7).unwrap();
    game.ai_move().unwrap();
    assert_eq!(game.board().move_history().len(), 2);

    game.undo().unwrap();
    assert_eq!(game.board().move_history().len(), 0);
    assert_eq!(game.phase(), Phase::AwaitingHuman);

    game.redo().unwrap();
    assert_eq!(game.board().move_history().len(), 2);
    assert_eq!(game.phase(), Phase::AwaitingHuman);
  }

  #[test]
  fn undo_with_no_moves_is_an_error() {
    let mut game = classical_vs_human();
    assert_eq!(game.undo(), Err(MoveError::NothingToUndo));
  }

  // Always answers with the first empty cell on the last row, so a test
  // can drive the human to a win.
  struct CornerEngine;

  impl GomokuAI for CornerEngine {
    fn choose(&self, board: &Board, _player: Player) -> Result<Coord, EngineError> {
      (0..board.size())
        .map(|y| Coord { x: board.size() - 1, y })
        .find(|c| board.is_empty(c.x, c.y))
        .ok_or(EngineError::NoMove)
    }
  }

  #[test]
  fn game_over_locks_both_entry_points() {
    let mut game = Coordinator::new(Box::new(CornerEngine), Player::White);
    for y in 0..5 {
      game.human_place(0, y).unwrap();
      if game.phase() == Phase::AwaitingAI {
        game.ai_move().unwrap();
      }
    }
    assert_eq!(game.phase(), Phase::GameOver);
    assert_eq!(game.board().winner(), Some(Player::Black));
    assert_eq!(game.human_place(7, 7), Err(MoveError::GameOver));
    assert_eq!(game.ai_move(), Err(MoveError::GameOver));

    // Undo clears the win and play resumes
    game.undo().unwrap();
    assert_eq!(game.phase(), Phase::AwaitingHuman);
    assert!(game.board().winner().is_none());
  }

  #[test]
  fn snapshot_reflects_the_live_game() {
    let mut game = classical_vs_human();
    game.human_place(7, 7).unwrap();
    game.ai_move().unwrap();

    let snapshot = game.snapshot();
    assert_eq!(snapshot.board_size, 15);
    assert_eq!(snapshot.moves.len(), 2);
    assert_eq!(snapshot.to_move, Player::Black);
    assert!(snapshot.winner.is_none());
    assert!(snapshot.can_undo);
    assert!(!snapshot.can_redo);
    let stones = snapshot.board.iter().filter(|c| c.is_some()).count();
    assert_eq!(stones, 2);
  }

  #[test]
  fn restart_resets_board_and_phase() {
    let mut game = classical_vs_human();
    game.human_place(7, 7).unwrap();
    game.ai_move().unwrap();
    game.restart();
    assert_eq!(game.board().move_history().len(), 0);
    assert_eq!(game.phase(), Phase::AwaitingHuman);
    assert!(game.board().winner().is_none());
  }

  struct BrokenEngine;

  impl GomokuAI for BrokenEngine {
    fn choose(&self, _board: &Board, _player: Player) -> Result<Coord, EngineError> {
      Err(EngineError::Internal("boom".to_string()))
    }
  }

  #[test]
  fn engine_failure_replays_a_safe_move() {
    let mut game = Coordinator::new(Box::new(BrokenEngine), Player::White);
    game.human_place(7, 7).unwrap();
    let mv = game.ai_move().unwrap();
    assert_eq!(game.board().get(mv.x, mv.y), Some(Player::White));
    assert_eq!(game.phase(), Phase::AwaitingHuman);
  }

  struct OccupiedEngine;

  impl GomokuAI for OccupiedEngine {
    fn choose(&self, _board: &Board, _player: Player) -> Result<Coord, EngineError> {
      Ok(Coord { x: 7, y: 7 })
    }
  }

  #[test]
  fn illegal_engine_move_replays_a_safe_move() {
    let mut game = Coordinator::new(Box::new(OccupiedEngine), Player::White);
    game.human_place(7, 7).unwrap();
    let mv = game.ai_move().unwrap();
    assert_ne!(mv, Coord { x: 7, y: 7 });
    assert_eq!(game.board().get(mv.x, mv.y), Some(Player::White));
  }

  #[test]
  fn from_config_builds_every_engine_kind() {
    for engine in [EngineKind::Classical, EngineKind::Minimax, EngineKind::Mcts] {
      let config = CoreConfig {
        engine,
        ai_side: Player::White,
        minimax: MinimaxConfig {
          depth: 2,
          table_capacity: 1 << 12,
        },
        mcts: MctsConfig {
          total_iterations: 50,
          num_workers: 1,
          seed: Some(1),
          ..MctsConfig::default()
        },
      };
      let mut game = Coordinator::from_config(&config);
      game.human_place(7, 7).unwrap();
      let mv = game.ai_move().unwrap();
      assert_eq!(game.board().get(mv.x, mv.y), Some(Player::White));
    }
  }
}
