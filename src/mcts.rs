//! Root-parallel Monte Carlo Tree Search with heuristic playouts.
//!
//! Each worker builds an independent tree over a private board clone;
//! statistics are merged once at the end by summing per-move visits and
//! wins. There are no locks on the hot path. Nodes live in a per-worker
//! arena and reference each other by index, so the tree has no ownership
//! cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::board::Board;
use crate::classical;
use crate::error::EngineError;
use crate::evaluate;
use crate::types::{Coord, MctsConfig, Player};
use crate::GomokuAI;

// Playout policy knobs, matching the quality-playout behaviour.
const PLAYOUT_CANDIDATE_CAP: usize = 15;
const PLAYOUT_TOP_K: usize = 3;

/// With this many stones or fewer the opening rule applies instead of a
/// full search.
const OPENING_STONES: usize = 6;

const VARIANCE_WEIGHT: f64 = 0.1;

pub struct MctsEngine {
  config: MctsConfig,
  cancel: Arc<AtomicBool>,
}

impl MctsEngine {
  pub fn new(config: MctsConfig) -> Self {
    Self {
      config,
      cancel: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Cooperative cancel flag, polled by every worker once per iteration.
  pub fn cancel_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.cancel)
  }

  fn resolved_workers(&self) -> usize {
    if self.config.num_workers > 0 {
      return self.config.num_workers;
    }
    std::thread::available_parallelism()
      .map(|n| (n.get() / 2).max(1))
      .unwrap_or(1)
  }
}

impl GomokuAI for MctsEngine {
  fn choose(&self, board: &Board, player: Player) -> Result<Coord, EngineError> {
    self.cancel.store(false, Ordering::Relaxed);

    let center = Coord {
      x: board.size() / 2,
      y: board.size() / 2,
    };
    if board.stone_count() == 0 {
      return Ok(center);
    }

    // Never search when a five can be completed or must be blocked.
    if let Some(forced) = evaluate::urgent_move(board, player) {
      debug!("mcts: forced move ({}, {})", forced.x, forced.y);
      return Ok(forced);
    }

    if board.stone_count() <= OPENING_STONES {
      if let Some(opening) = opening_move(board, player) {
        debug!("mcts: opening move ({}, {})", opening.x, opening.y);
        return Ok(opening);
      }
    }

    let workers = self.resolved_workers();
    let deadline = Instant::now() + Duration::from_secs_f64(self.config.max_time_secs.max(0.0));
    let seed_base = self
      .config
      .seed
      .unwrap_or_else(|| rand::thread_rng().gen());

    // 根级并行: each worker searches an independent tree over its own
    // board clone, with its own RNG stream.
    let per_worker = self.config.total_iterations / workers as u32;
    let remainder = self.config.total_iterations % workers as u32;
    let config = self.config;
    let cancel = Arc::clone(&self.cancel);

    let results: Vec<HashMap<Coord, (u64, f64)>> = (0..workers)
      .into_par_iter()
      .map(|w| {
        let iterations = per_worker + u32::from((w as u32) < remainder);
        run_worker(
          board,
          player,
          &config,
          iterations,
          deadline,
          &cancel,
          seed_base.wrapping_add(w as u64),
        )
      })
      .collect();

    let mut merged: HashMap<Coord, (u64, f64)> = HashMap::new();
    for stats in results {
      for (mv, (visits, wins)) in stats {
        let entry = merged.entry(mv).or_insert((0, 0.0));
        entry.0 += visits;
        entry.1 += wins;
      }
    }

    match select_best(board, player, &merged) {
      Some(best) => Ok(best),
      None => {
        // EngineBudgetExhausted: resolved by the classical fallback.
        warn!("mcts: no visited moves, falling back to classical");
        classical::choose_move(board, player)
      }
    }
  }
}

/// Opening rule: centre if free, otherwise the best-scored empty cell on
/// the rings around the centre.
fn opening_move(board: &Board, player: Player) -> Option<Coord> {
  let c = board.size() / 2;
  if board.is_empty(c, c) {
    return Some(Coord { x: c, y: c });
  }

  let mut best: Option<(i32, Coord)> = None;
  for radius in 1i32..=3 {
    for di in -radius..=radius {
      for dj in -radius..=radius {
        if di.abs() != radius && dj.abs() != radius {
          continue;
        }
        let nx = c as i32 + di;
        let ny = c as i32 + dj;
        if nx < 0 || ny < 0 {
          continue;
        }
        let coord = Coord {
          x: nx as usize,
          y: ny as usize,
        };
        if !board.is_empty(coord.x, coord.y) {
          continue;
        }
        let score = evaluate::evaluate_move(board, coord, player);
        if best.map_or(true, |(s, _)| score > s) {
          best = Some((score, coord));
        }
      }
    }
  }
  best.map(|(_, coord)| coord)
}

/// Weighted final selection over the merged per-move statistics.
fn select_best(
  board: &Board,
  player: Player,
  merged: &HashMap<Coord, (u64, f64)>,
) -> Option<Coord> {
  let mut scored: Vec<(f64, u64, Coord)> = merged
    .iter()
    .filter(|(_, &(visits, _))| visits > 0)
    .map(|(&mv, &(visits, wins))| {
      let win_rate = wins / visits as f64;
      let static_score =
        f64::from(evaluate::evaluate_move(board, mv, player).clamp(0, 1_000_000)) / 1_000_000.0;
      let confidence = (visits as f64 / 100.0).min(1.0);
      let final_score = 0.7 * win_rate + 0.2 * static_score + 0.1 * confidence;
      (final_score, visits, mv)
    })
    .collect();

  scored.sort_by(|a, b| {
    b.0
      .partial_cmp(&a.0)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then(b.1.cmp(&a.1))
      .then(a.2.x.cmp(&b.2.x))
      .then(a.2.y.cmp(&b.2.y))
  });

  scored.first().map(|&(_, _, mv)| mv)
}

struct Node {
  mv: Option<Coord>,
  to_move: Player,
  parent: Option<usize>,
  children: Vec<usize>,
  // Pre-sorted candidate list, created lazily once the node qualifies for
  // expansion; `next_untried` is the cursor into it.
  untried: Option<Vec<Coord>>,
  next_untried: usize,
  visits: u64,
  wins: f64,
  squared_wins: f64,
  terminal: bool,
}

impl Node {
  fn new(mv: Option<Coord>, to_move: Player, parent: Option<usize>, terminal: bool) -> Self {
    Self {
      mv,
      to_move,
      parent,
      children: Vec::new(),
      untried: None,
      next_untried: 0,
      visits: 0,
      wins: 0.0,
      squared_wins: 0.0,
      terminal,
    }
  }
}

fn ucb1(node: &Node, parent_visits: u64, c_puct: f64) -> f64 {
  if node.visits == 0 {
    return f64::INFINITY;
  }
  let visits = node.visits as f64;
  let win_rate = node.wins / visits;
  let mut value = win_rate + c_puct * ((parent_visits as f64).ln() / visits).sqrt();
  if node.visits > 1 {
    let variance = node.squared_wins / visits - win_rate * win_rate;
    if variance > 0.0 {
      value += VARIANCE_WEIGHT * (variance / visits).sqrt();
    }
  }
  value
}

fn widening_limit(visits: u64, exponent: f64) -> usize {
  ((visits as f64).powf(exponent).floor() as usize).max(1)
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
  board: &Board,
  player: Player,
  config: &MctsConfig,
  iterations: u32,
  deadline: Instant,
  cancel: &AtomicBool,
  seed: u64,
) -> HashMap<Coord, (u64, f64)> {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut work = board.clone();

  let mut arena: Vec<Node> = Vec::with_capacity(1024);
  let mut root = Node::new(None, player, None, false);
  root.untried = Some(
    evaluate::ranked_moves(&work, player)
      .into_iter()
      .map(|(_, c)| c)
      .collect(),
  );
  arena.push(root);

  let mut placed: Vec<Coord> = Vec::new();

  for _ in 0..iterations {
    if cancel.load(Ordering::Relaxed) || Instant::now() >= deadline {
      break;
    }

    // Select: descend while fully expanded, then expand a single child
    // under progressive widening.
    let mut idx = 0usize;
    loop {
      if arena[idx].terminal {
        break;
      }

      let visits = arena[idx].visits;
      if visits >= config.min_visits_for_expansion && arena[idx].untried.is_none() {
        let side = arena[idx].to_move;
        let ranked = evaluate::ranked_moves(&work, side)
          .into_iter()
          .map(|(_, c)| c)
          .collect();
        arena[idx].untried = Some(ranked);
      }

      let expandable = visits >= config.min_visits_for_expansion
        && arena[idx].children.len() < widening_limit(visits, config.progressive_widening_exponent)
        && arena[idx]
          .untried
          .as_ref()
          .map_or(false, |u| arena[idx].next_untried < u.len());

      if expandable {
        let cursor = arena[idx].next_untried;
        let mv = match arena[idx].untried.as_ref() {
          Some(untried) => untried[cursor],
          None => break,
        };
        arena[idx].next_untried += 1;
        let mover = arena[idx].to_move;
        work.set(mv.x, mv.y, mover);
        placed.push(mv);

        let terminal = work.has_five_at(mv.x, mv.y);
        let child = Node::new(Some(mv), mover.other(), Some(idx), terminal);
        arena.push(child);
        let child_idx = arena.len() - 1;
        arena[idx].children.push(child_idx);
        idx = child_idx;
        break;
      }

      if arena[idx].children.is_empty() {
        break;
      }

      let parent_visits = arena[idx].visits.max(1);
      let mut best_child = arena[idx].children[0];
      let mut best_value = f64::NEG_INFINITY;
      for &child_idx in &arena[idx].children {
        let value = ucb1(&arena[child_idx], parent_visits, config.c_puct);
        if value > best_value {
          best_value = value;
          best_child = child_idx;
        }
      }
      let mv = match arena[best_child].mv {
        Some(mv) => mv,
        None => break,
      };
      let mover = arena[idx].to_move;
      work.set(mv.x, mv.y, mover);
      placed.push(mv);
      idx = best_child;
    }

    // Simulate
    let outcome = if arena[idx].terminal {
      let mover = arena[idx].to_move.other();
      if mover == player {
        1.0
      } else {
        0.0
      }
    } else {
      simulate(&mut work, arena[idx].to_move, player, config, &mut rng)
    };

    // Backpropagate: each node stores the reward from the perspective of
    // the player who moved into it; the reward flips at every layer.
    let mut reward = if arena[idx].to_move.other() == player {
      outcome
    } else {
      1.0 - outcome
    };
    let mut cursor = Some(idx);
    while let Some(i) = cursor {
      let node = &mut arena[i];
      node.visits += 1;
      node.wins += reward;
      node.squared_wins += reward * reward;
      cursor = node.parent;
      reward = 1.0 - reward;
    }

    // Restore the worker board to the root position
    for mv in placed.drain(..).rev() {
      work.clear_cell(mv.x, mv.y);
    }
  }

  arena[0]
    .children
    .iter()
    .filter_map(|&child_idx| {
      let child = &arena[child_idx];
      child.mv.map(|mv| (mv, (child.visits, child.wins)))
    })
    .collect()
}

// Heuristic playout: immediate win, else immediate block, else a random
// pick among the strongest candidates. All placements are undone before
// returning.
fn simulate(
  work: &mut Board,
  first_to_move: Player,
  ai: Player,
  config: &MctsConfig,
  rng: &mut StdRng,
) -> f64 {
  let mut to_move = first_to_move;
  let mut placed: Vec<Coord> = Vec::new();
  let mut outcome = None;

  for _ in 0..config.max_simulation_depth {
    let candidates = playout_candidates(work, to_move);
    if candidates.is_empty() {
      break;
    }

    let opponent = to_move.other();
    let mv = if let Some(&win) = candidates
      .iter()
      .find(|c| work.makes_five(c.x, c.y, to_move))
    {
      win
    } else if let Some(&block) = candidates
      .iter()
      .find(|c| work.makes_five(c.x, c.y, opponent))
    {
      block
    } else {
      let k = candidates.len().min(PLAYOUT_TOP_K);
      candidates[rng.gen_range(0..k)]
    };

    work.set(mv.x, mv.y, to_move);
    placed.push(mv);

    if work.has_five_at(mv.x, mv.y) {
      outcome = Some(if to_move == ai { 1.0 } else { 0.0 });
      break;
    }
    to_move = opponent;
  }

  let result = outcome.unwrap_or_else(|| bounded_eval(work, ai, rng));
  for mv in placed.into_iter().rev() {
    work.clear_cell(mv.x, mv.y);
  }
  result
}

fn playout_candidates(board: &Board, player: Player) -> Vec<Coord> {
  let mut ranked = evaluate::ranked_moves(board, player);
  ranked.truncate(PLAYOUT_CANDIDATE_CAP);
  ranked.into_iter().map(|(_, c)| c).collect()
}

// Depth-cap scoring: relative evaluator mass of both sides over the
// candidate cells, with a little noise, clipped away from certainty.
fn bounded_eval(board: &Board, ai: Player, rng: &mut StdRng) -> f64 {
  let opponent = ai.other();
  let mut own = 0.0f64;
  let mut opp = 0.0f64;
  for c in evaluate::candidate_moves(board) {
    own += f64::from(evaluate::evaluate_move(board, c, ai).max(0));
    opp += f64::from(evaluate::evaluate_move(board, c, opponent).max(0));
  }
  let total = own + opp;
  if total == 0.0 {
    return 0.5;
  }
  let noise = rng.gen_range(-0.03..0.03);
  (own / total + noise).clamp(0.1, 0.9)
}
