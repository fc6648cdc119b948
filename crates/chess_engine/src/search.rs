// Fixed-depth minimax search with alpha-beta pruning over any `GameState`.
//
// The searcher plays moves on the borrowed state and takes them back before
// returning, so the caller's position is unchanged whatever the outcome.
use std::error::Error;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::{piece::Color, GameState};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::evaluation::{Evaluator, Score};

// Search bounds, well outside anything the evaluator can return
pub const INFINITY: Score = 100_000;
// Checkmate seen by terminal detection; reduced by the ply it happens at
pub const MATE_SCORE: Score = 50_000;
pub const DRAW_SCORE: Score = 0;

pub const DEFAULT_DEPTH: u8 = 3;

// How often the clock is read while a time limit is set
const TIME_CHECK_INTERVAL: u64 = 1024;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("no legal moves in the root position")]
    NoLegalMoves,
    #[error("game state failed during search: {0}")]
    State(#[source] Box<dyn Error + Send + Sync>),
}

impl SearchError {
    pub(crate) fn state<E: Error + Send + Sync + 'static>(error: E) -> Self {
        SearchError::State(Box::new(error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Plies searched below the root.
    pub depth: u8,
    /// Alpha-beta cutoffs. Disabling gives plain exhaustive minimax.
    pub pruning: bool,
    /// Score checkmate and draws inside the tree instead of only looking at
    /// material at the horizon.
    pub detect_terminal: bool,
    pub max_nodes: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            pruning: true,
            detect_terminal: false,
            max_nodes: None,
            time_limit: None,
        }
    }
}

impl SearchConfig {
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_pruning(mut self, pruning: bool) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_terminal_detection(mut self, detect_terminal: bool) -> Self {
        self.detect_terminal = detect_terminal;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    fn unbounded(self) -> Self {
        Self {
            max_nodes: None,
            time_limit: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub cutoffs: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome<M> {
    pub best_move: M,
    /// Score of `best_move` for the side that moved at the root. `None` when
    /// the search was stopped before any root move was fully searched.
    pub score: Option<Score>,
    pub depth: u8,
    /// False when a node budget, time limit or stop request cut the search
    /// short; `best_move` is then the best of the root moves finished so far.
    pub completed: bool,
    pub stats: SearchStats,
}

// Why a subtree walk ended early
enum Halt {
    Stopped,
    Failed(SearchError),
}

impl From<SearchError> for Halt {
    fn from(error: SearchError) -> Self {
        Halt::Failed(error)
    }
}

// Per-call bookkeeping. Atomics so root subtrees can share it across threads.
struct SearchContext<'a> {
    perspective: Color,
    started: Instant,
    max_nodes: Option<u64>,
    time_limit: Option<Duration>,
    stop: &'a AtomicBool,
    nodes: AtomicU64,
    cutoffs: AtomicU64,
}

impl<'a> SearchContext<'a> {
    fn new(config: &SearchConfig, stop: &'a AtomicBool, perspective: Color) -> Self {
        Self {
            perspective,
            started: Instant::now(),
            max_nodes: config.max_nodes,
            time_limit: config.time_limit,
            stop,
            nodes: AtomicU64::new(0),
            cutoffs: AtomicU64::new(0),
        }
    }

    // Counts a node and checks the budget before it is searched
    fn visit(&self) -> Result<(), Halt> {
        if self.stop.load(Ordering::Relaxed) {
            return Err(Halt::Stopped);
        }

        let nodes = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        let out_of_nodes = self.max_nodes.map_or(false, |max| nodes > max);
        let out_of_time = self.time_limit.map_or(false, |limit| {
            nodes % TIME_CHECK_INTERVAL == 1 && self.started.elapsed() >= limit
        });

        if out_of_nodes || out_of_time {
            self.stop.store(true, Ordering::Relaxed);
            return Err(Halt::Stopped);
        }
        Ok(())
    }

    fn record_cutoff(&self, depth: u8, ply: u8) {
        self.cutoffs.fetch_add(1, Ordering::Relaxed);
        trace!("cutoff at ply {} with {} plies left", ply, depth);
    }

    fn stats(&self) -> SearchStats {
        SearchStats {
            nodes: self.nodes.load(Ordering::Relaxed),
            cutoffs: self.cutoffs.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Chooses moves by fixed-depth minimax with alpha-beta pruning, scoring
/// leaves with `E`.
///
/// The side to move at the root is the maximizing side; evaluator scores,
/// which are White-relative, are re-signed for it at the leaves so both
/// branches use plain max/min.
///
/// A searcher runs one search at a time. Every search starts by clearing the
/// shared stop flag, so concurrent searches need a searcher each; the
/// parallel variant already spreads a single search over the rayon pool.
#[derive(Debug)]
pub struct Searcher<E> {
    evaluator: E,
    config: SearchConfig,
    stop: Arc<AtomicBool>,
}

impl<E: Default> Default for Searcher<E> {
    fn default() -> Self {
        Self::new(E::default(), SearchConfig::default())
    }
}

impl<E> Searcher<E> {
    pub fn new(evaluator: E, config: SearchConfig) -> Self {
        Self {
            evaluator,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SearchConfig) {
        self.config = config;
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Flag another thread can raise to end the running search early. It is
    /// cleared when a new search starts, so raising it before a search begins
    /// has no effect.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Best move for the side to move, searched to the configured depth.
    pub fn choose_move<S>(&self, state: &mut S) -> Result<SearchOutcome<S::Move>, SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.choose_move_to_depth(state, self.config.depth)
    }

    /// Best move for the side to move, searching `depth` plies. Depth 0
    /// behaves like depth 1: every root move is scored statically.
    ///
    /// Ties keep the earliest move in `legal_moves` order.
    pub fn choose_move_to_depth<S>(
        &self,
        state: &mut S,
        depth: u8,
    ) -> Result<SearchOutcome<S::Move>, SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.stop.store(false, Ordering::SeqCst);
        let perspective = state.side_to_move();
        let moves = state.legal_moves();
        if moves.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let context = SearchContext::new(&self.config, &self.stop, perspective);
        let child_depth = depth.saturating_sub(1);
        let mut best: Option<(usize, Score)> = None;
        let mut alpha = -INFINITY;
        let mut completed = true;

        for (index, mv) in moves.iter().enumerate() {
            match self.score_child(&context, state, mv, child_depth, 1, alpha, INFINITY, false) {
                Ok(score) => {
                    debug!("root move {:?} scored {}", mv, score);
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((index, score));
                    }
                    if self.config.pruning {
                        alpha = alpha.max(score);
                    }
                }
                Err(Halt::Stopped) => {
                    completed = false;
                    break;
                }
                Err(Halt::Failed(error)) => return Err(error),
            }
        }

        Ok(finish(moves, best, depth, completed, &context))
    }

    /// Same result as `choose_move`, with the root moves searched in
    /// parallel. Each worker explores its subtree on its own clone of the
    /// state, so `state` itself is never modified.
    pub fn choose_move_parallel<S>(&self, state: &S) -> Result<SearchOutcome<S::Move>, SearchError>
    where
        S: GameState + Clone + Send + Sync,
        S::Move: Send + Sync,
        E: Evaluator<S>,
    {
        self.choose_move_parallel_to_depth(state, self.config.depth)
    }

    pub fn choose_move_parallel_to_depth<S>(
        &self,
        state: &S,
        depth: u8,
    ) -> Result<SearchOutcome<S::Move>, SearchError>
    where
        S: GameState + Clone + Send + Sync,
        S::Move: Send + Sync,
        E: Evaluator<S>,
    {
        self.stop.store(false, Ordering::SeqCst);
        let perspective = state.side_to_move();
        let moves = state.legal_moves();
        if moves.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let context = SearchContext::new(&self.config, &self.stop, perspective);
        let child_depth = depth.saturating_sub(1);

        // Full window per root move: the scores are exact and independent of
        // which worker finishes first.
        let results: Vec<Result<Score, Halt>> = moves
            .par_iter()
            .map(|mv| {
                let mut local = state.clone();
                self.score_child(&context, &mut local, mv, child_depth, 1, -INFINITY, INFINITY, false)
            })
            .collect();

        let mut best: Option<(usize, Score)> = None;
        let mut completed = true;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(score) => {
                    debug!("root move {:?} scored {}", moves[index], score);
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((index, score));
                    }
                }
                Err(Halt::Stopped) => completed = false,
                Err(Halt::Failed(error)) => return Err(error),
            }
        }

        Ok(finish(moves, best, depth, completed, &context))
    }

    /// Minimax value of `state` searched `depth` more plies, relative to
    /// `perspective`, within the `alpha`/`beta` window. `maximizing` says
    /// whether the side to move in `state` is the one `perspective` names.
    ///
    /// Node and time budgets do not apply here.
    pub fn score_subtree<S>(
        &self,
        state: &mut S,
        depth: u8,
        alpha: Score,
        beta: Score,
        maximizing: bool,
        perspective: Color,
    ) -> Result<Score, SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        let never = AtomicBool::new(false);
        let context = SearchContext::new(&self.config.unbounded(), &never, perspective);
        match self.search_node(&context, state, depth, 0, alpha, beta, maximizing) {
            Ok(score) => Ok(score),
            Err(Halt::Failed(error)) => Err(error),
            Err(Halt::Stopped) => unreachable!("search without a budget was stopped"),
        }
    }

    // Apply, search, and always undo, whatever the search returned
    #[allow(clippy::too_many_arguments)]
    fn score_child<S>(
        &self,
        context: &SearchContext<'_>,
        state: &mut S,
        mv: &S::Move,
        depth: u8,
        ply: u8,
        alpha: Score,
        beta: Score,
        maximizing: bool,
    ) -> Result<Score, Halt>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        state.apply_move(mv).map_err(SearchError::state)?;
        let result = self.search_node(context, state, depth, ply, alpha, beta, maximizing);
        state.undo_last_move().map_err(SearchError::state)?;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn search_node<S>(
        &self,
        context: &SearchContext<'_>,
        state: &mut S,
        depth: u8,
        ply: u8,
        mut alpha: Score,
        mut beta: Score,
        maximizing: bool,
    ) -> Result<Score, Halt>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        context.visit()?;

        if self.config.detect_terminal {
            if let Some(score) = terminal_score(state, ply, context.perspective) {
                return Ok(score);
            }
        }

        if depth == 0 {
            return Ok(context.perspective.sign() * self.evaluator.evaluate(state));
        }

        // Without terminal detection a node with no moves keeps its starting
        // bound: a side that cannot move is treated as lost.
        let moves = state.legal_moves();
        if maximizing {
            let mut best = -INFINITY;
            for mv in &moves {
                let score =
                    self.score_child(context, state, mv, depth - 1, ply + 1, alpha, beta, false)?;
                best = best.max(score);
                if self.config.pruning {
                    alpha = alpha.max(best);
                    if beta <= alpha {
                        context.record_cutoff(depth, ply);
                        break;
                    }
                }
            }
            Ok(best)
        } else {
            let mut best = INFINITY;
            for mv in &moves {
                let score =
                    self.score_child(context, state, mv, depth - 1, ply + 1, alpha, beta, true)?;
                best = best.min(score);
                if self.config.pruning {
                    beta = beta.min(best);
                    if beta <= alpha {
                        context.record_cutoff(depth, ply);
                        break;
                    }
                }
            }
            Ok(best)
        }
    }
}

fn terminal_score<S: GameState>(state: &S, ply: u8, perspective: Color) -> Option<Score> {
    if state.is_checkmate() {
        // Faster mates score higher
        let mate = MATE_SCORE - Score::from(ply);
        return Some(if state.side_to_move() == perspective {
            -mate
        } else {
            mate
        });
    }
    if state.is_draw() {
        return Some(DRAW_SCORE);
    }
    None
}

fn finish<M: Debug>(
    mut moves: Vec<M>,
    best: Option<(usize, Score)>,
    depth: u8,
    completed: bool,
    context: &SearchContext<'_>,
) -> SearchOutcome<M> {
    let stats = context.stats();
    // Nothing finished: fall back to the first move in enumeration order
    let (index, score) = match best {
        Some((index, score)) => (index, Some(score)),
        None => (0, None),
    };
    let best_move = moves.swap_remove(index);

    if completed {
        info!(
            "depth {} search: best {:?} score {:?}, {} nodes, {} cutoffs in {:?}",
            depth, best_move, score, stats.nodes, stats.cutoffs, stats.elapsed
        );
    } else {
        warn!(
            "depth {} search stopped after {} nodes in {:?}; playing {:?} (score {:?})",
            depth, stats.nodes, stats.elapsed, best_move, score
        );
    }

    SearchOutcome {
        best_move,
        score,
        depth,
        completed,
        stats,
    }
}

#[cfg(test)]
mod tests;
