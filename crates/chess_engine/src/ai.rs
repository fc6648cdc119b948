use chess_core::{Board, GameState, Move};
use log::info;
use std::time::{Duration, Instant};

use crate::evaluation::PieceSquareEvaluator;
use crate::search::{SearchConfig, SearchError, SearchOutcome, Searcher, DEFAULT_DEPTH};

const MIN_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 6;

/// Chess player on top of the searcher with the standard evaluation.
#[derive(Debug)]
pub struct ChessAI {
    searcher: Searcher<PieceSquareEvaluator>,
    parallel: bool,
}

impl ChessAI {
    pub fn new(depth: u8) -> Self {
        Self::with_config(SearchConfig::default().with_depth(depth))
    }

    pub fn with_config(config: SearchConfig) -> Self {
        let depth = config.depth.clamp(MIN_DEPTH, MAX_DEPTH);
        ChessAI {
            searcher: Searcher::new(PieceSquareEvaluator::default(), config.with_depth(depth)),
            parallel: false,
        }
    }

    pub fn depth(&self) -> u8 {
        self.searcher.config().depth
    }

    pub fn searcher(&self) -> &Searcher<PieceSquareEvaluator> {
        &self.searcher
    }

    pub fn set_max_time(&mut self, duration: Duration) {
        let config = self.searcher.config().with_time_limit(duration);
        self.searcher.set_config(config);
    }

    /// Searches the root moves on a rayon pool instead of one thread.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Searches `board` for the side to move. Returns `None` once the game
    /// is decided; the board is left as it was.
    pub fn get_move(&self, board: &Board) -> Result<Option<SearchOutcome<Move>>, SearchError> {
        if board.is_game_over() {
            return Ok(None);
        }

        let outcome = if self.parallel {
            self.searcher.choose_move_parallel(board)?
        } else {
            let mut scratch = board.clone();
            self.searcher.choose_move(&mut scratch)?
        };
        Ok(Some(outcome))
    }

    /// Searches and plays the chosen move on `board`.
    pub fn play_move(&self, board: &mut Board) -> Result<Option<Move>, SearchError> {
        let start_time = Instant::now();
        let outcome = match self.get_move(board)? {
            Some(outcome) => outcome,
            None => return Ok(None),
        };

        board
            .apply_move(&outcome.best_move)
            .map_err(SearchError::state)?;
        info!(
            "{} played {} (score {:?}) after {:?}",
            board.current_turn().opposite(),
            outcome.best_move,
            outcome.score,
            start_time.elapsed()
        );
        Ok(Some(outcome.best_move))
    }
}

impl Default for ChessAI {
    fn default() -> Self {
        ChessAI::new(DEFAULT_DEPTH)
    }
}
