pub mod ai;
pub mod evaluation;
pub mod search;

pub use ai::ChessAI;
pub use evaluation::{evaluate_position, Evaluator, PieceSquareEvaluator, PieceSquareTables, Score};
pub use search::{
    SearchConfig, SearchError, SearchOutcome, SearchStats, Searcher, INFINITY, MATE_SCORE,
};
