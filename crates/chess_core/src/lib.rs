// Core chess game logic modules
pub mod board;
pub mod error;
pub mod moves;
pub mod piece;
pub mod square;
pub mod state;

// Re-export main types for convenience
pub use board::{Board, CastlingRights, GameStatus, STARTING_FEN};
pub use error::BoardError;
pub use moves::{Move, MoveType};
pub use piece::{Color, Piece, PieceType};
pub use square::Square;
pub use state::{GameState, PieceLookup};
