//! The view of a game that the search engine works against.
//!
//! The engine never builds positions itself. It borrows one, enumerates and
//! plays moves on it, and takes every move back before returning.

use std::error::Error;
use std::fmt::Debug;

use crate::{piece::Color, Board, BoardError, Move, Piece, Square};

/// A two-player game position that can be searched by applying and undoing
/// moves in place.
pub trait GameState {
    type Move: Clone + PartialEq + Debug;
    type Error: Error + Send + Sync + 'static;

    fn side_to_move(&self) -> Color;

    /// Legal moves for the side to move. The order must be deterministic,
    /// search tie-breaks depend on it.
    fn legal_moves(&self) -> Vec<Self::Move>;

    fn apply_move(&mut self, mv: &Self::Move) -> Result<(), Self::Error>;

    /// Reverses the most recent `apply_move`. Calls nest LIFO.
    fn undo_last_move(&mut self) -> Result<(), Self::Error>;

    fn is_checkmate(&self) -> bool;

    fn is_draw(&self) -> bool;

    /// Whether the side to move is in check.
    fn is_in_check(&self) -> bool;

    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }
}

/// Read access to an 8x8 piece placement.
pub trait PieceLookup {
    fn piece_at(&self, square: Square) -> Option<Piece>;
}

impl GameState for Board {
    type Move = Move;
    type Error = BoardError;

    fn side_to_move(&self) -> Color {
        self.current_turn()
    }

    fn legal_moves(&self) -> Vec<Move> {
        Board::legal_moves(self)
    }

    fn apply_move(&mut self, mv: &Move) -> Result<(), BoardError> {
        self.make_move_without_validation(*mv)
    }

    fn undo_last_move(&mut self) -> Result<(), BoardError> {
        self.undo_move().map(|_| ())
    }

    fn is_checkmate(&self) -> bool {
        Board::is_checkmate(self)
    }

    fn is_draw(&self) -> bool {
        Board::is_draw(self)
    }

    fn is_in_check(&self) -> bool {
        Board::is_in_check(self, self.current_turn())
    }

    fn is_game_over(&self) -> bool {
        Board::is_game_over(self)
    }
}

impl PieceLookup for Board {
    fn piece_at(&self, square: Square) -> Option<Piece> {
        self.get_piece(square)
    }
}
