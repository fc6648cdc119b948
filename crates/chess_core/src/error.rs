use thiserror::Error;

use crate::{Color, Move, Square};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Invalid FEN: {reason}")]
    InvalidFen { reason: String },
    #[error("Invalid piece character {0:?}")]
    InvalidPiece(char),
    #[error("Invalid square {0:?}")]
    InvalidSquare(String),
    #[error("Invalid color {0:?}")]
    InvalidColor(String),
    #[error("No piece at starting square {0}")]
    EmptySquare(Square),
    #[error("Piece on {square} belongs to {color}, but it is not their turn")]
    WrongSide { square: Square, color: Color },
    #[error("Illegal move {0}")]
    IllegalMove(Move),
    #[error("Unrecognized move {0:?}")]
    UnknownMove(String),
    #[error("No move to undo")]
    NothingToUndo,
}

impl BoardError {
    pub(crate) fn fen(reason: impl Into<String>) -> Self {
        BoardError::InvalidFen {
            reason: reason.into(),
        }
    }
}
