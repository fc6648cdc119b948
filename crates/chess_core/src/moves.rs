use std::fmt;

use crate::board::Squares;
use crate::{piece::{Color, PieceType}, Board, Piece, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub move_type: MoveType,
    pub promotion: Option<PieceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveType {
    Normal,
    Capture,
    EnPassant,
    Castle,
}

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2),
    (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1), (1, 1), (1, 0), (1, -1),
    (0, -1), (-1, -1), (-1, 0), (-1, 1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
            move_type: MoveType::Normal,
        }
    }

    pub fn capture(from: Square, to: Square) -> Self {
        Self {
            move_type: MoveType::Capture,
            ..Self::new(from, to)
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceType) -> Self {
        Self {
            promotion: Some(promotion),
            ..Self::new(from, to)
        }
    }

    pub fn en_passant(from: Square, to: Square) -> Self {
        Self {
            move_type: MoveType::EnPassant,
            ..Self::new(from, to)
        }
    }

    pub fn castle(from: Square, to: Square) -> Self {
        Self {
            move_type: MoveType::Castle,
            ..Self::new(from, to)
        }
    }

    pub fn is_capture(&self) -> bool {
        matches!(self.move_type, MoveType::Capture | MoveType::EnPassant)
    }
}

/// Coordinate notation, e.g. `e2e4` or `e7e8q`.
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.letter())?;
        }
        Ok(())
    }
}

/// Moves for the side to move that follow the piece movement rules, without
/// checking whether they leave the own king attacked. Castling is the
/// exception: it is only generated when the king does not start, pass or land
/// on an attacked square.
///
/// Order: origin squares a1..h8, then each piece's direction order.
pub(crate) fn generate_pseudo_legal(board: &Board, moves: &mut Vec<Move>) {
    let color = board.current_turn();
    for from in Square::all() {
        let piece = match board.get_piece(from) {
            Some(piece) if piece.color == color => piece,
            _ => continue,
        };

        match piece.piece_type {
            PieceType::Pawn => pawn_moves(board, from, color, moves),
            PieceType::Knight => step_moves(board, from, color, &KNIGHT_OFFSETS, moves),
            PieceType::Bishop => slide_moves(board, from, color, &BISHOP_DIRECTIONS, moves),
            PieceType::Rook => slide_moves(board, from, color, &ROOK_DIRECTIONS, moves),
            PieceType::Queen => {
                slide_moves(board, from, color, &ROOK_DIRECTIONS, moves);
                slide_moves(board, from, color, &BISHOP_DIRECTIONS, moves);
            }
            PieceType::King => {
                step_moves(board, from, color, &KING_OFFSETS, moves);
                castle_moves(board, from, color, moves);
            }
        }
    }
}

fn pawn_moves(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    let (direction, start_rank, promotion_rank) = match color {
        Color::White => (1, 1, 7),
        Color::Black => (-1, 6, 0),
    };

    if let Some(one_step) = from.offset(0, direction) {
        if board.get_piece(one_step).is_none() {
            push_pawn_move(Move::new(from, one_step), promotion_rank, moves);

            if from.rank == start_rank {
                if let Some(two_steps) = from.offset(0, 2 * direction) {
                    if board.get_piece(two_steps).is_none() {
                        moves.push(Move::new(from, two_steps));
                    }
                }
            }
        }
    }

    for file_delta in [-1, 1] {
        let Some(target) = from.offset(file_delta, direction) else {
            continue;
        };
        match board.get_piece(target) {
            Some(victim) if victim.color != color => {
                push_pawn_move(Move::capture(from, target), promotion_rank, moves)
            }
            None if board.en_passant() == Some(target) => {
                moves.push(Move::en_passant(from, target))
            }
            _ => {}
        }
    }
}

fn push_pawn_move(base: Move, promotion_rank: u8, moves: &mut Vec<Move>) {
    if base.to.rank == promotion_rank {
        for promotion in PieceType::PROMOTIONS {
            moves.push(Move {
                promotion: Some(promotion),
                ..base
            });
        }
    } else {
        moves.push(base);
    }
}

fn step_moves(
    board: &Board,
    from: Square,
    color: Color,
    offsets: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(file_delta, rank_delta) in offsets {
        let Some(target) = from.offset(file_delta, rank_delta) else {
            continue;
        };
        match board.get_piece(target) {
            None => moves.push(Move::new(from, target)),
            Some(victim) if victim.color != color => moves.push(Move::capture(from, target)),
            Some(_) => {}
        }
    }
}

fn slide_moves(
    board: &Board,
    from: Square,
    color: Color,
    directions: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(file_delta, rank_delta) in directions {
        let mut current = from;
        while let Some(target) = current.offset(file_delta, rank_delta) {
            match board.get_piece(target) {
                None => moves.push(Move::new(from, target)),
                Some(victim) => {
                    if victim.color != color {
                        moves.push(Move::capture(from, target));
                    }
                    break;
                }
            }
            current = target;
        }
    }
}

fn castle_moves(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    let back_rank = match color {
        Color::White => 0,
        Color::Black => 7,
    };
    if from != (Square { file: 4, rank: back_rank }) {
        return;
    }

    let squares = board.squares();
    let enemy = color.opposite();
    if is_square_attacked(squares, from, enemy) {
        return;
    }

    let rook = Some(Piece::new(PieceType::Rook, color));
    let at = |file: u8| Square { file, rank: back_rank };
    let empty = |file: u8| squares[at(file).index()].is_none();
    let safe = |file: u8| !is_square_attacked(squares, at(file), enemy);

    let rights = board.castling_rights();
    if rights.kingside(color)
        && squares[at(7).index()] == rook
        && empty(5)
        && empty(6)
        && safe(5)
        && safe(6)
    {
        moves.push(Move::castle(from, at(6)));
    }
    if rights.queenside(color)
        && squares[at(0).index()] == rook
        && empty(1)
        && empty(2)
        && empty(3)
        && safe(3)
        && safe(2)
    {
        moves.push(Move::castle(from, at(2)));
    }
}

/// Rook origin and destination for a castling move.
pub(crate) fn castle_rook_squares(king_move: Move) -> (Square, Square) {
    let rank = king_move.from.rank;
    if king_move.to.file == 6 {
        (Square { file: 7, rank }, Square { file: 5, rank })
    } else {
        (Square { file: 0, rank }, Square { file: 3, rank })
    }
}

/// Whether any piece of `by` attacks `target` on the given placement.
pub(crate) fn is_square_attacked(squares: &Squares, target: Square, by: Color) -> bool {
    let holds = |square: Square, piece_type: PieceType| {
        squares[square.index()] == Some(Piece::new(piece_type, by))
    };

    // An attacking pawn sits one rank behind the target from its own side.
    let pawn_rank_delta = match by {
        Color::White => -1,
        Color::Black => 1,
    };
    for file_delta in [-1, 1] {
        if let Some(square) = target.offset(file_delta, pawn_rank_delta) {
            if holds(square, PieceType::Pawn) {
                return true;
            }
        }
    }

    let steps = [
        (&KNIGHT_OFFSETS, PieceType::Knight),
        (&KING_OFFSETS, PieceType::King),
    ];
    for (offsets, piece_type) in steps {
        for &(file_delta, rank_delta) in offsets.iter() {
            if let Some(square) = target.offset(file_delta, rank_delta) {
                if holds(square, piece_type) {
                    return true;
                }
            }
        }
    }

    let rays = [
        (&ROOK_DIRECTIONS, PieceType::Rook),
        (&BISHOP_DIRECTIONS, PieceType::Bishop),
    ];
    for (directions, slider) in rays {
        for &(file_delta, rank_delta) in directions.iter() {
            if let Some(piece) = first_piece_along(squares, target, file_delta, rank_delta) {
                if piece.color == by
                    && (piece.piece_type == slider || piece.piece_type == PieceType::Queen)
                {
                    return true;
                }
            }
        }
    }

    false
}

fn first_piece_along(
    squares: &Squares,
    from: Square,
    file_delta: i8,
    rank_delta: i8,
) -> Option<Piece> {
    let mut current = from;
    while let Some(next) = current.offset(file_delta, rank_delta) {
        if let Some(piece) = squares[next.index()] {
            return Some(piece);
        }
        current = next;
    }
    None
}
