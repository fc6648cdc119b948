use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::trace;

use crate::moves::{castle_rook_squares, generate_pseudo_legal, is_square_attacked};
use crate::{piece::{Color, PieceType}, BoardError, Move, MoveType, Piece, Square};

/// Piece placement indexed by `Square::index`.
pub(crate) type Squares = [Option<Piece>; 64];

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// Fifty moves by each side without a capture or pawn move
const FIFTY_MOVE_HALFMOVES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self {
            white_kingside: true,
            white_queenside: true,
            black_kingside: true,
            black_queenside: true,
        }
    }
}

impl CastlingRights {
    pub fn none() -> Self {
        Self {
            white_kingside: false,
            white_queenside: false,
            black_kingside: false,
            black_queenside: false,
        }
    }

    pub fn kingside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_kingside,
            Color::Black => self.black_kingside,
        }
    }

    pub fn queenside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_queenside,
            Color::Black => self.black_queenside,
        }
    }

    /// Drops the rights touched by a move: a king or rook leaving its home
    /// square, or a rook being captured there.
    fn update_for_move(&mut self, chess_move: Move) {
        for square in [chess_move.from, chess_move.to] {
            match (square.file, square.rank) {
                (4, 0) => {
                    self.white_kingside = false;
                    self.white_queenside = false;
                }
                (0, 0) => self.white_queenside = false,
                (7, 0) => self.white_kingside = false,
                (4, 7) => {
                    self.black_kingside = false;
                    self.black_queenside = false;
                }
                (0, 7) => self.black_queenside = false,
                (7, 7) => self.black_kingside = false,
                _ => {}
            }
        }
    }

    fn swapped(self) -> Self {
        Self {
            white_kingside: self.black_kingside,
            white_queenside: self.black_queenside,
            black_kingside: self.white_kingside,
            black_queenside: self.white_queenside,
        }
    }

    fn from_fen(field: &str) -> Result<Self, BoardError> {
        let mut rights = Self::none();
        if field == "-" {
            return Ok(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.white_kingside = true,
                'Q' => rights.white_queenside = true,
                'k' => rights.black_kingside = true,
                'q' => rights.black_queenside = true,
                _ => return Err(BoardError::fen(format!("bad castling field {:?}", field))),
            }
        }
        Ok(rights)
    }

    fn to_fen(self) -> String {
        let field: String = [
            (self.white_kingside, 'K'),
            (self.white_queenside, 'Q'),
            (self.black_kingside, 'k'),
            (self.black_queenside, 'q'),
        ]
        .iter()
        .filter(|(allowed, _)| *allowed)
        .map(|(_, c)| *c)
        .collect();

        if field.is_empty() {
            "-".to_string()
        } else {
            field
        }
    }
}

/// Result of the host-facing terminal queries, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Checkmate,
    Draw,
    Check,
    InProgress,
}

// Everything needed to take back one move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UndoRecord {
    chess_move: Move,
    moved: Piece,
    captured: Option<Piece>,
    castling_rights: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: Squares,
    current_turn: Color,
    castling_rights: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    history: Vec<UndoRecord>,
    // One key per position reached, the current one last
    position_keys: Vec<u64>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let mut board = Self::empty();
        board.setup_initial_position();
        board.position_keys.push(board.position_key());
        board
    }

    fn empty() -> Self {
        Self {
            squares: [None; 64],
            current_turn: Color::White,
            castling_rights: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            history: Vec::new(),
            position_keys: Vec::new(),
        }
    }

    fn setup_initial_position(&mut self) {
        for file in 0..8 {
            self.squares[Square { file, rank: 1 }.index()] =
                Some(Piece::new(PieceType::Pawn, Color::White));
            self.squares[Square { file, rank: 6 }.index()] =
                Some(Piece::new(PieceType::Pawn, Color::Black));
        }

        let piece_order = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];

        for (file, &piece_type) in (0..8).zip(piece_order.iter()) {
            self.squares[Square { file, rank: 0 }.index()] =
                Some(Piece::new(piece_type, Color::White));
            self.squares[Square { file, rank: 7 }.index()] =
                Some(Piece::new(piece_type, Color::Black));
        }

        self.castling_rights = CastlingRights::default();
    }

    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if !(4..=6).contains(&fields.len()) {
            return Err(BoardError::fen(format!(
                "expected 4 to 6 fields, found {}",
                fields.len()
            )));
        }

        let mut board = Self::empty();
        let rows: Vec<&str> = fields[0].split('/').collect();
        if rows.len() != 8 {
            return Err(BoardError::fen(format!("expected 8 ranks, found {}", rows.len())));
        }

        for (row, text) in rows.iter().enumerate() {
            let rank = 7 - row as u8;
            let mut file = 0u8;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(BoardError::fen(format!("bad empty-square count {:?}", c)));
                    }
                    file += skip as u8;
                    if file > 8 {
                        return Err(BoardError::fen(format!(
                            "rank {} has more than 8 squares",
                            rank + 1
                        )));
                    }
                } else {
                    let piece = Piece::from_fen(c)?;
                    let square = Square::new(file, rank).ok_or_else(|| {
                        BoardError::fen(format!("rank {} has more than 8 squares", rank + 1))
                    })?;
                    board.squares[square.index()] = Some(piece);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(BoardError::fen(format!(
                    "rank {} describes {} squares",
                    rank + 1,
                    file
                )));
            }
        }

        board.current_turn = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(BoardError::fen(format!("bad side to move {:?}", other))),
        };
        board.castling_rights = CastlingRights::from_fen(fields[2])?;
        board.en_passant = match fields[3] {
            "-" => None,
            text => {
                let square = Square::from_algebraic(text)
                    .ok_or_else(|| BoardError::InvalidSquare(text.to_string()))?;
                board.check_en_passant(square)?;
                Some(square)
            }
        };
        board.halfmove_clock = parse_counter(fields.get(4), 0)?;
        board.fullmove_number = parse_counter(fields.get(5), 1)?;

        for color in [Color::White, Color::Black] {
            let kings = board
                .get_all_pieces()
                .filter(|(_, piece)| *piece == Piece::new(PieceType::King, color))
                .count();
            if kings != 1 {
                return Err(BoardError::fen(format!("{} has {} kings", color, kings)));
            }
        }

        board.position_keys.push(board.position_key());
        Ok(board)
    }

    // The target must be the empty square a double-stepped enemy pawn
    // just passed over.
    fn check_en_passant(&self, target: Square) -> Result<(), BoardError> {
        let mover = self.current_turn;
        let (target_rank, pawn_rank) = match mover {
            Color::White => (5, 4),
            Color::Black => (2, 3),
        };
        let enemy_pawn = Piece::new(PieceType::Pawn, mover.opposite());
        let pawn_square = Square {
            file: target.file,
            rank: pawn_rank,
        };
        if target.rank != target_rank
            || self.squares[target.index()].is_some()
            || self.squares[pawn_square.index()] != Some(enemy_pawn)
        {
            return Err(BoardError::fen(format!(
                "en passant square {} is not behind a {} pawn",
                target,
                mover.opposite()
            )));
        }
        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.squares[Square { file, rank }.index()] {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.to_fen());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let side = match self.current_turn {
            Color::White => "w",
            Color::Black => "b",
        };
        let en_passant = self
            .en_passant
            .map_or_else(|| "-".to_string(), |square| square.to_string());

        format!(
            "{} {} {} {} {} {}",
            placement,
            side,
            self.castling_rights.to_fen(),
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn get_piece(&self, pos: Square) -> Option<Piece> {
        self.squares[pos.index()]
    }

    pub(crate) fn squares(&self) -> &Squares {
        &self.squares
    }

    pub fn get_all_pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |square| self.get_piece(square).map(|piece| (square, piece)))
    }

    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Number of moves that can still be taken back.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|record| record.chess_move)
    }

    /// Moves played on this board, oldest first.
    pub fn moves_played(&self) -> impl Iterator<Item = Move> + '_ {
        self.history.iter().map(|record| record.chess_move)
    }

    /// All legal moves for the side to move, ordered by origin square
    /// (a1..h8) and then by each piece's direction order.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        generate_pseudo_legal(self, &mut moves);
        moves.retain(|&chess_move| self.is_legal(chess_move));
        moves
    }

    /// Legal moves of the piece on `pos`, empty if it is not that side's turn.
    pub fn get_valid_moves(&self, pos: Square) -> Vec<Move> {
        match self.get_piece(pos) {
            Some(piece) if piece.color == self.current_turn => self
                .legal_moves()
                .into_iter()
                .filter(|chess_move| chess_move.from == pos)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn has_legal_move(&self) -> bool {
        let mut moves = Vec::with_capacity(48);
        generate_pseudo_legal(self, &mut moves);
        moves.into_iter().any(|chess_move| self.is_legal(chess_move))
    }

    // A pseudo-legal move is legal when it does not leave the mover's king attacked
    fn is_legal(&self, chess_move: Move) -> bool {
        let color = self.current_turn;
        let mut scratch = self.squares;
        move_pieces(&mut scratch, chess_move);
        match king_square_in(&scratch, color) {
            Some(king) => !is_square_attacked(&scratch, king, color.opposite()),
            None => true,
        }
    }

    /// Looks up a legal move written in coordinate notation (`e2e4`, `e7e8q`).
    /// A promotion without a piece letter promotes to a queen.
    pub fn find_move(&self, notation: &str) -> Result<Move, BoardError> {
        let notation = notation.trim().to_ascii_lowercase();
        let queening = format!("{}q", notation);
        let moves = self.legal_moves();
        moves
            .iter()
            .find(|chess_move| chess_move.to_string() == notation)
            .or_else(|| {
                moves
                    .iter()
                    .find(|chess_move| chess_move.to_string() == queening)
            })
            .copied()
            .ok_or(BoardError::UnknownMove(notation))
    }

    /// Plays a move after checking it against the legal moves.
    pub fn make_move(&mut self, chess_move: Move) -> Result<(), BoardError> {
        if !self.legal_moves().contains(&chess_move) {
            return Err(BoardError::IllegalMove(chess_move));
        }
        self.make_move_without_validation(chess_move)
    }

    /// Plays a move taken from `legal_moves` without regenerating them. Only
    /// the origin square is checked.
    pub fn make_move_without_validation(&mut self, chess_move: Move) -> Result<(), BoardError> {
        let piece = self
            .get_piece(chess_move.from)
            .ok_or(BoardError::EmptySquare(chess_move.from))?;
        if piece.color != self.current_turn {
            return Err(BoardError::WrongSide {
                square: chess_move.from,
                color: piece.color,
            });
        }

        let mut record = UndoRecord {
            chess_move,
            moved: piece,
            captured: None,
            castling_rights: self.castling_rights,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        };

        record.captured = move_pieces(&mut self.squares, chess_move);
        self.castling_rights.update_for_move(chess_move);

        let is_pawn = piece.piece_type == PieceType::Pawn;
        let rank_distance = (chess_move.to.rank as i8 - chess_move.from.rank as i8).abs();
        self.en_passant = if is_pawn && rank_distance == 2 {
            Square::new(chess_move.from.file, (chess_move.from.rank + chess_move.to.rank) / 2)
        } else {
            None
        };

        if is_pawn || record.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if piece.color == Color::Black {
            self.fullmove_number += 1;
        }
        self.current_turn = self.current_turn.opposite();

        trace!("played {} ({:?})", chess_move, piece);
        self.history.push(record);
        self.position_keys.push(self.position_key());
        Ok(())
    }

    /// Takes back the most recent move.
    pub fn undo_move(&mut self) -> Result<Move, BoardError> {
        let record = self.history.pop().ok_or(BoardError::NothingToUndo)?;
        self.position_keys.pop();

        let chess_move = record.chess_move;
        self.squares[chess_move.to.index()] = None;
        self.squares[chess_move.from.index()] = Some(record.moved);
        match chess_move.move_type {
            MoveType::EnPassant => {
                let victim = Square {
                    file: chess_move.to.file,
                    rank: chess_move.from.rank,
                };
                self.squares[victim.index()] = record.captured;
            }
            MoveType::Castle => {
                let (rook_from, rook_to) = castle_rook_squares(chess_move);
                self.squares[rook_from.index()] = self.squares[rook_to.index()].take();
            }
            MoveType::Normal | MoveType::Capture => {
                self.squares[chess_move.to.index()] = record.captured;
            }
        }

        self.castling_rights = record.castling_rights;
        self.en_passant = record.en_passant;
        self.halfmove_clock = record.halfmove_clock;
        self.fullmove_number = record.fullmove_number;
        self.current_turn = record.moved.color;
        Ok(chess_move)
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        king_square_in(&self.squares, color)
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        self.king_square(color)
            .map_or(false, |king| self.is_position_under_attack(king, color))
    }

    pub fn is_position_under_attack(&self, pos: Square, defending_color: Color) -> bool {
        is_square_attacked(&self.squares, pos, defending_color.opposite())
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_in_check(self.current_turn) && !self.has_legal_move()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_in_check(self.current_turn) && !self.has_legal_move()
    }

    pub fn has_insufficient_material(&self) -> bool {
        let mut white_pieces = Vec::new();
        let mut black_pieces = Vec::new();

        for (square, piece) in self.get_all_pieces() {
            if piece.piece_type == PieceType::King {
                continue;
            }
            match piece.color {
                Color::White => white_pieces.push((square, piece.piece_type)),
                Color::Black => black_pieces.push((square, piece.piece_type)),
            }
        }

        let is_minor = |piece_type: PieceType| {
            matches!(piece_type, PieceType::Bishop | PieceType::Knight)
        };

        match (white_pieces.as_slice(), black_pieces.as_slice()) {
            // King vs King
            ([], []) => true,
            // King and Bishop/Knight vs King
            ([(_, lone)], []) | ([], [(_, lone)]) => is_minor(*lone),
            // King and Bishop vs King and Bishop on the same square color
            ([(white_square, PieceType::Bishop)], [(black_square, PieceType::Bishop)]) => {
                (white_square.file + white_square.rank) % 2
                    == (black_square.file + black_square.rank) % 2
            }
            _ => false,
        }
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= FIFTY_MOVE_HALFMOVES
    }

    pub fn is_threefold_repetition(&self) -> bool {
        let Some(current) = self.position_keys.last() else {
            return false;
        };
        self.position_keys.iter().filter(|key| *key == current).count() >= 3
    }

    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw()
            || self.has_insufficient_material()
            || self.is_threefold_repetition()
            || self.is_stalemate()
    }

    pub fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    pub fn status(&self) -> GameStatus {
        if self.is_checkmate() {
            GameStatus::Checkmate
        } else if self.is_draw() {
            GameStatus::Draw
        } else if self.is_in_check(self.current_turn) {
            GameStatus::Check
        } else {
            GameStatus::InProgress
        }
    }

    /// The same position seen from the other side: colors swapped, ranks
    /// mirrored. Move history is not carried over.
    pub fn mirrored(&self) -> Self {
        let mut mirrored = Self::empty();
        for (square, piece) in self.get_all_pieces() {
            mirrored.squares[square.mirror_rank().index()] =
                Some(Piece::new(piece.piece_type, piece.color.opposite()));
        }
        mirrored.current_turn = self.current_turn.opposite();
        mirrored.castling_rights = self.castling_rights.swapped();
        mirrored.en_passant = self.en_passant.map(Square::mirror_rank);
        mirrored.halfmove_clock = self.halfmove_clock;
        mirrored.fullmove_number = self.fullmove_number;
        mirrored.position_keys.push(mirrored.position_key());
        mirrored
    }

    fn position_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.squares.hash(&mut hasher);
        self.current_turn.hash(&mut hasher);
        self.castling_rights.hash(&mut hasher);
        self.en_passant.hash(&mut hasher);
        hasher.finish()
    }
}

fn parse_counter(field: Option<&&str>, default: u32) -> Result<u32, BoardError> {
    match field {
        Some(text) => text
            .parse()
            .map_err(|_| BoardError::fen(format!("bad move counter {:?}", text))),
        None => Ok(default),
    }
}

fn king_square_in(squares: &Squares, color: Color) -> Option<Square> {
    let king = Some(Piece::new(PieceType::King, color));
    Square::all().find(|square| squares[square.index()] == king)
}

/// Moves the pieces for `chess_move` and returns the captured piece, if any.
pub(crate) fn move_pieces(squares: &mut Squares, chess_move: Move) -> Option<Piece> {
    let piece = squares[chess_move.from.index()].take()?;

    let captured = match chess_move.move_type {
        MoveType::EnPassant => {
            let victim = Square {
                file: chess_move.to.file,
                rank: chess_move.from.rank,
            };
            squares[victim.index()].take()
        }
        MoveType::Castle => {
            let (rook_from, rook_to) = castle_rook_squares(chess_move);
            squares[rook_to.index()] = squares[rook_from.index()].take();
            None
        }
        MoveType::Normal | MoveType::Capture => squares[chess_move.to.index()].take(),
    };

    squares[chess_move.to.index()] = Some(match chess_move.promotion {
        Some(promotion) => Piece::new(promotion, piece.color),
        None => piece,
    });
    captured
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   +------------------------+")?;
        for rank in (0..8).rev() {
            write!(f, " {} |", rank + 1)?;
            for file in 0..8 {
                let symbol = self.squares[Square { file, rank }.index()]
                    .map_or('.', |piece| piece.to_fen());
                write!(f, " {} ", symbol)?;
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "   +------------------------+")?;
        write!(f, "     a  b  c  d  e  f  g  h")
    }
}
