use chess_core::{piece::{Color, PieceType}, Board, PieceLookup, Square};
use once_cell::sync::Lazy;

/// Search and evaluation score. Positive favors White in absolute
/// evaluations; the searcher re-signs it for the side it plays.
pub type Score = i32;

// Material values scaled by ten so the half-point steps of the piece-square
// tables stay integers. Only the ratios matter.
const PAWN_VALUE: Score = 100;
const KNIGHT_VALUE: Score = 300;
const BISHOP_VALUE: Score = 300;
const ROOK_VALUE: Score = 500;
const QUEEN_VALUE: Score = 900;
const KING_VALUE: Score = 9000; // Losing the king outweighs all other material

// Piece-square tables define bonuses/penalties for piece positions.
// Written from White's perspective with the 8th rank in the first row;
// Black reads them with ranks mirrored.

// Pawn position table:
// - Encourages pawns to advance (higher values near promotion)
// - Rewards central pawns (higher values in d,e files)
const PAWN_TABLE: [[Score; 8]; 8] = [
    [0,  0,  0,  0,  0,  0,  0,  0],    // 8th rank
    [50, 50, 50, 50, 50, 50, 50, 50],   // 7th rank (near promotion)
    [10, 10, 20, 30, 30, 20, 10, 10],
    [5,  5, 10, 25, 25, 10,  5,  5],    // Center control
    [0,  0,  0, 20, 20,  0,  0,  0],
    [5, -5,-10,  0,  0,-10, -5,  5],
    [5, 10, 10,-20,-20, 10, 10,  5],    // 2nd rank (starting position)
    [0,  0,  0,  0,  0,  0,  0,  0]     // 1st rank
];

// Knight position table:
// - Encourages knights to control center
// - Penalizes edge positions
const KNIGHT_TABLE: [[Score; 8]; 8] = [
    [-50,-40,-30,-30,-30,-30,-40,-50],
    [-40,-20,  0,  0,  0,  0,-20,-40],
    [-30,  0, 10, 15, 15, 10,  0,-30],
    [-30,  5, 15, 20, 20, 15,  5,-30],
    [-30,  0, 15, 20, 20, 15,  0,-30],
    [-30,  5, 10, 15, 15, 10,  5,-30],
    [-40,-20,  0,  5,  5,  0,-20,-40],
    [-50,-40,-30,-30,-30,-30,-40,-50]
];

// Bishop position table: long diagonals and center, no edges
const BISHOP_TABLE: [[Score; 8]; 8] = [
    [-20,-10,-10,-10,-10,-10,-10,-20],
    [-10,  0,  0,  0,  0,  0,  0,-10],
    [-10,  0,  5, 10, 10,  5,  0,-10],
    [-10,  5,  5, 10, 10,  5,  5,-10],
    [-10,  0, 10, 10, 10, 10,  0,-10],
    [-10, 10, 10, 10, 10, 10, 10,-10],
    [-10,  5,  0,  0,  0,  0,  5,-10],
    [-20,-10,-10,-10,-10,-10,-10,-20]
];

// Rook position table: 7th rank bonus, slight central bonus at home
const ROOK_TABLE: [[Score; 8]; 8] = [
    [0,  0,  0,  0,  0,  0,  0,  0],
    [5, 10, 10, 10, 10, 10, 10,  5],
    [-5,  0,  0,  0,  0,  0,  0, -5],
    [-5,  0,  0,  0,  0,  0,  0, -5],
    [-5,  0,  0,  0,  0,  0,  0, -5],
    [-5,  0,  0,  0,  0,  0,  0, -5],
    [-5,  0,  0,  0,  0,  0,  0, -5],
    [0,  0,  0,  5,  5,  0,  0,  0]
];

const QUEEN_TABLE: [[Score; 8]; 8] = [
    [-20,-10,-10, -5, -5,-10,-10,-20],
    [-10,  0,  0,  0,  0,  0,  0,-10],
    [-10,  0,  5,  5,  5,  5,  0,-10],
    [-5,  0,  5,  5,  5,  5,  0, -5],
    [0,  0,  5,  5,  5,  5,  0, -5],
    [-10,  5,  5,  5,  5,  5,  0,-10],
    [-10,  0,  5,  0,  0,  0,  0,-10],
    [-20,-10,-10, -5, -5,-10,-10,-20]
];

// King middle game table:
// - Encourages king safety (castling)
// - Heavy penalties for central positions
const KING_MIDDLE_GAME_TABLE: [[Score; 8]; 8] = [
    [-30,-40,-40,-50,-50,-40,-40,-30],
    [-30,-40,-40,-50,-50,-40,-40,-30],
    [-30,-40,-40,-50,-50,-40,-40,-30],
    [-30,-40,-40,-50,-50,-40,-40,-30],
    [-20,-30,-30,-40,-40,-30,-30,-20],
    [-10,-20,-20,-20,-20,-20,-20,-10],
    [20, 20,  0,  0,  0,  0, 20, 20],   // Castled position bonus
    [20, 30, 10,  0,  0, 10, 30, 20]    // Starting rank, encourages castling
];

static DEFAULT_TABLES: Lazy<PieceSquareTables> = Lazy::new(PieceSquareTables::standard);

/// Material values and positional bonuses for every piece type and side,
/// indexed by `Square::index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSquareTables {
    material: [Score; 6],
    // [color][piece type][square]
    bonuses: [[[Score; 64]; 6]; 2],
}

impl PieceSquareTables {
    /// Builds tables from White-oriented rows (8th rank first); Black gets
    /// the rank-mirrored copy.
    pub fn new(material: [Score; 6], white_rows: [[[Score; 8]; 8]; 6]) -> Self {
        let mut bonuses = [[[0; 64]; 6]; 2];
        for piece_type in PieceType::ALL {
            let rows = &white_rows[piece_type.index()];
            for square in Square::all() {
                let row = 7 - square.rank as usize;
                let bonus = rows[row][square.file as usize];
                bonuses[color_index(Color::White)][piece_type.index()][square.index()] = bonus;
                bonuses[color_index(Color::Black)][piece_type.index()]
                    [square.mirror_rank().index()] = bonus;
            }
        }
        Self { material, bonuses }
    }

    pub fn standard() -> Self {
        Self::new(
            [
                PAWN_VALUE,
                KNIGHT_VALUE,
                BISHOP_VALUE,
                ROOK_VALUE,
                QUEEN_VALUE,
                KING_VALUE,
            ],
            [
                PAWN_TABLE,
                KNIGHT_TABLE,
                BISHOP_TABLE,
                ROOK_TABLE,
                QUEEN_TABLE,
                KING_MIDDLE_GAME_TABLE,
            ],
        )
    }

    pub fn material(&self, piece_type: PieceType) -> Score {
        self.material[piece_type.index()]
    }

    pub fn bonus(&self, piece_type: PieceType, color: Color, square: Square) -> Score {
        self.bonuses[color_index(color)][piece_type.index()][square.index()]
    }
}

impl Default for PieceSquareTables {
    fn default() -> Self {
        DEFAULT_TABLES.clone()
    }
}

fn color_index(color: Color) -> usize {
    match color {
        Color::White => 0,
        Color::Black => 1,
    }
}

/// Static scoring of a position without search.
pub trait Evaluator<S>: Send + Sync {
    /// Absolute score of `state`, positive favoring White.
    fn evaluate(&self, state: &S) -> Score;
}

/// Material plus piece-square evaluation.
#[derive(Debug, Clone, Default)]
pub struct PieceSquareEvaluator {
    tables: PieceSquareTables,
}

impl PieceSquareEvaluator {
    pub fn new(tables: PieceSquareTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PieceSquareTables {
        &self.tables
    }

    /// Material plus placement bonus of one piece, before the side sign.
    pub fn piece_value(&self, piece_type: PieceType, color: Color, square: Square) -> Score {
        self.tables.material(piece_type) + self.tables.bonus(piece_type, color, square)
    }
}

impl<S: PieceLookup> Evaluator<S> for PieceSquareEvaluator {
    fn evaluate(&self, state: &S) -> Score {
        Square::all()
            .filter_map(|square| state.piece_at(square).map(|piece| (square, piece)))
            .map(|(square, piece)| {
                piece.color.sign() * self.piece_value(piece.piece_type, piece.color, square)
            })
            .sum()
    }
}

/// Evaluates a chess position with the standard tables.
/// Positive scores favor White, negative scores favor Black.
pub fn evaluate_position(board: &Board) -> Score {
    PieceSquareEvaluator::default().evaluate(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(evaluate_position(&Board::new()), 0);
    }

    #[test]
    fn mirrored_position_negates_score() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "4k3/8/8/8/3Q4/8/8/4K3 w - - 0 1",
        ];
        for fen in fens {
            let board = Board::from_fen(fen).unwrap();
            let score = evaluate_position(&board);
            assert_eq!(evaluate_position(&board.mirrored()), -score, "{}", fen);
        }

        let lone_queen = Board::from_fen(fens[2]).unwrap();
        assert!(evaluate_position(&lone_queen) > 0);
        assert!(evaluate_position(&lone_queen.mirrored()) < 0);
    }

    #[test]
    fn black_reads_tables_mirrored() {
        let tables = PieceSquareTables::standard();
        // Knight on its home square vs. a central outpost
        assert_eq!(tables.bonus(PieceType::Knight, Color::White, square("b1")), -40);
        assert_eq!(tables.bonus(PieceType::Knight, Color::Black, square("b8")), -40);
        // Pawns near promotion get the 7th-rank bonus from their own side
        assert_eq!(tables.bonus(PieceType::Pawn, Color::White, square("e7")), 50);
        assert_eq!(tables.bonus(PieceType::Pawn, Color::Black, square("e2")), 50);
        // The queen table is not rank-symmetric, so orientation matters
        assert_eq!(tables.bonus(PieceType::Queen, Color::White, square("a4")), 0);
        assert_eq!(tables.bonus(PieceType::Queen, Color::Black, square("a5")), 0);
        assert_eq!(tables.bonus(PieceType::Queen, Color::Black, square("a4")), -5);
    }

    #[test]
    fn extra_material_dominates() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let evaluator = PieceSquareEvaluator::default();
        let queen = evaluator.piece_value(PieceType::Queen, Color::White, square("d1"));
        assert_eq!(queen, QUEEN_VALUE - 5);
        let kings = evaluator.piece_value(PieceType::King, Color::White, square("e1"))
            - evaluator.piece_value(PieceType::King, Color::Black, square("e8"));
        assert_eq!(evaluator.evaluate(&board), queen + kings);
        assert!(evaluate_position(&board) > 800);
    }

    #[test]
    fn custom_tables_are_used() {
        let flat = PieceSquareTables::new([1, 3, 3, 5, 9, 0], [[[0; 8]; 8]; 6]);
        let evaluator = PieceSquareEvaluator::new(flat);
        let board = Board::from_fen("4k3/pp6/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        assert_eq!(evaluator.evaluate(&board), 5 - 2);
    }
}
