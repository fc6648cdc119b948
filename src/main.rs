use std::error::Error;
use std::io::{self, BufRead, Write};
use std::process;
use std::time::Duration;

use chess_core::{piece::Color, Board, GameStatus, STARTING_FEN};
use chess_engine::ai::MAX_DEPTH;
use chess_engine::ChessAI;
use log::{error, warn};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "chess-minimax",
    about = "Play chess against a fixed-depth alpha-beta search, or watch it play itself."
)]
struct Opt {
    /// Plies searched for every engine move
    #[structopt(short, long, default_value = "3")]
    depth: u8,
    /// Starting position in FEN notation
    #[structopt(long, default_value = STARTING_FEN)]
    fen: String,
    /// Side played by the engine (white or black)
    #[structopt(short = "c", long, default_value = "black")]
    engine_color: Color,
    /// Let the engine play both sides
    #[structopt(long)]
    self_play: bool,
    /// Stop self-play after this many plies
    #[structopt(long, default_value = "200")]
    max_plies: usize,
    /// Wall-clock budget per engine move, in milliseconds
    #[structopt(long)]
    time_limit_ms: Option<u64>,
    /// Search root moves on all cores
    #[structopt(long)]
    parallel: bool,
}

enum Input {
    Move(String),
    Undo,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim() {
        "" => None,
        "quit" | "exit" => Some(Input::Quit),
        "undo" => Some(Input::Undo),
        notation => Some(Input::Move(notation.to_string())),
    }
}

fn status_line(board: &Board) -> String {
    let side = board.current_turn();
    match board.status() {
        GameStatus::Checkmate => format!("Game over, {} is in checkmate.", side),
        GameStatus::Draw => "Game over, drawn position".to_string(),
        GameStatus::Check => format!("{} to move, {} is in check", side, side),
        GameStatus::InProgress => format!("{} to move", side),
    }
}

// Coordinate moves numbered like a score sheet: "1. e2e4 e7e5 2. g1f3"
fn move_list(board: &Board, first_mover: Color) -> String {
    let mut text = String::new();
    let offset = if first_mover == Color::Black { 1 } else { 0 };
    for (ply, mv) in board.moves_played().enumerate() {
        let ply = ply + offset;
        if !text.is_empty() {
            text.push(' ');
        }
        if ply % 2 == 0 {
            text.push_str(&format!("{}. ", ply / 2 + 1));
        } else if ply == offset {
            text.push_str("1... ");
        }
        text.push_str(&mv.to_string());
    }
    text
}

fn print_position(board: &Board, first_mover: Color) {
    println!("{}", board);
    println!("{}", board.to_fen());
    if board.history_len() > 0 {
        println!("Moves: {}", move_list(board, first_mover));
    }
    println!("{}", status_line(board));
}

fn build_ai(opt: &Opt) -> ChessAI {
    let mut ai = ChessAI::new(opt.depth);
    if let Some(ms) = opt.time_limit_ms {
        ai.set_max_time(Duration::from_millis(ms));
    }
    ai.set_parallel(opt.parallel);
    ai
}

fn self_play(opt: &Opt, board: &mut Board, ai: &ChessAI) -> Result<(), Box<dyn Error>> {
    let first_mover = board.current_turn();
    for _ in 0..opt.max_plies {
        match ai.play_move(board)? {
            Some(mv) => println!("{} plays {}", board.current_turn().opposite(), mv),
            None => break,
        }
        print_position(board, first_mover);
    }
    Ok(())
}

fn play_against_engine(opt: &Opt, board: &mut Board, ai: &ChessAI) -> Result<(), Box<dyn Error>> {
    let first_mover = board.current_turn();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if board.is_game_over() {
            return Ok(());
        }

        if board.current_turn() == opt.engine_color {
            if let Some(mv) = ai.play_move(board)? {
                println!("engine plays {}", mv);
            }
            print_position(board, first_mover);
            continue;
        }

        print!("{} move (e.g. e2e4, undo, quit): ", board.current_turn());
        io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };

        match parse_input(&line) {
            None => continue,
            Some(Input::Quit) => return Ok(()),
            Some(Input::Undo) => {
                // Take back the engine reply together with our own move
                let plies = if board.history_len() >= 2 { 2 } else { 1 };
                for _ in 0..plies {
                    if let Err(err) = board.undo_move() {
                        println!("{}", err);
                        break;
                    }
                }
                print_position(board, first_mover);
            }
            Some(Input::Move(notation)) => {
                let result = board.find_move(&notation).and_then(|mv| board.make_move(mv));
                if result.is_err() {
                    println!("invalid move");
                    continue;
                }
                print_position(board, first_mover);
            }
        }
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    let mut board = Board::from_fen(&opt.fen)?;
    let ai = build_ai(&opt);
    print_position(&board, board.current_turn());

    if opt.self_play {
        self_play(&opt, &mut board, &ai)
    } else {
        play_against_engine(&opt, &mut board, &ai)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();
    if opt.depth == 0 || opt.depth > MAX_DEPTH {
        warn!("depth {} is outside 1..={}, clamping", opt.depth, MAX_DEPTH);
    }

    if let Err(err) = run(opt) {
        error!("{}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(board: &mut Board, notation: &str) {
        let mv = board.find_move(notation).unwrap();
        board.make_move(mv).unwrap();
    }

    #[test]
    fn move_list_numbers_full_moves() {
        let mut board = Board::new();
        for notation in ["e2e4", "e7e5", "g1f3"] {
            play(&mut board, notation);
        }
        assert_eq!(move_list(&board, Color::White), "1. e2e4 e7e5 2. g1f3");
    }

    #[test]
    fn move_list_from_a_black_start() {
        let mut board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        for notation in ["e8d7", "e1d2", "d7c6"] {
            play(&mut board, notation);
        }
        assert_eq!(move_list(&board, Color::Black), "1... e8d7 2. e1d2 d7c6");
    }

    #[test]
    fn status_text_names_the_side() {
        let mate = Board::from_fen("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 1 1").unwrap();
        assert_eq!(status_line(&mate), "Game over, Black is in checkmate.");
        assert_eq!(status_line(&Board::new()), "White to move");
    }
}
