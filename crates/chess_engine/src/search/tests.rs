//! Game-agnostic tests for the searcher, run on explicit game trees.
//!
//! Coverage:
//! - Pruned search against an independent exhaustive minimax on random trees
//! - Tie-break order, depth 0, root perspective
//! - State restoration on success, budget stops and state errors
//! - Node/time budgets and the stop flag
//! - Parallel vs sequential consistency

use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

#[derive(Clone, Debug)]
struct TreeNode {
    value: Score,
    children: Vec<usize>,
}

/// A game given as an explicit tree. Node 0 is the root; a move is the id of
/// the child node it leads to.
#[derive(Clone, Debug)]
struct TreeGame {
    nodes: Vec<TreeNode>,
    path: Vec<usize>,
    root_side: Color,
    // Moves into this node fail, to exercise error propagation
    poisoned: Option<usize>,
}

#[derive(Error, Debug)]
enum TreeError {
    #[error("node {0} is not reachable from the current node")]
    NotAChild(usize),
    #[error("node {0} is poisoned")]
    Poisoned(usize),
    #[error("already at the root")]
    AtRoot,
}

impl TreeGame {
    fn new(root_side: Color) -> Self {
        Self {
            nodes: vec![TreeNode {
                value: 0,
                children: Vec::new(),
            }],
            path: vec![0],
            root_side,
            poisoned: None,
        }
    }

    fn add_child(&mut self, parent: usize, value: Score) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            value,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Root with one leaf child per value.
    fn with_leaves(values: &[Score]) -> Self {
        let mut game = Self::new(Color::White);
        for &value in values {
            game.add_child(0, value);
        }
        game
    }

    fn random(seed: u64, depth: u8, root_side: Color) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut game = Self::new(root_side);
        game.nodes[0].value = rng.gen_range(-1000..=1000);
        game.grow(&mut rng, 0, depth);
        game
    }

    fn grow(&mut self, rng: &mut StdRng, parent: usize, depth: u8) {
        if depth == 0 {
            return;
        }
        // Occasionally no moves at all, to cover interior dead ends
        let branching = if rng.gen_bool(0.05) { 0 } else { rng.gen_range(1..=4) };
        for _ in 0..branching {
            let value = rng.gen_range(-1000..=1000);
            let child = self.add_child(parent, value);
            self.grow(rng, child, depth - 1);
        }
    }

    fn current(&self) -> usize {
        *self.path.last().unwrap()
    }
}

impl GameState for TreeGame {
    type Move = usize;
    type Error = TreeError;

    fn side_to_move(&self) -> Color {
        if self.path.len() % 2 == 1 {
            self.root_side
        } else {
            self.root_side.opposite()
        }
    }

    fn legal_moves(&self) -> Vec<usize> {
        self.nodes[self.current()].children.clone()
    }

    fn apply_move(&mut self, mv: &usize) -> Result<(), TreeError> {
        if self.poisoned == Some(*mv) {
            return Err(TreeError::Poisoned(*mv));
        }
        if !self.nodes[self.current()].children.contains(mv) {
            return Err(TreeError::NotAChild(*mv));
        }
        self.path.push(*mv);
        Ok(())
    }

    fn undo_last_move(&mut self) -> Result<(), TreeError> {
        if self.path.len() == 1 {
            return Err(TreeError::AtRoot);
        }
        self.path.pop();
        Ok(())
    }

    fn is_checkmate(&self) -> bool {
        self.nodes[self.current()].children.is_empty()
    }

    fn is_draw(&self) -> bool {
        false
    }

    fn is_in_check(&self) -> bool {
        false
    }
}

/// Node values are White-relative scores.
#[derive(Clone, Default)]
struct NodeValue;

impl Evaluator<TreeGame> for NodeValue {
    fn evaluate(&self, state: &TreeGame) -> Score {
        state.nodes[state.current()].value
    }
}

fn searcher(config: SearchConfig) -> Searcher<NodeValue> {
    Searcher::new(NodeValue, config)
}

// Straightforward minimax, written independently of the searcher
fn reference_value(game: &TreeGame, node: usize, depth: u8, maximizing: bool) -> Score {
    if depth == 0 {
        return game.root_side.sign() * game.nodes[node].value;
    }
    let values = game.nodes[node]
        .children
        .iter()
        .map(|&child| reference_value(game, child, depth - 1, !maximizing));
    if maximizing {
        values.fold(-INFINITY, Score::max)
    } else {
        values.fold(INFINITY, Score::min)
    }
}

fn reference_choice(game: &TreeGame, depth: u8) -> (usize, Score) {
    let mut best: Option<(usize, Score)> = None;
    for &child in &game.nodes[0].children {
        let score = reference_value(game, child, depth.saturating_sub(1), false);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((child, score));
        }
    }
    best.unwrap()
}

#[test]
fn pruned_search_matches_exhaustive_minimax() {
    let pruned = searcher(SearchConfig::default());
    let exhaustive = searcher(SearchConfig::default().with_pruning(false));

    for seed in 0..60 {
        for depth in 1..=4 {
            for root_side in [Color::White, Color::Black] {
                let mut game = TreeGame::random(seed, depth, root_side);
                if game.legal_moves().is_empty() {
                    continue;
                }
                let (expected_move, expected_score) = reference_choice(&game, depth);

                let fast = pruned.choose_move_to_depth(&mut game, depth).unwrap();
                let slow = exhaustive.choose_move_to_depth(&mut game, depth).unwrap();

                assert_eq!(fast.best_move, expected_move, "seed {} depth {}", seed, depth);
                assert_eq!(fast.score, Some(expected_score), "seed {} depth {}", seed, depth);
                assert_eq!(slow.best_move, expected_move);
                assert_eq!(slow.score, Some(expected_score));
                assert!(fast.stats.nodes <= slow.stats.nodes);
                assert_eq!(slow.stats.cutoffs, 0);
                assert_eq!(game.path, vec![0]);
            }
        }
    }
}

#[test]
fn cutoff_skips_refuted_siblings() {
    // Root move A guarantees 5. Under B the first reply already gives 1, so
    // B's remaining replies need not be looked at.
    let mut game = TreeGame::new(Color::White);
    let a = game.add_child(0, 0);
    game.add_child(a, 5);
    game.add_child(a, 8);
    let b = game.add_child(0, 0);
    game.add_child(b, 1);
    game.add_child(b, 100);
    game.add_child(b, 200);

    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut game, 2)
        .unwrap();
    assert_eq!(outcome.best_move, a);
    assert_eq!(outcome.score, Some(5));
    assert_eq!(outcome.stats.cutoffs, 1);
    // a, its two replies, b and its first reply
    assert_eq!(outcome.stats.nodes, 5);

    let exhaustive = searcher(SearchConfig::default().with_pruning(false))
        .choose_move_to_depth(&mut game, 2)
        .unwrap();
    assert_eq!(exhaustive.stats.nodes, 7);
}

#[test]
fn ties_keep_the_earliest_move() {
    let mut game = TreeGame::with_leaves(&[5, 7, 7, 3]);
    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut game, 1)
        .unwrap();
    assert_eq!(outcome.best_move, 2);
    assert_eq!(outcome.score, Some(7));

    let mut flat = TreeGame::with_leaves(&[4, 4, 4]);
    let outcome = searcher(SearchConfig::default()).choose_move(&mut flat).unwrap();
    assert_eq!(outcome.best_move, 1);
}

#[test]
fn black_root_prefers_negative_scores() {
    let mut game = TreeGame::with_leaves(&[10, -20, 15]);
    game.root_side = Color::Black;
    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut game, 1)
        .unwrap();
    assert_eq!(outcome.best_move, 2);
    assert_eq!(outcome.score, Some(20));
}

#[test]
fn depth_zero_scores_root_moves_statically() {
    let mut single = TreeGame::with_leaves(&[-50]);
    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut single, 0)
        .unwrap();
    assert_eq!(outcome.best_move, 1);
    assert_eq!(outcome.score, Some(-50));
    assert_eq!(outcome.depth, 0);

    let mut game = TreeGame::with_leaves(&[1, 9, 3]);
    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut game, 0)
        .unwrap();
    assert_eq!(outcome.best_move, 2);
}

#[test]
fn no_legal_moves_is_an_error() {
    let mut game = TreeGame::new(Color::White);
    let result = searcher(SearchConfig::default()).choose_move(&mut game);
    assert!(matches!(result, Err(SearchError::NoLegalMoves)));
    let result = searcher(SearchConfig::default()).choose_move_parallel(&game);
    assert!(matches!(result, Err(SearchError::NoLegalMoves)));
}

#[test]
fn dead_end_counts_as_lost_for_the_side_to_move() {
    // After move 1 the opponent cannot move; after move 2 play continues.
    let mut game = TreeGame::new(Color::White);
    game.add_child(0, 0);
    let quiet = game.add_child(0, 0);
    game.add_child(quiet, 900);

    let outcome = searcher(SearchConfig::default())
        .choose_move_to_depth(&mut game, 2)
        .unwrap();
    assert_eq!(outcome.best_move, 1);
    assert_eq!(outcome.score, Some(INFINITY));
}

#[test]
fn terminal_detection_scores_mates_by_distance() {
    let mut game = TreeGame::new(Color::White);
    let dead_end = game.add_child(0, -300);
    let quiet = game.add_child(0, 0);
    game.add_child(quiet, 900);

    let config = SearchConfig::default().with_terminal_detection(true);
    let outcome = searcher(config).choose_move_to_depth(&mut game, 1).unwrap();
    assert_eq!(outcome.best_move, dead_end);
    assert_eq!(outcome.score, Some(MATE_SCORE - 1));
}

#[test]
fn state_error_aborts_and_restores() {
    let mut game = TreeGame::new(Color::White);
    let a = game.add_child(0, 0);
    game.add_child(a, 3);
    let b = game.add_child(0, 0);
    let deep = game.add_child(b, 0);
    let poisoned = game.add_child(deep, 7);
    game.poisoned = Some(poisoned);

    let result = searcher(SearchConfig::default()).choose_move_to_depth(&mut game, 3);
    match result {
        Err(SearchError::State(error)) => assert!(error.to_string().contains("poisoned")),
        other => panic!("expected a state error, got {:?}", other.map(|o| o.best_move)),
    }
    assert_eq!(game.path, vec![0]);
}

#[test]
fn node_budget_keeps_finished_root_moves() {
    let mut game = TreeGame::new(Color::White);
    let a = game.add_child(0, 0);
    game.add_child(a, 5);
    game.add_child(a, 8);
    let b = game.add_child(0, 0);
    game.add_child(b, 50);
    game.add_child(b, 60);

    let config = SearchConfig::default().with_max_nodes(3);
    let searcher = searcher(config);
    let outcome = searcher.choose_move_to_depth(&mut game, 2).unwrap();
    assert!(!outcome.completed);
    assert_eq!(outcome.best_move, a);
    assert_eq!(outcome.score, Some(5));
    assert_eq!(game.path, vec![0]);

    // The flag raised by the budget is cleared by the next search
    assert!(searcher.stop_handle().load(Ordering::SeqCst));
    let mut unlimited = searcher;
    unlimited.set_config(SearchConfig::default());
    let outcome = unlimited.choose_move_to_depth(&mut game, 2).unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.best_move, b);
    assert_eq!(outcome.score, Some(50));
}

#[test]
fn zero_time_limit_falls_back_to_first_move() {
    let mut game = TreeGame::with_leaves(&[1, 2, 3]);
    let first = game.legal_moves()[0];
    let config = SearchConfig::default().with_time_limit(Duration::ZERO);
    let outcome = searcher(config).choose_move_to_depth(&mut game, 4).unwrap();
    assert!(!outcome.completed);
    assert_eq!(outcome.best_move, first);
    assert_eq!(outcome.score, None);
    assert_eq!(game.path, vec![0]);
}

#[test]
fn parallel_search_matches_sequential() {
    let searcher = searcher(SearchConfig::default());
    for seed in 100..130 {
        let mut game = TreeGame::random(seed, 4, Color::Black);
        if game.legal_moves().is_empty() {
            continue;
        }
        let sequential = searcher.choose_move_to_depth(&mut game, 4).unwrap();
        let parallel = searcher.choose_move_parallel_to_depth(&game, 4).unwrap();
        assert_eq!(parallel.best_move, sequential.best_move, "seed {}", seed);
        assert_eq!(parallel.score, sequential.score, "seed {}", seed);
        assert!(parallel.completed);
    }
}

#[test]
fn score_subtree_from_the_root() {
    for seed in 0..20 {
        let mut game = TreeGame::random(seed, 3, Color::White);
        let expected = reference_value(&game, 0, 3, true);
        let score = searcher(SearchConfig::default())
            .score_subtree(&mut game, 3, -INFINITY, INFINITY, true, Color::White)
            .unwrap();
        assert_eq!(score, expected, "seed {}", seed);
        assert_eq!(game.path, vec![0]);
    }
}

#[test]
fn each_searcher_owns_its_stop_flag() {
    let first = searcher(SearchConfig::default());
    let second = searcher(SearchConfig::default());
    first.stop_handle().store(true, Ordering::SeqCst);
    assert!(!second.stop_handle().load(Ordering::SeqCst));

    let mut game = TreeGame::with_leaves(&[3, 9, 4]);
    let outcome = second.choose_move_to_depth(&mut game, 1).unwrap();
    assert!(outcome.completed);

    // A flag raised before the search starts is cleared by it
    let outcome = first.choose_move_to_depth(&mut game, 1).unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.best_move, 2);
    assert!(!first.stop_handle().load(Ordering::SeqCst));
}
