//! Rule engine: board, piece catalog, rotation, line clear, scoring, status.

use std::collections::VecDeque;
use std::time::Duration;

/// Board height in rows.
pub const ROWS: usize = 20;
/// Board width in columns.
pub const COLS: usize = 10;

/// Starting time between automatic drops.
const START_DROP_MS: u64 = 1000;
/// Fastest automatic drop; the interval never goes below this.
const MIN_DROP_MS: u64 = 100;
/// Speed-up per level.
const SPEED_STEP_MS: u64 = 100;
/// Points per level step.
const LEVEL_STEP: u32 = 20;

/// A piece shape: rectangular matrix of filled cells. Templates are
/// immutable; rotation builds a new matrix.
pub type Matrix = Vec<Vec<bool>>;

/// 90° clockwise rotation: an R×C matrix becomes C×R with
/// `out[i][j] = m[R-1-j][i]`. Applied to the current orientation each
/// time, so four turns always return the original matrix.
pub fn rotate_cw(m: &Matrix) -> Matrix {
    let rows = m.len();
    let cols = m.first().map_or(0, Vec::len);
    (0..cols)
        .map(|i| (0..rows).map(|j| m[rows - 1 - j][i]).collect())
        .collect()
}

/// Tetromino kinds (I, O, T, L, J, S, Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetrominoKind {
    I,
    O,
    T,
    L,
    J,
    S,
    Z,
}

impl TetrominoKind {
    pub const ALL: [Self; 7] = [
        Self::I,
        Self::O,
        Self::T,
        Self::L,
        Self::J,
        Self::S,
        Self::Z,
    ];

    /// Unrotated shape template.
    pub fn template(&self) -> Matrix {
        let rows: &[&[u8]] = match self {
            Self::I => &[&[1, 1, 1, 1]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::T => &[&[1, 1, 1], &[0, 1, 0]],
            Self::L => &[&[1, 1, 1], &[1, 0, 0]],
            Self::J => &[&[1, 1, 1], &[0, 0, 1]],
            Self::S => &[&[1, 1, 0], &[0, 1, 1]],
            Self::Z => &[&[0, 1, 1], &[1, 1, 0]],
        };
        rows.iter()
            .map(|row| row.iter().map(|&v| v != 0).collect())
            .collect()
    }
}

/// Uniform draw over the 7 kinds, one per spawn.
#[derive(Debug, Clone)]
pub struct PieceRng {
    state: u32,
}

impl PieceRng {
    /// Seed from wall-clock entropy.
    pub fn new() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        Self::with_seed(nanos ^ 0x9E37_79B9)
    }

    /// Fixed seed for reproducible piece sequences.
    pub fn with_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_rand(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state >> 16
    }

    pub fn draw(&mut self) -> TetrominoKind {
        TetrominoKind::ALL[(self.next_rand() as usize) % TetrominoKind::ALL.len()]
    }
}

impl Default for PieceRng {
    fn default() -> Self {
        Self::new()
    }
}

/// The falling piece: rotated matrix plus the grid position of its
/// bounding box's top-left cell. `y` may be negative while part of the
/// piece is above the visible board.
#[derive(Debug, Clone)]
pub struct Piece {
    pub kind: TetrominoKind,
    pub matrix: Matrix,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// New piece at the spawn position: horizontally centred, top row.
    pub fn spawn(kind: TetrominoKind) -> Self {
        let matrix = kind.template();
        let width = matrix[0].len() as i32;
        Self {
            kind,
            matrix,
            x: COLS as i32 / 2 - width / 2,
            y: 0,
        }
    }
}

/// Playfield: ROWS×COLS grid of occupied/empty cells. rows[0] is the top.
#[derive(Debug, Clone)]
pub struct Board {
    rows: VecDeque<Vec<bool>>,
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: (0..ROWS).map(|_| vec![false; COLS]).collect(),
        }
    }

    #[inline]
    pub fn occupied(&self, x: usize, y: usize) -> bool {
        self.rows[y][x]
    }

    /// Mark a cell occupied. Rows above the visible board (`y < 0`) are
    /// never written; other coordinates are validated by the caller.
    pub fn set(&mut self, y: i32, x: i32) {
        if y < 0 {
            return;
        }
        self.rows[y as usize][x as usize] = true;
    }

    pub fn is_row_full(&self, y: usize) -> bool {
        self.rows[y].iter().all(|&cell| cell)
    }

    /// Remove row `y` and insert a fresh empty row at the top, shifting
    /// everything above down by one. Size-preserving.
    pub fn clear_row(&mut self, y: usize) {
        self.rows.remove(y);
        self.rows.push_front(vec![false; COLS]);
    }

    /// The placement invariant. True when any filled cell of the piece is
    /// outside the side walls, below the floor, or on an occupied cell.
    /// Cells above the top edge (`y + r < 0`) are always considered free.
    pub fn collides(&self, piece: &Piece) -> bool {
        for (r, row) in piece.matrix.iter().enumerate() {
            for (c, &filled) in row.iter().enumerate() {
                if !filled {
                    continue;
                }
                let x = piece.x + c as i32;
                let y = piece.y + r as i32;
                if x < 0 || x >= COLS as i32 || y >= ROWS as i32 {
                    return true;
                }
                if y >= 0 && self.rows[y as usize][x as usize] {
                    return true;
                }
            }
        }
        false
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Game status. Commands that move the piece are accepted only while
/// `Playing`; everything else is a no-op in the wrong status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Playing,
    Paused,
    GameOver,
}

/// Game state: board, active piece, next piece, score, level, status.
#[derive(Debug)]
pub struct GameState {
    board: Board,
    piece: Option<Piece>,
    next: TetrominoKind,
    rng: PieceRng,
    status: Status,
    score: u32,
    level: u32,
    lines: u32,
    drop_interval: Duration,
    /// Rows cleared by the most recent lock, at their pre-clear positions;
    /// drained by the app for the line-clear flash.
    cleared_rows: Vec<usize>,
}

impl GameState {
    pub fn new() -> Self {
        Self::from_rng(PieceRng::new())
    }

    pub fn with_seed(seed: u32) -> Self {
        Self::from_rng(PieceRng::with_seed(seed))
    }

    fn from_rng(mut rng: PieceRng) -> Self {
        let next = rng.draw();
        Self {
            board: Board::new(),
            piece: None,
            next,
            rng,
            status: Status::Ready,
            score: 0,
            level: 1,
            lines: 0,
            drop_interval: Duration::from_millis(START_DROP_MS),
            cleared_rows: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn piece(&self) -> Option<&Piece> {
        self.piece.as_ref()
    }

    pub fn next(&self) -> TetrominoKind {
        self.next
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    /// Time between automatic drops at the current level.
    pub fn drop_interval(&self) -> Duration {
        self.drop_interval
    }

    /// Rows cleared since the last call, at their pre-clear positions.
    pub fn take_cleared_rows(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.cleared_rows)
    }

    /// Ready → Playing, Playing ⇄ Paused, GameOver → fresh game.
    pub fn toggle_start_pause(&mut self) {
        match self.status {
            Status::Ready => self.begin(),
            Status::Playing => self.status = Status::Paused,
            Status::Paused => self.status = Status::Playing,
            Status::GameOver => {
                self.reset();
                self.begin();
            }
        }
    }

    /// Unconditional reset to a fresh `Ready` state.
    pub fn restart(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.board = Board::new();
        self.piece = None;
        self.next = self.rng.draw();
        self.status = Status::Ready;
        self.score = 0;
        self.level = 1;
        self.lines = 0;
        self.drop_interval = Duration::from_millis(START_DROP_MS);
        self.cleared_rows.clear();
    }

    fn begin(&mut self) {
        self.status = Status::Playing;
        self.spawn();
    }

    pub fn move_left(&mut self) {
        if self.status != Status::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.x -= 1;
            if self.board.collides(piece) {
                piece.x += 1;
            }
        }
    }

    pub fn move_right(&mut self) {
        if self.status != Status::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.x += 1;
            if self.board.collides(piece) {
                piece.x -= 1;
            }
        }
    }

    /// Rotate clockwise; the rotated matrix is swapped in provisionally and
    /// restored unchanged when it doesn't fit. No wall kicks.
    pub fn rotate(&mut self) {
        if self.status != Status::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            let rotated = rotate_cw(&piece.matrix);
            let old = std::mem::replace(&mut piece.matrix, rotated);
            if self.board.collides(piece) {
                piece.matrix = old;
            }
        }
    }

    /// One downward step; a blocked step locks the piece instead.
    pub fn soft_drop(&mut self) {
        if self.status != Status::Playing {
            return;
        }
        let Some(piece) = self.piece.as_mut() else {
            return;
        };
        piece.y += 1;
        if self.board.collides(piece) {
            piece.y -= 1;
            self.lock();
        }
    }

    /// Drop to the lowest legal position and lock, in one synchronous step.
    pub fn hard_drop(&mut self) {
        if self.status != Status::Playing {
            return;
        }
        let Some(piece) = self.piece.as_mut() else {
            return;
        };
        loop {
            piece.y += 1;
            if self.board.collides(piece) {
                piece.y -= 1;
                break;
            }
        }
        self.lock();
    }

    /// Commit the piece's cells to the board, clear lines, spawn the next.
    fn lock(&mut self) {
        if let Some(piece) = self.piece.take() {
            for (r, row) in piece.matrix.iter().enumerate() {
                for (c, &filled) in row.iter().enumerate() {
                    if filled {
                        self.board.set(piece.y + r as i32, piece.x + c as i32);
                    }
                }
            }
        }
        self.clear_lines();
        self.spawn();
    }

    /// Promote the queued piece and draw a fresh one. A spawn that already
    /// violates the placement invariant is the top-out condition: the board
    /// freezes with nothing locked.
    fn spawn(&mut self) {
        let kind = self.next;
        self.next = self.rng.draw();
        let piece = Piece::spawn(kind);
        let blocked = self.board.collides(&piece);
        self.piece = Some(piece);
        if blocked {
            self.status = Status::GameOver;
        }
    }

    fn clear_lines(&mut self) {
        let mut cleared = Vec::new();
        let mut y = ROWS;
        while y > 0 {
            y -= 1;
            if self.board.is_row_full(y) {
                self.board.clear_row(y);
                // Record where the row sat before earlier removals shifted it.
                cleared.push(y - cleared.len());
                // Rows above have shifted down into this index; check it again.
                y += 1;
            }
        }
        if !cleared.is_empty() {
            self.apply_scoring(cleared.len() as u32);
            self.cleared_rows = cleared;
        }
    }

    /// One point per cleared row; level and drop interval are recomputed
    /// once per lock, after all rows are counted.
    fn apply_scoring(&mut self, cleared: u32) {
        self.score += cleared;
        self.lines += cleared;
        self.level = self.score / LEVEL_STEP + 1;
        let ms = START_DROP_MS
            .saturating_sub(u64::from(self.level - 1) * SPEED_STEP_MS)
            .max(MIN_DROP_MS);
        self.drop_interval = Duration::from_millis(ms);
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl GameState {
    fn force_next(&mut self, kind: TetrominoKind) {
        self.next = kind;
    }

    fn set_piece(&mut self, piece: Piece) {
        self.piece = Some(piece);
    }

    fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied_count(board: &Board) -> usize {
        (0..ROWS)
            .map(|y| (0..COLS).filter(|&x| board.occupied(x, y)).count())
            .sum()
    }

    fn fill_row(board: &mut Board, y: usize) {
        for x in 0..COLS {
            board.set(y as i32, x as i32);
        }
    }

    /// Playing state with a known active piece.
    fn playing(kind: TetrominoKind) -> GameState {
        let mut state = GameState::with_seed(7);
        state.force_next(kind);
        state.toggle_start_pause();
        state
    }

    #[test]
    fn four_rotations_return_the_original_matrix() {
        for kind in TetrominoKind::ALL {
            let template = kind.template();
            let mut m = template.clone();
            for _ in 0..4 {
                m = rotate_cw(&m);
            }
            assert_eq!(m, template, "{kind:?}");
        }
    }

    #[test]
    fn rotation_swaps_the_bounding_box() {
        let i = TetrominoKind::I.template();
        assert_eq!((i.len(), i[0].len()), (1, 4));
        let rotated = rotate_cw(&i);
        assert_eq!((rotated.len(), rotated[0].len()), (4, 1));
        assert!(rotated.iter().all(|row| row[0]));
    }

    #[test]
    fn clear_row_is_size_preserving_and_empties_the_top() {
        let mut board = Board::new();
        fill_row(&mut board, ROWS - 1);
        board.set(ROWS as i32 - 2, 3);
        board.clear_row(ROWS - 1);
        assert!((0..COLS).all(|x| !board.occupied(x, 0)));
        // The partially filled row above moved down into the cleared slot.
        assert!(board.occupied(3, ROWS - 1));
        assert_eq!(occupied_count(&board), 1);
    }

    #[test]
    fn set_ignores_rows_above_the_board() {
        let mut board = Board::new();
        board.set(-1, 4);
        assert_eq!(occupied_count(&board), 0);
    }

    #[test]
    fn collision_covers_walls_floor_and_occupied_cells() {
        let mut board = Board::new();
        let mut piece = Piece::spawn(TetrominoKind::O);
        assert!(!board.collides(&piece));

        piece.x = -1;
        assert!(board.collides(&piece));
        piece.x = COLS as i32 - 1; // two-wide piece, one column past the right edge
        assert!(board.collides(&piece));
        piece.x = 4;
        piece.y = ROWS as i32 - 1;
        assert!(board.collides(&piece));

        piece.y = ROWS as i32 - 2;
        assert!(!board.collides(&piece));
        board.set(ROWS as i32 - 1, 4);
        assert!(board.collides(&piece));
    }

    #[test]
    fn cells_above_the_top_edge_are_free() {
        let board = Board::new();
        let mut piece = Piece::spawn(TetrominoKind::O);
        piece.y = -1;
        assert!(!board.collides(&piece));
    }

    #[test]
    fn o_piece_spawns_centred() {
        let state = playing(TetrominoKind::O);
        assert_eq!(state.status(), Status::Playing);
        let piece = state.piece().unwrap();
        assert_eq!(piece.kind, TetrominoKind::O);
        assert_eq!((piece.x, piece.y), (4, 0));
    }

    #[test]
    fn spawn_promotes_the_queued_piece() {
        let mut state = playing(TetrominoKind::T);
        assert_eq!(state.piece().unwrap().kind, TetrominoKind::T);
        let queued = state.next();
        state.hard_drop();
        assert_eq!(state.piece().unwrap().kind, queued);
    }

    #[test]
    fn blocked_spawn_is_game_over_without_locking() {
        let mut state = GameState::with_seed(7);
        state.force_next(TetrominoKind::O);
        for y in 0..2 {
            for x in 0..COLS {
                state.board_mut().set(y, x as i32);
            }
        }
        let before = occupied_count(state.board());
        state.toggle_start_pause();
        assert_eq!(state.status(), Status::GameOver);
        assert_eq!(occupied_count(state.board()), before);
    }

    #[test]
    fn soft_drop_locks_at_the_floor() {
        let mut state = playing(TetrominoKind::O);
        for _ in 0..ROWS {
            state.soft_drop();
        }
        assert!(state.board().occupied(4, ROWS - 1));
        assert!(state.board().occupied(5, ROWS - 1));
        assert!(state.board().occupied(4, ROWS - 2));
        assert!(state.board().occupied(5, ROWS - 2));
        assert_eq!(occupied_count(state.board()), 4);
        assert_eq!(state.status(), Status::Playing);
    }

    #[test]
    fn hard_drop_into_the_last_gap_clears_the_bottom_row() {
        let mut state = playing(TetrominoKind::O);
        for x in 0..COLS - 1 {
            state.board_mut().set(ROWS as i32 - 1, x as i32);
        }
        // One-cell-wide column segment above the open rightmost column.
        state.set_piece(Piece {
            kind: TetrominoKind::I,
            matrix: rotate_cw(&TetrominoKind::I.template()),
            x: COLS as i32 - 1,
            y: 0,
        });
        state.hard_drop();

        assert_eq!(state.score(), 1);
        assert_eq!(state.lines(), 1);
        assert_eq!(state.take_cleared_rows(), vec![ROWS - 1]);
        // Three of the four segment cells survive, shifted down one row.
        assert!(state.board().occupied(COLS - 1, ROWS - 1));
        assert!(state.board().occupied(COLS - 1, ROWS - 2));
        assert!(state.board().occupied(COLS - 1, ROWS - 3));
        assert!(!state.board().is_row_full(ROWS - 1));
        assert!((0..COLS).all(|x| !state.board().occupied(x, 0)));
    }

    #[test]
    fn multi_row_clear_scores_one_point_per_row() {
        let mut state = playing(TetrominoKind::O);
        for y in [ROWS - 1, ROWS - 2] {
            for x in 0..COLS - 1 {
                state.board_mut().set(y as i32, x as i32);
            }
        }
        state.set_piece(Piece {
            kind: TetrominoKind::I,
            matrix: rotate_cw(&TetrominoKind::I.template()),
            x: COLS as i32 - 1,
            y: 0,
        });
        state.hard_drop();

        assert_eq!(state.score(), 2);
        assert_eq!(state.take_cleared_rows(), vec![ROWS - 1, ROWS - 2]);
        // The two leftover segment cells end up in the bottom two rows.
        assert!(state.board().occupied(COLS - 1, ROWS - 1));
        assert!(state.board().occupied(COLS - 1, ROWS - 2));
        assert_eq!(occupied_count(state.board()), 2);
    }

    #[test]
    fn level_and_drop_interval_follow_the_score() {
        let mut state = GameState::with_seed(7);
        state.apply_scoring(19);
        assert_eq!(state.score(), 19);
        assert_eq!(state.level(), 1);
        assert_eq!(state.drop_interval(), Duration::from_millis(1000));

        state.apply_scoring(1);
        assert_eq!(state.score(), 20);
        assert_eq!(state.level(), 2);
        assert_eq!(state.drop_interval(), Duration::from_millis(900));
    }

    #[test]
    fn drop_interval_is_clamped_at_the_floor() {
        let mut state = GameState::with_seed(7);
        state.apply_scoring(200);
        assert_eq!(state.level(), 11);
        assert_eq!(state.drop_interval(), Duration::from_millis(100));

        state.apply_scoring(200);
        assert_eq!(state.level(), 21);
        assert_eq!(state.drop_interval(), Duration::from_millis(100));
    }

    #[test]
    fn blocked_rotation_leaves_the_matrix_unchanged() {
        let mut state = playing(TetrominoKind::O);
        // Vertical I against the left wall, with the neighbouring column
        // occupied where the horizontal orientation would land.
        state.set_piece(Piece {
            kind: TetrominoKind::I,
            matrix: rotate_cw(&TetrominoKind::I.template()),
            x: 0,
            y: ROWS as i32 - 4,
        });
        state.board_mut().set(ROWS as i32 - 4, 1);
        let before = state.piece().unwrap().matrix.clone();
        state.rotate();
        assert_eq!(state.piece().unwrap().matrix, before);
    }

    #[test]
    fn rotation_applies_when_it_fits() {
        let mut state = playing(TetrominoKind::I);
        let before = state.piece().unwrap().matrix.clone();
        state.rotate();
        let after = &state.piece().unwrap().matrix;
        assert_eq!(*after, rotate_cw(&before));
    }

    #[test]
    fn commands_are_ignored_outside_playing() {
        let mut state = GameState::with_seed(7);
        state.move_left();
        state.rotate();
        state.soft_drop();
        state.hard_drop();
        assert_eq!(state.status(), Status::Ready);
        assert!(state.piece().is_none());

        state.force_next(TetrominoKind::O);
        state.toggle_start_pause();
        state.toggle_start_pause();
        assert_eq!(state.status(), Status::Paused);
        let (x, y) = {
            let piece = state.piece().unwrap();
            (piece.x, piece.y)
        };
        state.move_left();
        state.soft_drop();
        let piece = state.piece().unwrap();
        assert_eq!((piece.x, piece.y), (x, y));
    }

    #[test]
    fn toggle_resumes_and_restart_resets() {
        let mut state = playing(TetrominoKind::O);
        state.toggle_start_pause();
        assert_eq!(state.status(), Status::Paused);
        state.toggle_start_pause();
        assert_eq!(state.status(), Status::Playing);

        state.restart();
        assert_eq!(state.status(), Status::Ready);
        assert!(state.piece().is_none());
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn toggle_after_game_over_starts_a_fresh_game() {
        let mut state = GameState::with_seed(7);
        state.force_next(TetrominoKind::O);
        for x in 0..COLS {
            state.board_mut().set(0, x as i32);
        }
        state.toggle_start_pause();
        assert_eq!(state.status(), Status::GameOver);

        state.toggle_start_pause();
        assert_eq!(state.status(), Status::Playing);
        assert_eq!(state.score(), 0);
        assert_eq!(occupied_count(state.board()), 0);
        assert!(state.piece().is_some());
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut a = PieceRng::with_seed(42);
        let mut b = PieceRng::with_seed(42);
        let seq_a: Vec<_> = (0..32).map(|_| a.draw()).collect();
        let seq_b: Vec<_> = (0..32).map(|_| b.draw()).collect();
        assert_eq!(seq_a, seq_b);
    }
}
