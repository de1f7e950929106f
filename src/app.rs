//! App: terminal init, main loop, drop clock, key repeat, record updates.

use crate::Args;
use crate::game::{GameState, Status};
use crate::highscores::{self, Records};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before a held key starts repeating.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 50;
/// A held soft-drop repeats at the minimum drop interval.
const FAST_DROP_INTERVAL_MS: u64 = 100;
/// Target render frame time (~60 FPS).
const FRAME_MS: u64 = 16;

/// Fixed-timestep drop scheduling: a drop is due when the current interval
/// has elapsed since the last committed drop.
#[derive(Debug)]
struct DropClock {
    last: Instant,
}

impl DropClock {
    fn new(now: Instant) -> Self {
        Self { last: now }
    }

    fn due(&mut self, now: Instant, interval: Duration) -> bool {
        if now.duration_since(self.last) >= interval {
            self.last = now;
            true
        } else {
            false
        }
    }

    /// Re-arm without dropping; time spent paused is never caught up.
    fn reset(&mut self, now: Instant) {
        self.last = now;
    }
}

/// Held-key auto-repeat. One action at a time; pressing a new repeatable key
/// replaces the previous one, and `cancel` stops it outright (pause, hard
/// drop, game over). A cancelled repeat must never fire again.
#[derive(Debug, Default)]
struct KeyRepeat {
    held: Option<(Action, Instant)>,
    last_fire: Option<Instant>,
}

impl KeyRepeat {
    fn press(&mut self, action: Action, now: Instant) {
        if action.repeatable() {
            self.held = Some((action, now));
            self.last_fire = None;
        }
    }

    fn release(&mut self, action: Action) {
        if self.held.map(|(a, _)| a) == Some(action) {
            self.cancel();
        }
    }

    fn cancel(&mut self) {
        self.held = None;
        self.last_fire = None;
    }

    fn is_held(&self, action: Action) -> bool {
        self.held.map(|(a, _)| a) == Some(action)
    }

    fn poll(&mut self, now: Instant) -> Option<Action> {
        let (action, first) = self.held?;
        if now.duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return None;
        }
        let interval = if action == Action::SoftDrop {
            Duration::from_millis(FAST_DROP_INTERVAL_MS)
        } else {
            Duration::from_millis(REPEAT_INTERVAL_MS)
        };
        let next = self.last_fire.unwrap_or(first) + interval;
        if now >= next {
            self.last_fire = Some(now);
            Some(action)
        } else {
            None
        }
    }
}

pub struct App {
    args: Args,
    theme: Theme,
    state: GameState,
    records: Records,
    /// Whether the finished run improved a persisted record.
    new_record: bool,
    drop_clock: DropClock,
    repeat: KeyRepeat,
    /// Rows from the latest clear, pending the flash animation.
    flash_rows: Vec<usize>,
    flash_effect: Option<Effect>,
    flash_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Result<Self> {
        let state = match args.seed {
            Some(seed) => GameState::with_seed(seed),
            None => GameState::new(),
        };
        let records = highscores::load();
        Ok(Self {
            args,
            theme,
            state,
            records,
            new_record: false,
            drop_clock: DropClock::new(Instant::now()),
            repeat: KeyRepeat::default(),
            flash_rows: Vec::new(),
            flash_effect: None,
            flash_process_time: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Attempt to enable enhanced keyboard for Release events
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.state,
                    &self.theme,
                    &self.records,
                    self.new_record,
                    &self.flash_rows,
                    &mut self.flash_effect,
                    &mut self.flash_process_time,
                    now,
                    self.args.no_animation,
                )
            })?;

            if self.flash_effect.as_ref().is_some_and(|e| e.done()) {
                self.clear_flash();
            }

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if self.handle_key(key) {
                            return Ok(());
                        }
                    }
                }
            }

            if self.state.status() == Status::Playing {
                if let Some(action) = self.repeat.poll(Instant::now()) {
                    self.apply_action(action);
                }
                let now = Instant::now();
                if self.drop_clock.due(now, self.state.drop_interval()) {
                    let prev = self.state.status();
                    self.state.soft_drop();
                    self.post_update(prev);
                }
            } else {
                // Pause and game over stop any held-key repeat outright.
                self.repeat.cancel();
            }
        }
    }

    /// Returns true when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let action = key_to_action(key);
        if key.kind != KeyEventKind::Press {
            if key.kind == KeyEventKind::Release {
                self.repeat.release(action);
            }
            return false;
        }
        // Ignore OS auto-repeat for a key we are already repeating ourselves.
        if self.repeat.is_held(action) {
            return false;
        }
        match action {
            Action::Quit => return true,
            Action::StartPause => self.toggle_start_pause(),
            Action::Restart => self.restart(),
            Action::None => {}
            _ => match self.state.status() {
                Status::Ready | Status::GameOver => {
                    if action == Action::HardDrop {
                        self.toggle_start_pause();
                    }
                }
                Status::Playing => {
                    self.apply_action(action);
                    if action.repeatable() {
                        self.repeat.press(action, Instant::now());
                    }
                }
                Status::Paused => {}
            },
        }
        false
    }

    fn apply_action(&mut self, action: Action) {
        let prev = self.state.status();
        match action {
            Action::MoveLeft => self.state.move_left(),
            Action::MoveRight => self.state.move_right(),
            Action::Rotate => self.state.rotate(),
            Action::SoftDrop => self.state.soft_drop(),
            Action::HardDrop => {
                self.state.hard_drop();
                self.repeat.cancel();
            }
            _ => {}
        }
        self.post_update(prev);
    }

    fn toggle_start_pause(&mut self) {
        let prev = self.state.status();
        self.state.toggle_start_pause();
        self.repeat.cancel();
        if self.state.status() == Status::Playing {
            // Fresh timing reference: resuming must not trigger a catch-up drop.
            self.drop_clock.reset(Instant::now());
        }
        if prev == Status::GameOver {
            self.new_record = false;
            self.clear_flash();
        }
        self.post_update(prev);
    }

    fn restart(&mut self) {
        self.state.restart();
        self.repeat.cancel();
        self.new_record = false;
        self.clear_flash();
    }

    /// Pick up engine side effects after a command: pending line-clear rows
    /// for the flash, and the transition into game over.
    fn post_update(&mut self, prev: Status) {
        let rows = self.state.take_cleared_rows();
        if !rows.is_empty() && !self.args.no_animation {
            self.clear_flash();
            self.flash_rows = rows;
        }
        if prev != Status::GameOver && self.state.status() == Status::GameOver {
            self.on_game_over();
        }
    }

    fn clear_flash(&mut self) {
        self.flash_rows.clear();
        self.flash_effect = None;
        self.flash_process_time = None;
    }

    /// Compare the final score against both persisted records and write any
    /// improvement.
    fn on_game_over(&mut self) {
        let score = self.state.score();
        let mut improved = false;
        if score > self.records.best {
            self.records.best = score;
            improved = true;
        }
        if score > self.records.top_score {
            self.records.top_score = score;
            self.records.top_player = self.args.player.clone();
            improved = true;
        }
        self.new_record = improved;
        if improved {
            // Nowhere to report a failed write while the alternate screen is up.
            let _ = highscores::save(&self.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_clock_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut clock = DropClock::new(t0);
        let interval = Duration::from_millis(1000);
        assert!(!clock.due(t0 + Duration::from_millis(999), interval));
        assert!(clock.due(t0 + Duration::from_millis(1000), interval));
        assert!(!clock.due(t0 + Duration::from_millis(1500), interval));
        assert!(clock.due(t0 + Duration::from_millis(2000), interval));
    }

    #[test]
    fn drop_clock_reset_swallows_paused_time() {
        let t0 = Instant::now();
        let mut clock = DropClock::new(t0);
        let interval = Duration::from_millis(1000);
        // A minute passes while paused; resume re-arms instead of catching up.
        let resumed = t0 + Duration::from_secs(60);
        clock.reset(resumed);
        assert!(!clock.due(resumed + Duration::from_millis(1), interval));
        assert!(clock.due(resumed + Duration::from_millis(1000), interval));
    }

    #[test]
    fn key_repeat_waits_for_the_delay_then_fires_at_the_interval() {
        let t0 = Instant::now();
        let mut repeat = KeyRepeat::default();
        repeat.press(Action::MoveLeft, t0);
        assert_eq!(repeat.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(
            repeat.poll(t0 + Duration::from_millis(230)),
            Some(Action::MoveLeft)
        );
        assert_eq!(repeat.poll(t0 + Duration::from_millis(240)), None);
        assert_eq!(
            repeat.poll(t0 + Duration::from_millis(290)),
            Some(Action::MoveLeft)
        );
    }

    #[test]
    fn held_soft_drop_repeats_at_the_minimum_drop_interval() {
        let t0 = Instant::now();
        let mut repeat = KeyRepeat::default();
        repeat.press(Action::SoftDrop, t0);
        assert_eq!(
            repeat.poll(t0 + Duration::from_millis(200)),
            Some(Action::SoftDrop)
        );
        assert_eq!(repeat.poll(t0 + Duration::from_millis(250)), None);
        assert_eq!(
            repeat.poll(t0 + Duration::from_millis(300)),
            Some(Action::SoftDrop)
        );
    }

    #[test]
    fn cancelled_repeat_never_fires_again() {
        let t0 = Instant::now();
        let mut repeat = KeyRepeat::default();
        repeat.press(Action::SoftDrop, t0);
        repeat.cancel();
        assert_eq!(repeat.poll(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn releasing_the_held_key_stops_the_repeat() {
        let t0 = Instant::now();
        let mut repeat = KeyRepeat::default();
        repeat.press(Action::MoveRight, t0);
        repeat.release(Action::MoveLeft); // a different key; still held
        assert!(repeat.is_held(Action::MoveRight));
        repeat.release(Action::MoveRight);
        assert_eq!(repeat.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn non_repeatable_actions_are_not_held() {
        let t0 = Instant::now();
        let mut repeat = KeyRepeat::default();
        repeat.press(Action::HardDrop, t0);
        assert_eq!(repeat.poll(t0 + Duration::from_secs(1)), None);
    }
}
