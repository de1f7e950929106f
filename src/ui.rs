//! Layout and drawing: playfield, sidebar, next preview, overlays, line-clear flash.

use crate::game::{COLS, GameState, ROWS, Status, TetrominoKind};
use crate::highscores::Records;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is two terminal columns wide.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the line-clear flash in ms.
const CLEAR_FLASH_MS: u32 = 350;

/// Playfield size in terminal cells (grid + border).
fn playfield_pixel_size() -> (u16, u16) {
    (COLS as u16 * CELL_WIDTH + 2, ROWS as u16 + 2)
}

/// Draw the current screen. While rows from the latest clear are pending and
/// animation is on, applies the flash effect and updates `flash_effect` /
/// `flash_process_time`.
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    records: &Records,
    new_record: bool,
    flash_rows: &[usize],
    flash_effect: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
    no_animation: bool,
) {
    let area = frame.area();
    draw_game(frame, state, theme, records, area);
    match state.status() {
        Status::Ready => draw_ready_overlay(frame, theme, area),
        Status::Playing => {
            if !flash_rows.is_empty() && !no_animation {
                apply_clear_flash(frame, theme, area, flash_rows, flash_effect, flash_process_time, now);
            }
        }
        Status::Paused => draw_pause_overlay(frame, theme, area),
        Status::GameOver => draw_game_over(frame, state, theme, records, new_record, area),
    }
}

/// Board-only rect (no border) for the centred layout; matches draw_game.
fn board_rect_in(area: Rect) -> Rect {
    let (pw, ph) = playfield_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    let outer = Rect {
        x,
        y,
        width: pw.min(area.width),
        height: ph.min(area.height),
    };
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: (COLS as u16 * CELL_WIDTH).min(outer.width.saturating_sub(2)),
        height: (ROWS as u16).min(outer.height.saturating_sub(2)),
    }
}

/// Draw game: playfield + sidebar; use the full area and centre the board.
fn draw_game(frame: &mut Frame, state: &GameState, theme: &Theme, records: &Records, area: Rect) {
    let (pw, ph) = playfield_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);

    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);

    let active_area = vert_chunks[1];

    let (playfield_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_playfield(frame, state, theme, playfield_area);
    draw_sidebar(frame, state, theme, records, sidebar_area);
}

fn draw_playfield(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let title = format!(" tetratui  lv {} ", state.level());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let board_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: (COLS as u16 * CELL_WIDTH).min(inner.width),
        height: (ROWS as u16).min(inner.height),
    };

    let buf = frame.buffer_mut();

    for y in 0..ROWS {
        for x in 0..COLS {
            let rx = board_rect.x + x as u16 * CELL_WIDTH;
            let ry = board_rect.y + y as u16;
            if rx + CELL_WIDTH > board_rect.x + board_rect.width
                || ry >= board_rect.y + board_rect.height
            {
                continue;
            }
            if state.board().occupied(x, y) {
                let style = Style::default().fg(theme.block).bg(theme.bg);
                buf.set_string(rx, ry, "██", style);
            } else {
                buf.set_string(rx, ry, "  ", Style::default().bg(theme.bg));
            }
        }
    }

    // The falling piece on top of the stack; rows above the top edge are
    // simply not drawn.
    if let Some(piece) = state.piece() {
        let style = Style::default().fg(theme.piece).bg(theme.bg);
        for (r, row) in piece.matrix.iter().enumerate() {
            for (c, &filled) in row.iter().enumerate() {
                if !filled {
                    continue;
                }
                let x = piece.x + c as i32;
                let y = piece.y + r as i32;
                if y < 0 || y >= ROWS as i32 || x < 0 || x >= COLS as i32 {
                    continue;
                }
                let rx = board_rect.x + x as u16 * CELL_WIDTH;
                let ry = board_rect.y + y as u16;
                if ry < board_rect.y + board_rect.height {
                    buf.set_string(rx, ry, "██", style);
                }
            }
        }
    }
}

fn draw_sidebar(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    records: &Records,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Next (border + 2 preview rows)
            Constraint::Length(1), // gap
            Constraint::Length(5), // Stats (border + score, level, lines)
            Constraint::Length(1), // gap
            Constraint::Length(5), // Records (border + best, top, holder)
            Constraint::Length(1), // gap
            Constraint::Length(4), // key help
        ])
        .split(area);

    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled("Next", title_style));
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    draw_next_preview(frame, theme, state.next(), next_inner);

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled("Stats", title_style));
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Level: ", title_style),
            Span::styled(state.level().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Lines: ", title_style),
            Span::styled(state.lines().to_string(), fg_style),
        ]),
    ];
    Paragraph::new(stats_lines).render(stats_inner, frame.buffer_mut());

    let records_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled("Records", title_style));
    let records_inner = records_block.inner(chunks[4]);
    records_block.render(chunks[4], frame.buffer_mut());
    let records_lines = vec![
        Line::from(vec![
            Span::styled("Best: ", title_style),
            Span::styled(records.best.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Top:  ", title_style),
            Span::styled(records.top_score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("by ", title_style),
            Span::styled(records.top_player.clone(), fg_style),
        ]),
    ];
    Paragraph::new(records_lines).render(records_inner, frame.buffer_mut());

    let help_style = Style::default().fg(theme.inactive_fg);
    let help_lines = vec![
        Line::from(Span::styled("←/→ move    ↑ rotate", help_style)),
        Line::from(Span::styled("↓ soft drop ⏎ drop", help_style)),
        Line::from(Span::styled("p pause     r restart", help_style)),
        Line::from(Span::styled("q quit", help_style)),
    ];
    Paragraph::new(help_lines).render(chunks[6], frame.buffer_mut());
}

/// Next piece as a small block preview (actual shape, centred).
fn draw_next_preview(frame: &mut Frame, theme: &Theme, kind: TetrominoKind, area: Rect) {
    let matrix = kind.template();
    let bw = matrix[0].len() as u16;
    let bh = matrix.len() as u16;
    let off_x = area.width.saturating_sub(bw * CELL_WIDTH) / 2;
    let off_y = area.height.saturating_sub(bh) / 2;
    let style = Style::default().fg(theme.piece).bg(theme.bg);

    for (r, row) in matrix.iter().enumerate() {
        for (c, &filled) in row.iter().enumerate() {
            if !filled {
                continue;
            }
            let rx = area.x + off_x + c as u16 * CELL_WIDTH;
            let ry = area.y + off_y + r as u16;
            if rx + CELL_WIDTH <= area.x + area.width && ry < area.y + area.height {
                frame.buffer_mut().set_string(rx, ry, "██", style);
            }
        }
    }
}

/// Build the set of buffer (x, y) positions covered by the cleared rows.
fn flash_buffer_positions(board_rect: Rect, rows: &[usize]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &row in rows {
        let ry = board_rect.y + row as u16;
        if ry >= board_rect.y + board_rect.height {
            continue;
        }
        for x in 0..COLS as u16 * CELL_WIDTH {
            let rx = board_rect.x + x;
            if rx < board_rect.x + board_rect.width {
                set.insert((rx, ry));
            }
        }
    }
    set
}

/// Create or update the line-clear flash and process it (fade the cleared
/// rows back from a bright fill over ~a third of a second).
fn apply_clear_flash(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    rows: &[usize],
    flash_effect: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board_rect = board_rect_in(area);
    let delta = flash_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *flash_process_time = Some(now);

    if flash_effect.is_none() {
        let flash_set = flash_buffer_positions(board_rect, rows);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            flash_set.contains(&(pos.x, pos.y))
        }));
        let flash = theme.main_fg;
        let effect = fx::fade_from(flash, flash, (CLEAR_FLASH_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board_rect);
        *flash_effect = Some(effect);
    }

    if let Some(effect) = flash_effect {
        frame.render_effect(effect, board_rect, tfx_delta);
    }
}

fn centred_popup(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_ready_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centred_popup(area, 30, 6);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " tetratui ",
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " Enter — Start    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centred_popup(area, 30, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    records: &Records,
    new_record: bool,
    area: Rect,
) {
    let popup = centred_popup(area, 34, 11);
    // Clear the backdrop so the frozen board doesn't bleed through.
    for y in popup.y..popup.y + popup.height {
        for x in popup.x..popup.x + popup.width {
            frame.buffer_mut()[(x, y)]
                .set_symbol(" ")
                .set_style(Style::default().bg(theme.bg));
        }
    }

    let fg_style = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", state.score()), fg_style)),
        Line::from(Span::styled(format!(" Best:  {} ", records.best), fg_style)),
        Line::from(Span::styled(
            format!(" Top:   {} by {} ", records.top_score, records.top_player),
            fg_style,
        )),
    ];
    if new_record {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Enter — New Game    Q — Quit ",
        fg_style,
    )));

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}
