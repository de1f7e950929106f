//! Tetratui — classic falling-block (tetromino) puzzle game in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::Parser;

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref()).unwrap_or_default();
    let mut app = App::new(args, theme)?;
    app.run()?;
    Ok(())
}

/// Classic tetromino puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tetratui",
    version,
    about = "Classic falling-block (tetromino) puzzle in the terminal. Stack pieces, clear full rows, chase the record.",
    long_about = "Tetratui is a terminal rendition of the classic falling-block puzzle.\n\n\
        Pieces drop one row at a time and speed up every 20 points; each fully \
        filled row is cleared for a point. Your personal best and the machine-wide \
        top score are kept in the config directory.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up         Rotate      Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit   R  Restart\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i     Rotate      j          Soft drop\n\n\
        Hold a movement key to keep the piece moving; hold Down for a fast drop. \
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Player label recorded with the top score when you beat it.
    #[arg(short, long, default_value = "You", value_name = "NAME")]
    pub player: String,

    /// Seed for the piece sequence (reproducible games).
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Disable the line-clear flash (instant clear).
    #[arg(long)]
    pub no_animation: bool,
}
