//! Persist score records to disk (XDG config or ~/.config/tetratui).

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const FILENAME: &str = "records";

/// The three persisted records. Missing or unreadable values fall back to
/// these defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Records {
    /// This player's personal best score.
    pub best: u32,
    /// Highest score ever recorded on this machine.
    pub top_score: u32,
    /// Label of whoever holds the top score.
    pub top_player: String,
}

impl Default for Records {
    fn default() -> Self {
        Self {
            best: 0,
            top_score: 0,
            top_player: "-".to_string(),
        }
    }
}

/// Returns the path to the records file (config dir / tetratui / records).
fn config_path() -> Result<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    Ok(base.join("tetratui").join(FILENAME))
}

/// One value per line: best, top score, top player label.
fn parse_records(content: &str) -> Records {
    let mut records = Records::default();
    for (i, line) in content.lines().take(3).enumerate() {
        match i {
            0 => records.best = line.trim().parse().unwrap_or(0),
            1 => records.top_score = line.trim().parse().unwrap_or(0),
            2 => {
                let label = line.trim();
                if !label.is_empty() {
                    records.top_player = label.to_string();
                }
            }
            _ => {}
        }
    }
    records
}

fn format_records(records: &Records) -> String {
    format!(
        "{}\n{}\n{}\n",
        records.best, records.top_score, records.top_player
    )
}

/// Load records from disk. Defaults on missing file or parse error.
pub fn load() -> Records {
    let path = match config_path() {
        Ok(p) => p,
        Err(_) => return Records::default(),
    };
    match fs::read_to_string(path) {
        Ok(content) => parse_records(&content),
        Err(_) => Records::default(),
    }
}

/// Save records to disk. Creates the config directory if needed.
pub fn save(records: &Records) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    f.write_all(format_records(records).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_then_parse_round_trips() {
        let records = Records {
            best: 17,
            top_score: 42,
            top_player: "You".to_string(),
        };
        assert_eq!(parse_records(&format_records(&records)), records);
    }

    #[test]
    fn corrupt_or_missing_fields_default() {
        assert_eq!(parse_records(""), Records::default());
        assert_eq!(parse_records("not a number\n-3\n"), Records::default());
        let partial = parse_records("12\n");
        assert_eq!(partial.best, 12);
        assert_eq!(partial.top_score, 0);
        assert_eq!(partial.top_player, "-");
    }

    #[test]
    fn blank_player_label_keeps_the_placeholder() {
        let records = parse_records("1\n2\n   \n");
        assert_eq!(records.top_player, "-");
    }
}
