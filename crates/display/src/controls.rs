//! Operator controls read from stdin.
//!
//! ```text
//! reset             clear the grid
//! resize <W>x<H>    recompute the grid for a new viewport
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::grid::Viewport;
use crate::scheduler::DisplayCommand;

pub fn parse_control(line: &str) -> Option<DisplayCommand> {
    let mut words = line.split_whitespace();
    match words.next()? {
        "reset" => Some(DisplayCommand::Reset),
        "resize" => {
            let (w, h) = words.next()?.split_once('x')?;
            Some(DisplayCommand::Resize(Viewport {
                width: w.parse().ok()?,
                height: h.parse().ok()?,
            }))
        }
        _ => None,
    }
}

/// Forward stdin controls to the scheduler until stdin or the scheduler
/// closes.
pub async fn read_controls(commands: mpsc::Sender<DisplayCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_control(&line) {
            Some(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => tracing::warn!(input = %line.trim(), "Unknown control"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reset() {
        assert_eq!(parse_control("reset"), Some(DisplayCommand::Reset));
    }

    #[test]
    fn parses_resize() {
        assert_eq!(
            parse_control("  resize 1280x720 "),
            Some(DisplayCommand::Resize(Viewport {
                width: 1280,
                height: 720
            }))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_control("resize 1280"), None);
        assert_eq!(parse_control("resize axb"), None);
        assert_eq!(parse_control("dance"), None);
        assert_eq!(parse_control(""), None);
    }
}
