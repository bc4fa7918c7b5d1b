//! Headless front end: stdin lines in, logged view events out.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{InputEvent, Region, ViewEvent};

pub const HELP: &str = "commands: n|next, p|prev, space|play, f|fullscreen, i|interval N, \
r|resize W H, top [off], caption [off], q|quit";

/// Map one command line to an input event. Blank lines map to `None`.
pub fn parse_command(line: &str) -> Result<Option<InputEvent>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let event = match words.as_slice() {
        [] => return Ok(None),
        ["n" | "next"] => InputEvent::Next,
        ["p" | "prev" | "previous"] => InputEvent::Previous,
        ["space" | "play" | "pause"] => InputEvent::TogglePlay,
        ["f" | "fullscreen"] => InputEvent::ToggleFullscreen,
        ["q" | "quit" | "esc"] => InputEvent::Quit,
        ["i" | "interval", secs] => InputEvent::SetInterval(
            secs.parse()
                .map_err(|_| format!("interval must be a whole number of seconds, got '{secs}'"))?,
        ),
        ["r" | "resize", w, h] => {
            let dim = |raw: &str| {
                raw.parse::<u32>()
                    .map_err(|_| format!("window size must be whole pixels, got '{raw}'"))
            };
            InputEvent::Resize {
                width: dim(w)?,
                height: dim(h)?,
            }
        }
        ["top"] => InputEvent::MouseRegionEntered(Region::Top),
        ["top", "off"] => InputEvent::MouseRegionLeft(Region::Top),
        ["caption"] => InputEvent::MouseRegionEntered(Region::BottomRight),
        ["caption", "off"] => InputEvent::MouseRegionLeft(Region::BottomRight),
        _ => return Err(format!("unknown command '{}'", line.trim())),
    };
    Ok(Some(event))
}

/// Forward parsed commands to the controller. End of input counts as quit.
pub async fn read_commands<R>(
    reader: R,
    to_controller: Sender<InputEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let event = match line {
            Some(line) => match parse_command(&line) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(msg) => {
                    warn!("{msg}; {HELP}");
                    continue;
                }
            },
            None => {
                debug!("stdin closed");
                InputEvent::Quit
            }
        };
        let quit = event == InputEvent::Quit;
        if to_controller.send(event).await.is_err() || quit {
            break;
        }
    }
    Ok(())
}

/// Log view events until the controller reports it has closed.
pub async fn run(mut view_rx: Receiver<ViewEvent>) -> Result<()> {
    while let Some(event) = view_rx.recv().await {
        match event {
            ViewEvent::IndexChanged { index, total } => {
                debug!(slide = index + 1, total, "index changed");
            }
            ViewEvent::ShowImage {
                index,
                image,
                placement,
                info,
            } => info!(
                index,
                id = %image.id,
                size = %format!("{}x{}", image.width, image.height),
                at = %format!("{}x{}+{}+{}", placement.width, placement.height, placement.x, placement.y),
                heading = %info.heading(),
                "showing"
            ),
            ViewEvent::ShowPlaceholder {
                index,
                id,
                reason,
                info,
            } => {
                warn!(index, %id, heading = %info.heading(), error = %reason, "showing placeholder");
            }
            ViewEvent::PlaybackChanged { playing } => info!(playing, "playback"),
            ViewEvent::FullscreenChanged(fullscreen) => info!(fullscreen, "fullscreen"),
            ViewEvent::IntervalChanged(secs) => info!(interval = secs, "interval"),
            ViewEvent::ToolbarVisible(visible) => info!(visible, "toolbar"),
            ViewEvent::CaptionVisible(Some(info)) => {
                info!(file = %info.file_name, heading = %info.heading(), "caption");
            }
            ViewEvent::CaptionVisible(None) => info!("caption hidden"),
            ViewEvent::Closed => break,
        }
    }
    Ok(())
}
