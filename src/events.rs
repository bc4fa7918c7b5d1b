use std::sync::Arc;

use crate::error::SourceError;
use crate::layout::Placement;
use crate::meta::SlideInfo;
use crate::orientation::Orientation;

/// A decoded, orientation-corrected image ready for display.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub orientation: Orientation,
    pub year: Option<i32>,
}

/// Completion posted by a fetch task back to the controller.
#[derive(Debug)]
pub struct Fetched {
    pub index: usize,
    pub id: String,
    /// `None` when the index left the window before the fetch got its turn.
    pub result: Option<Result<Arc<PreparedImage>, SourceError>>,
}

/// What the cache reports after applying a completion to a live entry.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    ImageReady {
        index: usize,
        image: Arc<PreparedImage>,
    },
    ImageFailed {
        index: usize,
        id: String,
        reason: SourceError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Top,
    BottomRight,
}

/// Abstract user input, independent of any windowing toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    ToggleFullscreen,
    Quit,
    TogglePlay,
    Previous,
    Next,
    SetInterval(u32),
    Resize { width: u32, height: u32 },
    MouseRegionEntered(Region),
    MouseRegionLeft(Region),
}

/// Output for whatever renders the slideshow.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    IndexChanged {
        index: usize,
        total: usize,
    },
    ShowImage {
        index: usize,
        image: Arc<PreparedImage>,
        placement: Placement,
        info: SlideInfo,
    },
    ShowPlaceholder {
        index: usize,
        id: String,
        reason: SourceError,
        info: SlideInfo,
    },
    PlaybackChanged {
        playing: bool,
    },
    FullscreenChanged(bool),
    IntervalChanged(u32),
    ToolbarVisible(bool),
    CaptionVisible(Option<SlideInfo>),
    Closed,
}
