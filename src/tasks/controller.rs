use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bad_images::BadImageLog;
use crate::config::Configuration;
use crate::events::{CacheEvent, Fetched, InputEvent, Region, ViewEvent};
use crate::layout::Placement;
use crate::meta::SlideInfo;
use crate::settings::{Settings, SettingsStore, clamp_interval};
use crate::source::ImageSource;
use crate::tasks::preload::{EntryState, PreloadCache};

/// Mutable playback state. Only the controller writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub interval_seconds: u32,
    pub is_fullscreen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Drives the slideshow: timer, navigation, cache window, and view output.
///
/// Rules:
/// - `current_index` stays inside the list; every move wraps at both ends.
/// - Ticks advance only while playing. Any manual move or interval change
///   restarts the countdown so the next automatic advance is a full interval away.
/// - Per-image failures become placeholders and never stop playback.
/// - Settings are written on every confirmed change; window size is written
///   once resizing has been quiet for the debounce period.
pub struct NavigationController<S> {
    cache: PreloadCache<S>,
    state: PlaybackState,
    settings: SettingsStore,
    bad_images: BadImageLog,
    view: Sender<ViewEvent>,
    preload_ahead: usize,
    preload_back: usize,
    resize_debounce: Duration,
    display: (u32, u32),
    window_size: (u32, u32),
    next_tick: Option<Instant>,
    resize_deadline: Option<Instant>,
    caption_visible: bool,
}

impl<S: ImageSource> NavigationController<S> {
    pub fn new(
        cache: PreloadCache<S>,
        settings: SettingsStore,
        bad_images: BadImageLog,
        cfg: &Configuration,
        view: Sender<ViewEvent>,
    ) -> Self {
        let saved = settings.settings();
        let state = PlaybackState {
            current_index: 0,
            is_playing: !cache.list().is_empty(),
            interval_seconds: clamp_interval(saved.interval_seconds),
            is_fullscreen: saved.is_fullscreen,
        };
        Self {
            cache,
            state,
            settings,
            bad_images,
            view,
            preload_ahead: cfg.preload_ahead,
            preload_back: cfg.preload_back,
            resize_debounce: cfg.resize_debounce,
            display: (saved.window_width, saved.window_height),
            window_size: (saved.window_width, saved.window_height),
            next_tick: None,
            resize_deadline: None,
            caption_visible: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cache(&self) -> &PreloadCache<S> {
        &self.cache
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display
    }

    /// Announce the initial state and start warming the first window.
    pub async fn start(&mut self) {
        let total = self.cache.list().len();
        self.emit(ViewEvent::FullscreenChanged(self.state.is_fullscreen))
            .await;
        self.emit(ViewEvent::IntervalChanged(self.state.interval_seconds))
            .await;
        self.emit(ViewEvent::PlaybackChanged {
            playing: self.state.is_playing,
        })
        .await;
        if total == 0 {
            info!("image list is empty; playback disabled");
            return;
        }
        info!(total, interval = self.state.interval_seconds, "starting slideshow");
        self.reset_timer();
        self.go_to(0).await;
    }

    /// Run until the user quits, the input side closes, or `cancel` fires.
    pub async fn run(
        mut self,
        mut inputs: Receiver<InputEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.start().await;
        loop {
            let tick_at = self.next_tick;
            let resize_at = self.resize_deadline;
            select! {
                _ = cancel.cancelled() => {
                    info!("cancel received; closing slideshow");
                    break;
                }

                input = inputs.recv() => match input {
                    Some(event) => {
                        if self.handle_input(event).await == Flow::Quit {
                            break;
                        }
                    }
                    None => {
                        debug!("input channel closed");
                        break;
                    }
                },

                Some(fetched) = self.cache.next_fetched() => {
                    self.on_fetched(fetched).await;
                }

                _ = sleep_until(tick_at.unwrap_or_else(Instant::now)), if tick_at.is_some() => {
                    self.tick().await;
                }

                _ = sleep_until(resize_at.unwrap_or_else(Instant::now)), if resize_at.is_some() => {
                    self.persist_window_size();
                }
            }
        }
        self.close().await;
        Ok(())
    }

    pub async fn handle_input(&mut self, event: InputEvent) -> Flow {
        debug!(?event, "input");
        match event {
            InputEvent::Quit => return Flow::Quit,
            InputEvent::Next => self.step(1).await,
            InputEvent::Previous => self.step(-1).await,
            InputEvent::TogglePlay => self.toggle_play().await,
            InputEvent::ToggleFullscreen => self.toggle_fullscreen().await,
            InputEvent::SetInterval(secs) => self.set_interval(secs).await,
            InputEvent::Resize { width, height } => self.resize(width, height).await,
            InputEvent::MouseRegionEntered(Region::Top) => {
                self.emit(ViewEvent::ToolbarVisible(true)).await;
            }
            InputEvent::MouseRegionLeft(Region::Top) => {
                self.emit(ViewEvent::ToolbarVisible(false)).await;
            }
            InputEvent::MouseRegionEntered(Region::BottomRight) => {
                self.caption_visible = true;
                let info = self.current_info();
                self.emit(ViewEvent::CaptionVisible(info)).await;
            }
            InputEvent::MouseRegionLeft(Region::BottomRight) => {
                self.caption_visible = false;
                self.emit(ViewEvent::CaptionVisible(None)).await;
            }
        }
        Flow::Continue
    }

    /// Timer advance. Does nothing while paused or with an empty list.
    pub async fn tick(&mut self) -> bool {
        if !self.state.is_playing || self.cache.list().is_empty() {
            debug!("tick ignored");
            return false;
        }
        let next = self.cache.list().next_index(self.state.current_index);
        self.reset_timer();
        self.go_to(next).await;
        true
    }

    /// Wait for one fetch to finish and apply it. `false` when nothing is running.
    pub async fn process_next_fetch(&mut self) -> bool {
        match self.cache.next_fetched().await {
            Some(fetched) => {
                self.on_fetched(fetched).await;
                true
            }
            None => false,
        }
    }

    async fn step(&mut self, delta: isize) {
        if self.cache.list().is_empty() {
            return;
        }
        let target = self.cache.list().offset(self.state.current_index, delta);
        self.reset_timer();
        self.go_to(target).await;
    }

    async fn go_to(&mut self, index: usize) {
        self.state.current_index = index;
        self.emit(ViewEvent::IndexChanged {
            index,
            total: self.cache.list().len(),
        })
        .await;
        self.refresh_window();
        self.present_current().await;
    }

    fn refresh_window(&mut self) {
        let window =
            self.cache
                .list()
                .window(self.state.current_index, self.preload_back, self.preload_ahead);
        self.cache.ensure(&window);
    }

    async fn on_fetched(&mut self, fetched: Fetched) {
        let Some(event) = self.cache.complete(fetched) else {
            return;
        };
        let index = match event {
            CacheEvent::ImageReady { index, .. } => index,
            CacheEvent::ImageFailed { index, id, reason } => {
                if let Err(err) = self.bad_images.record(&id, &reason) {
                    warn!(error = %format!("{err:#}"), "could not write bad-image log");
                }
                index
            }
        };
        self.refresh_window();
        if index == self.state.current_index {
            self.present_current().await;
        }
    }

    /// Show whatever the cache holds for the current index. A pending entry
    /// is shown later, when its fetch completes; the caption follows the
    /// current index regardless.
    async fn present_current(&mut self) {
        let index = self.state.current_index;
        let Some(entry) = self.cache.get(index) else {
            return;
        };
        let year = match &entry.state {
            EntryState::Ready(image) => image.year,
            _ => None,
        };
        let info = SlideInfo::new(index, &entry.image.id, year);
        if self.caption_visible {
            self.emit(ViewEvent::CaptionVisible(Some(info.clone())))
                .await;
        }
        match entry.state {
            EntryState::Pending => debug!(index, "current image still loading"),
            EntryState::Ready(image) => {
                let (display_w, display_h) = self.display;
                let placement = Placement::contain(image.width, image.height, display_w, display_h);
                debug!(index, id = %entry.image.id, heading = %info.heading(), "showing image");
                self.emit(ViewEvent::ShowImage {
                    index,
                    image,
                    placement,
                    info,
                })
                .await;
            }
            EntryState::Failed(reason) => {
                self.emit(ViewEvent::ShowPlaceholder {
                    index,
                    id: entry.image.id,
                    reason,
                    info,
                })
                .await;
            }
        }
    }

    fn current_info(&self) -> Option<SlideInfo> {
        let index = self.state.current_index;
        let image = self.cache.list().get(index)?;
        let year = match self.cache.get(index).map(|entry| entry.state) {
            Some(EntryState::Ready(prepared)) => prepared.year,
            _ => None,
        };
        Some(SlideInfo::new(index, &image.id, year))
    }

    async fn toggle_play(&mut self) {
        if self.cache.list().is_empty() {
            return;
        }
        self.state.is_playing = !self.state.is_playing;
        self.reset_timer();
        info!(playing = self.state.is_playing, "playback toggled");
        self.emit(ViewEvent::PlaybackChanged {
            playing: self.state.is_playing,
        })
        .await;
    }

    async fn toggle_fullscreen(&mut self) {
        if self.resize_deadline.is_some() {
            self.persist_window_size();
        }
        self.state.is_fullscreen = !self.state.is_fullscreen;
        let fullscreen = self.state.is_fullscreen;
        self.persist(|s| s.is_fullscreen = fullscreen);
        self.emit(ViewEvent::FullscreenChanged(fullscreen)).await;
        if !fullscreen && self.display != self.window_size {
            self.display = self.window_size;
            self.present_current().await;
        }
    }

    async fn set_interval(&mut self, secs: u32) {
        let secs = clamp_interval(secs);
        self.state.interval_seconds = secs;
        self.persist(|s| s.interval_seconds = secs);
        self.reset_timer();
        self.emit(ViewEvent::IntervalChanged(secs)).await;
    }

    async fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.display {
            return;
        }
        self.display = (width, height);
        if !self.state.is_fullscreen {
            self.window_size = (width, height);
            self.resize_deadline = Some(Instant::now() + self.resize_debounce);
        }
        self.present_current().await;
    }

    fn persist_window_size(&mut self) {
        self.resize_deadline = None;
        let (width, height) = self.window_size;
        self.persist(|s| {
            s.window_width = width;
            s.window_height = height;
        });
    }

    fn persist(&mut self, change: impl FnOnce(&mut Settings)) {
        match self.settings.update(change) {
            Ok(true) => debug!(path = %self.settings.path().display(), "settings saved"),
            Ok(false) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "failed to save settings"),
        }
    }

    fn reset_timer(&mut self) {
        self.next_tick = self
            .state
            .is_playing
            .then(|| Instant::now() + Duration::from_secs(u64::from(self.state.interval_seconds)));
    }

    async fn close(&mut self) {
        if self.resize_deadline.is_some() {
            self.persist_window_size();
        }
        if let Err(err) = self.settings.save() {
            warn!(error = %format!("{err:#}"), "failed to flush settings");
        }
        if let Some(path) = self.bad_images.path() {
            info!(path = %path.display(), "bad images were recorded this session");
        }
        self.emit(ViewEvent::Closed).await;
        info!("slideshow closed");
    }

    async fn emit(&self, event: ViewEvent) {
        if self.view.send(event).await.is_err() {
            debug!("view receiver dropped");
        }
    }
}
