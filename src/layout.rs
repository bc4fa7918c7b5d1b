//! Letterbox placement of a slide inside the display area.

/// Where to draw a slide: scaled size and top-left offset within the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Scale `src` to fit entirely inside `display`, preserving aspect ratio,
    /// and center it.
    pub fn contain(src_w: u32, src_h: u32, display_w: u32, display_h: u32) -> Self {
        let (width, height) = resize_to_contain(display_w, display_h, src_w, src_h);
        let (x, y) = center_offset(width, height, display_w, display_h);
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

fn resize_to_contain(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let cw = canvas_w.max(1) as f32;
    let ch = canvas_h.max(1) as f32;
    let scale = (cw / iw).min(ch / ih).max(0.0);
    let scale = if scale.is_finite() { scale } else { 1.0 };
    let w = (iw * scale).round().clamp(1.0, cw);
    let h = (ih * scale).round().clamp(1.0, ch);
    (w as u32, h as u32)
}

fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}
