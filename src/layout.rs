// Placement of dropdowns and popovers relative to their anchor.
// Pure geometry, no rendering framework involved.

/// Gap between the anchor and the dropdown
pub const DROPDOWN_OFFSET: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

/// Horizontal alignment of the content against the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

/// Position `content` next to `anchor` inside `viewport`.
///
/// The content opens below the anchor, flips above it when it only fits there,
/// and is finally clamped so it never leaves the viewport's top-left corner.
pub fn compute_position(anchor: Rect, content: Size, viewport: Size, align: Align) -> Position {
    let below = anchor.bottom() + DROPDOWN_OFFSET;
    let above = anchor.y - DROPDOWN_OFFSET - content.height;
    let fits_below = below + content.height <= viewport.height;
    let top = if !fits_below && above >= 0.0 { above } else { below };

    let left = match align {
        Align::Start => anchor.x,
        Align::Center => anchor.x + (anchor.width - content.width) / 2.0,
        Align::End => anchor.right() - content.width,
    };

    Position {
        top: clamp_axis(top, content.height, viewport.height),
        left: clamp_axis(left, content.width, viewport.width),
    }
}

fn clamp_axis(start: f64, extent: f64, limit: f64) -> f64 {
    let max = (limit - extent).max(0.0);
    start.clamp(0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size {
        width: 1280.0,
        height: 800.0,
    };

    #[test]
    fn test_opens_below_anchor() {
        let anchor = Rect::new(100.0, 50.0, 120.0, 30.0);
        let pos = compute_position(anchor, Size::new(200.0, 150.0), VIEWPORT, Align::Start);
        assert_eq!(pos, Position { top: 84.0, left: 100.0 });
    }

    #[test]
    fn test_flips_above_near_bottom() {
        let anchor = Rect::new(100.0, 700.0, 120.0, 30.0);
        let pos = compute_position(anchor, Size::new(200.0, 150.0), VIEWPORT, Align::Start);
        assert_eq!(pos.top, 700.0 - 4.0 - 150.0);
    }

    #[test]
    fn test_end_alignment_clamped_to_viewport() {
        let anchor = Rect::new(10.0, 10.0, 40.0, 20.0);
        let pos = compute_position(anchor, Size::new(200.0, 100.0), VIEWPORT, Align::End);
        // Would start at -150, clamped to the left edge
        assert_eq!(pos.left, 0.0);

        let anchor = Rect::new(1200.0, 10.0, 60.0, 20.0);
        let pos = compute_position(anchor, Size::new(200.0, 100.0), VIEWPORT, Align::Start);
        assert_eq!(pos.left, 1080.0);
    }

    #[test]
    fn test_center_alignment() {
        let anchor = Rect::new(400.0, 10.0, 100.0, 20.0);
        let pos = compute_position(anchor, Size::new(200.0, 100.0), VIEWPORT, Align::Center);
        assert_eq!(pos.left, 350.0);
    }

    #[test]
    fn test_content_larger_than_viewport() {
        let anchor = Rect::new(10.0, 10.0, 40.0, 20.0);
        let pos = compute_position(anchor, Size::new(2000.0, 1000.0), VIEWPORT, Align::Start);
        assert_eq!(pos, Position { top: 0.0, left: 0.0 });
    }
}
