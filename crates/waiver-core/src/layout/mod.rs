//! Page layout for generated documents
//!
//! Layout works top-down like a printer: a vertical cursor measured from the
//! top edge of the page advances one line height per printed line, and a new
//! page is started whenever the cursor has moved past the bottom margin.
//! Every wrapped line is checked on its own, so a single long field can spill
//! onto the next page half way through.
//!
//! Layout is pure arithmetic over bounded input and cannot fail; turning a
//! [`Layout`] into bytes is the job of [`crate::render`].

pub mod metrics;

use serde::Serialize;

pub use metrics::{text_width, wrap_text};

/// Space a placed image must leave above the page's bottom edge. An image
/// whose top would sit lower than this starts on a fresh page.
pub const IMAGE_CLEARANCE: f64 = 120.0;

/// How far the cursor moves past a placed image (its box plus padding).
pub const IMAGE_ADVANCE: f64 = 100.0;

/// Fixed page geometry in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub line_height: f64,
}

impl PageGeometry {
    /// US Letter (8.5in x 11in at 72pt/in)
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            margin_left: 40.0,
            margin_right: 40.0,
            margin_top: 60.0,
            margin_bottom: 60.0,
            line_height: 15.0,
        }
    }

    pub fn content_width(&self) -> f64 {
        self.width - self.margin_left - self.margin_right
    }

    /// Last cursor position at which a line may still be printed.
    pub fn bottom_limit(&self) -> f64 {
        self.height - self.margin_bottom
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::letter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// `y` is the text baseline, measured from the top edge
    Text {
        x: f64,
        y: f64,
        font_size: f64,
        text: String,
    },
    /// `y` is the image's top edge, measured from the top edge of the page
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl Placement {
    pub fn y(&self) -> f64 {
        match self {
            Placement::Text { y, .. } | Placement::Image { y, .. } => *y,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Placement::Text { text, .. } => Some(text),
            Placement::Image { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub placements: Vec<Placement>,
}

impl Page {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.placements.iter().filter_map(Placement::text)
    }

    pub fn has_image(&self) -> bool {
        self.placements
            .iter()
            .any(|p| matches!(p, Placement::Image { .. }))
    }
}

/// A finished, paginated document. Always has at least one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All printed text, in reading order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(Page::lines)
    }
}

/// Cursor-driven writer that builds a [`Layout`].
#[derive(Debug, Clone)]
pub struct PageWriter {
    geometry: PageGeometry,
    pages: Vec<Page>,
    cursor: f64,
    font_size: f64,
}

impl PageWriter {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            cursor: geometry.margin_top,
            font_size: 12.0,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn set_font_size(&mut self, font_size: f64) {
        self.font_size = font_size;
    }

    pub fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = self.geometry.margin_top;
    }

    /// Start a new page if the cursor has moved past the bottom margin.
    pub fn ensure_room(&mut self) {
        if self.cursor > self.geometry.bottom_limit() {
            self.new_page();
        }
    }

    /// Move the cursor down by `dy` and re-check for overflow, the way a gap
    /// between form sections is laid out.
    pub fn advance(&mut self, dy: f64) {
        self.cursor += dy;
        self.ensure_room();
    }

    /// Raw cursor move with no overflow check.
    pub fn skip(&mut self, dy: f64) {
        self.cursor += dy;
    }

    /// Print one line without wrapping.
    pub fn print_line(&mut self, text: &str) {
        self.ensure_room();
        self.push_text(text.to_string());
        self.cursor += self.geometry.line_height;
    }

    /// Wrap `text` to the content width and print it line by line, breaking
    /// the page in front of the first line that would land past the margin.
    pub fn wrap_and_print(&mut self, text: &str) {
        for line in wrap_text(text, self.geometry.content_width(), self.font_size) {
            self.print_line(&line);
        }
    }

    /// Place an image at the left margin, forcing a page break first if the
    /// cursor is within [`IMAGE_CLEARANCE`] of the page's bottom edge.
    pub fn place_image(&mut self, width: f64, height: f64) {
        if self.cursor > self.geometry.height - IMAGE_CLEARANCE {
            self.new_page();
        }
        let placement = Placement::Image {
            x: self.geometry.margin_left,
            y: self.cursor,
            width,
            height,
        };
        self.current_page().placements.push(placement);
        self.cursor += IMAGE_ADVANCE;
    }

    pub fn finish(self) -> Layout {
        Layout {
            geometry: self.geometry,
            pages: self.pages,
        }
    }

    fn push_text(&mut self, text: String) {
        let placement = Placement::Text {
            x: self.geometry.margin_left,
            y: self.cursor,
            font_size: self.font_size,
            text,
        };
        self.current_page().placements.push(placement);
    }

    fn current_page(&mut self) -> &mut Page {
        // pages is never empty: new() seeds the first page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_lines(count: usize) -> String {
        (1..=count)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_letter_geometry() {
        let g = PageGeometry::letter();
        assert_eq!(g.content_width(), 532.0);
        assert_eq!(g.bottom_limit(), 732.0);
    }

    #[test]
    fn test_full_page_holds_45_lines() {
        // lines print at 60, 75, ... 720; the 46th would sit at 735 > 732
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.wrap_and_print(&numbered_lines(50));
        let layout = writer.finish();

        assert_eq!(layout.page_count(), 2);
        assert_eq!(layout.pages[0].lines().count(), 45);
        assert_eq!(layout.pages[0].lines().last(), Some("line 45"));
        assert_eq!(layout.pages[0].placements.last().unwrap().y(), 720.0);

        let second = &layout.pages[1];
        assert_eq!(second.lines().next(), Some("line 46"));
        assert_eq!(second.placements[0].y(), 60.0);
        assert_eq!(second.lines().count(), 5);
    }

    #[test]
    fn test_line_exactly_on_boundary_stays_on_page() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.skip(732.0 - 60.0);
        writer.print_line("on the line");
        assert_eq!(writer.page_count(), 1);

        writer.print_line("past it");
        assert_eq!(writer.page_count(), 2);
        let layout = writer.finish();
        assert_eq!(layout.pages[0].placements[0].y(), 732.0);
        assert_eq!(layout.pages[1].placements[0].y(), 60.0);
    }

    #[test]
    fn test_wrapped_field_spills_mid_field() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.skip(700.0 - 60.0);
        // cursor at 700: lines at 700, 715, 730 fit; the fourth goes to page 2
        writer.wrap_and_print(&numbered_lines(6));
        let layout = writer.finish();
        assert_eq!(layout.pages[0].lines().count(), 3);
        assert_eq!(layout.pages[1].lines().collect::<Vec<_>>(), vec!["line 4", "line 5", "line 6"]);
    }

    #[test]
    fn test_advance_breaks_page_after_gap() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.skip(725.0 - 60.0);
        writer.advance(10.0);
        assert_eq!(writer.page_count(), 2);
        assert_eq!(writer.cursor(), 60.0);
    }

    #[test]
    fn test_image_forces_new_page_near_bottom() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        // 692 is within 100 of the bottom margin and past the 672 threshold
        writer.skip(692.0 - 60.0);
        writer.place_image(200.0, 80.0);
        let layout = writer.finish();

        assert_eq!(layout.page_count(), 2);
        assert!(!layout.pages[0].has_image());
        assert_eq!(
            layout.pages[1].placements[0],
            Placement::Image {
                x: 40.0,
                y: 60.0,
                width: 200.0,
                height: 80.0
            }
        );
    }

    #[test]
    fn test_image_at_threshold_stays_on_page() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.skip(672.0 - 60.0);
        writer.place_image(200.0, 80.0);
        assert_eq!(writer.page_count(), 1);
        assert_eq!(writer.cursor(), 772.0);
    }

    #[test]
    fn test_font_size_recorded_per_line() {
        let mut writer = PageWriter::new(PageGeometry::letter());
        writer.set_font_size(16.0);
        writer.print_line("Title");
        writer.set_font_size(12.0);
        writer.print_line("Body");
        let layout = writer.finish();
        let sizes: Vec<f64> = layout.pages[0]
            .placements
            .iter()
            .map(|p| match p {
                Placement::Text { font_size, .. } => *font_size,
                Placement::Image { .. } => 0.0,
            })
            .collect();
        assert_eq!(sizes, vec![16.0, 12.0]);
    }
}
