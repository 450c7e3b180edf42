//! Highlight overlay
//!
//! Text items are projected from document space into the device space of the
//! rendered page. The resulting boxes carry no visible glyphs: they exist to
//! carry highlight colour over the raster and to make text selectable.

use std::ops::Range;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use super::geometry::{PageViewport, Rotation};
use super::search::{QueryMatcher, SearchMatch};
use crate::document::TextItem;

/// Device-space placement of one text item.
///
/// `(left, top)` is the top-left corner of the run before rotation; the box
/// is rotated by `angle` degrees around that corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedBox {
    pub left: f32,
    pub top: f32,
    /// Advance width, when the collaborator reported one
    pub width: Option<f32>,
    pub font_height: f32,
    pub angle: f32,
}

impl ProjectedBox {
    /// Terminal cell rectangle covering the box, for renderers that draw
    /// on a character grid. Rotation is ignored.
    pub fn to_cells(&self, cell_width: f32, cell_height: f32) -> Rect {
        if !(cell_width > 0.0 && cell_height > 0.0) {
            return Rect::default();
        }

        let to_u16 = |v: f32| v.clamp(0.0, f32::from(u16::MAX)) as u16;
        let x = to_u16((self.left / cell_width).floor());
        let y = to_u16((self.top / cell_height).floor());
        let width = to_u16((self.width.unwrap_or(0.0) / cell_width).ceil()).max(1);
        let height = to_u16((self.font_height / cell_height).ceil()).max(1);

        Rect::new(x, y, width, height)
    }

    /// Hit test in device space. Boxes without a known width never hit.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let Some(width) = self.width else {
            return false;
        };

        let (sin, cos) = self.angle.to_radians().sin_cos();
        let dx = x - self.left;
        let dy = y - self.top;
        let local_x = dx * cos + dy * sin;
        let local_y = -dx * sin + dy * cos;

        (0.0..=width).contains(&local_x) && (0.0..=self.font_height).contains(&local_y)
    }
}

/// Projects `item` onto the page drawn with `viewport`
pub fn project(item: &TextItem, viewport: &PageViewport) -> ProjectedBox {
    let tx = viewport.transform.concat(item.transform);

    let font_height = tx.vertical_extent();
    let angle = tx.b.atan2(tx.a);
    // The baseline origin sits one font height below the top edge.
    let left = tx.e + font_height * angle.sin();
    let top = tx.f - font_height * angle.cos();

    ProjectedBox {
        left,
        top,
        width: item.width.map(|w| w * viewport.scale),
        font_height,
        angle: angle.to_degrees(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Highlight {
    /// Any item matching the query
    Match,
    /// The item of the active match
    Active,
}

impl Highlight {
    pub fn style(self) -> Style {
        match self {
            Self::Active => Style::default().bg(Color::Yellow).fg(Color::Black),
            Self::Match => Style::default().bg(Color::Rgb(100, 100, 0)),
        }
    }
}

/// A highlighted substring of a span, as a byte range into its text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightMark {
    pub range: Range<usize>,
    pub highlight: Highlight,
}

/// One transparent, selectable span per text item
#[derive(Clone, Debug, PartialEq)]
pub struct OverlaySpan {
    pub item_index: usize,
    pub text: String,
    pub bbox: ProjectedBox,
    pub marks: Vec<HighlightMark>,
}

impl OverlaySpan {
    pub fn is_highlighted(&self) -> bool {
        !self.marks.is_empty()
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.marks.first().map(|m| m.highlight)
    }
}

/// Everything an overlay depends on. Any difference forces a rebuild.
#[derive(Clone, Debug, PartialEq, Eq)]
struct OverlayKey {
    page: usize,
    scale_millionths: u32,
    rotation: Rotation,
    query: String,
    active_item: Option<usize>,
}

/// Inputs for one overlay build
#[derive(Clone, Copy, Debug)]
pub struct OverlayInput<'a> {
    pub page: usize,
    pub items: &'a [TextItem],
    pub viewport: &'a PageViewport,
    pub query: &'a str,
    pub matches: &'a [SearchMatch],
    pub active_ordinal: usize,
}

#[derive(Debug, Default)]
pub struct HighlightOverlay {
    key: Option<OverlayKey>,
    spans: Vec<OverlaySpan>,
}

impl HighlightOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the overlay from scratch unless it was already built for the
    /// same inputs. Returns true when it rebuilt.
    pub fn render(&mut self, input: OverlayInput<'_>) -> bool {
        let active_item = input
            .matches
            .iter()
            .find(|m| m.global_ordinal == input.active_ordinal && m.page == input.page)
            .map(|m| m.item_index);
        let key = OverlayKey {
            page: input.page,
            scale_millionths: (input.viewport.scale * 1_000_000.0).round() as u32,
            rotation: input.viewport.rotation,
            query: input.query.trim().to_string(),
            active_item,
        };
        if self.key.as_ref() == Some(&key) {
            return false;
        }

        self.spans.clear();
        let matcher = QueryMatcher::new(input.query);
        for item in input.items {
            let highlight = if active_item == Some(item.item_index) {
                Highlight::Active
            } else {
                Highlight::Match
            };
            let marks = matcher
                .as_ref()
                .map(|m| {
                    m.find_ranges(&item.text)
                        .into_iter()
                        .map(|range| HighlightMark { range, highlight })
                        .collect()
                })
                .unwrap_or_default();

            self.spans.push(OverlaySpan {
                item_index: item.item_index,
                text: item.text.clone(),
                bbox: project(item, input.viewport),
                marks,
            });
        }

        self.key = Some(key);
        true
    }

    /// Drops all spans; the next render always rebuilds
    pub fn clear(&mut self) {
        self.key = None;
        self.spans.clear();
    }

    pub fn spans(&self) -> &[OverlaySpan] {
        &self.spans
    }

    pub fn page(&self) -> Option<usize> {
        self.key.as_ref().map(|k| k.page)
    }

    /// Topmost span under a device-space point
    pub fn span_at(&self, x: f32, y: f32) -> Option<&OverlaySpan> {
        self.spans.iter().rev().find(|span| span.bbox.contains(x, y))
    }

    /// Cell-grid view of the highlighted spans
    pub fn layer(&self, cell_width: f32, cell_height: f32) -> OverlayLayer<'_> {
        OverlayLayer {
            spans: &self.spans,
            cell_width,
            cell_height,
        }
    }
}

/// Paints highlight backgrounds onto a terminal buffer, leaving the symbols
/// of the page image underneath untouched.
#[derive(Debug, Clone, Copy)]
pub struct OverlayLayer<'a> {
    spans: &'a [OverlaySpan],
    cell_width: f32,
    cell_height: f32,
}

impl Widget for OverlayLayer<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bounds = area.intersection(*buf.area());
        for span in self.spans {
            let Some(highlight) = span.highlight() else {
                continue;
            };
            let cells = span.bbox.to_cells(self.cell_width, self.cell_height);
            let target = Rect::new(
                area.x.saturating_add(cells.x),
                area.y.saturating_add(cells.y),
                cells.width,
                cells.height,
            )
            .intersection(bounds);
            buf.set_style(target, highlight.style());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageSize;
    use crate::viewer::Matrix;

    fn item(index: usize, text: &str, transform: [f32; 6], width: Option<f32>) -> TextItem {
        TextItem {
            text: text.to_string(),
            transform: Matrix::from(transform),
            width,
            page_number: 1,
            item_index: index,
        }
    }

    fn viewport(scale: f32, rotation: Rotation) -> PageViewport {
        PageViewport::new(PageSize::new(400.0, 800.0), scale, rotation)
    }

    fn found(page: usize, item_index: usize, ordinal: usize) -> SearchMatch {
        SearchMatch {
            page,
            item_index,
            snippet: String::new(),
            global_ordinal: ordinal,
            page_match_count: 1,
        }
    }

    #[test]
    fn projects_upright_item_at_scale() {
        let bbox = project(
            &item(0, "Revenue", [12.0, 0.0, 0.0, 12.0, 50.0, 700.0], Some(40.0)),
            &viewport(2.0, Rotation::Deg0),
        );
        assert!((bbox.left - 100.0).abs() < 1e-3);
        assert!((bbox.top - 176.0).abs() < 1e-3);
        assert!((bbox.font_height - 24.0).abs() < 1e-3);
        assert_eq!(bbox.width, Some(80.0));
        assert!(bbox.angle.abs() < 1e-3);
    }

    #[test]
    fn quarter_turn_rotates_span() {
        let bbox = project(
            &item(0, "x", [10.0, 0.0, 0.0, 10.0, 0.0, 0.0], None),
            &viewport(1.0, Rotation::Deg90),
        );
        assert!((bbox.angle - 90.0).abs() < 1e-3);
        assert!((bbox.font_height - 10.0).abs() < 1e-3);
    }

    #[test]
    fn marks_every_occurrence_and_active_item() {
        let items = [
            item(0, "revenue and Revenue", [10.0, 0.0, 0.0, 10.0, 0.0, 700.0], Some(100.0)),
            item(1, "costs", [10.0, 0.0, 0.0, 10.0, 0.0, 600.0], Some(30.0)),
            item(2, "net revenue", [10.0, 0.0, 0.0, 10.0, 0.0, 500.0], Some(60.0)),
        ];
        let matches = [found(1, 0, 1), found(1, 2, 2)];
        let vp = viewport(1.0, Rotation::Deg0);

        let mut overlay = HighlightOverlay::new();
        assert!(overlay.render(OverlayInput {
            page: 1,
            items: &items,
            viewport: &vp,
            query: "revenue",
            matches: &matches,
            active_ordinal: 2,
        }));

        let spans = overlay.spans();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].marks.len(), 2);
        assert_eq!(spans[0].highlight(), Some(Highlight::Match));
        assert!(!spans[1].is_highlighted());
        assert_eq!(spans[2].highlight(), Some(Highlight::Active));
        assert_eq!(spans[2].marks[0].range, 4..11);
    }

    #[test]
    fn rebuilds_only_when_inputs_change() {
        let items = [item(0, "alpha", [10.0, 0.0, 0.0, 10.0, 0.0, 700.0], Some(50.0))];
        let vp = viewport(1.0, Rotation::Deg0);
        let zoomed = viewport(1.5, Rotation::Deg0);
        let input = OverlayInput {
            page: 1,
            items: &items,
            viewport: &vp,
            query: "alp",
            matches: &[],
            active_ordinal: 0,
        };

        let mut overlay = HighlightOverlay::new();
        assert!(overlay.render(input));
        assert!(!overlay.render(input));
        assert!(overlay.render(OverlayInput {
            viewport: &zoomed,
            ..input
        }));
        assert!((overlay.spans()[0].bbox.font_height - 15.0).abs() < 1e-3);
        assert!(overlay.render(OverlayInput { query: "", ..input }));
        assert!(!overlay.spans()[0].is_highlighted());

        overlay.clear();
        assert!(overlay.spans().is_empty());
        assert!(overlay.render(OverlayInput { query: "", ..input }));
    }

    #[test]
    fn hit_testing_uses_projected_box() {
        let items = [item(3, "hello", [10.0, 0.0, 0.0, 10.0, 50.0, 700.0], Some(40.0))];
        let vp = viewport(1.0, Rotation::Deg0);
        let mut overlay = HighlightOverlay::new();
        overlay.render(OverlayInput {
            page: 1,
            items: &items,
            viewport: &vp,
            query: "",
            matches: &[],
            active_ordinal: 0,
        });

        // top = 800 - 700 - 10 = 90
        assert_eq!(overlay.span_at(60.0, 95.0).map(|s| s.item_index), Some(3));
        assert!(overlay.span_at(95.0, 95.0).is_none());
        assert!(overlay.span_at(60.0, 120.0).is_none());
    }

    #[test]
    fn cells_cover_the_box() {
        let bbox = ProjectedBox {
            left: 17.0,
            top: 33.0,
            width: Some(25.0),
            font_height: 10.0,
            angle: 0.0,
        };
        assert_eq!(bbox.to_cells(8.0, 16.0), Rect::new(2, 2, 4, 1));
        assert_eq!(bbox.to_cells(0.0, 16.0), Rect::default());
    }

    #[test]
    fn layer_paints_highlight_backgrounds() {
        let items = [item(0, "find me", [16.0, 0.0, 0.0, 16.0, 0.0, 768.0], Some(16.0))];
        let vp = viewport(1.0, Rotation::Deg0);
        let mut overlay = HighlightOverlay::new();
        overlay.render(OverlayInput {
            page: 1,
            items: &items,
            viewport: &vp,
            query: "find",
            matches: &[],
            active_ordinal: 0,
        });

        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        overlay.layer(8.0, 16.0).render(area, &mut buf);

        // top = 800 - 768 - 16 = 16 -> row 1; width 16 -> two cells
        assert_eq!(buf[(0, 1)].bg, Color::Rgb(100, 100, 0));
        assert_eq!(buf[(1, 1)].bg, Color::Rgb(100, 100, 0));
        assert_eq!(buf[(2, 1)].bg, Color::Reset);
        assert_eq!(buf[(0, 0)].bg, Color::Reset);
    }
}
