//! Two-pane split layout and its divider drag gesture
//!
//! ```text
//! Idle -> Dragging -> Idle
//!            \-----> Idle (cancel restores the committed split)
//! ```

use std::sync::Arc;

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use log::debug;
use ratatui::layout::{Position, Rect};
use serde::{Deserialize, Serialize};

use super::listeners::{ListenerGuard, ListenerKind, ListenerRegistry};

/// Left pane share of the horizontal space, always within
/// [`MIN_FRACTION`](Self::MIN_FRACTION)..=[`MAX_FRACTION`](Self::MAX_FRACTION).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaneSplit {
    left_fraction: f32,
}

impl Default for PaneSplit {
    fn default() -> Self {
        Self { left_fraction: 0.5 }
    }
}

impl PaneSplit {
    pub const MIN_FRACTION: f32 = 0.2;
    pub const MAX_FRACTION: f32 = 0.8;

    #[must_use]
    pub fn new(left_fraction: f32) -> Self {
        Self {
            left_fraction: Self::clamp_fraction(left_fraction),
        }
    }

    pub fn clamp_fraction(fraction: f32) -> f32 {
        if fraction.is_finite() {
            fraction.clamp(Self::MIN_FRACTION, Self::MAX_FRACTION)
        } else {
            Self::default().left_fraction
        }
    }

    pub fn left_fraction(&self) -> f32 {
        self.left_fraction
    }

    pub fn right_fraction(&self) -> f32 {
        1.0 - self.left_fraction
    }

    /// Pane widths for a container `total` wide
    pub fn widths(&self, total: f32) -> (f32, f32) {
        let left = total * self.left_fraction;
        (left, total - left)
    }

    /// Splits `area` horizontally into left and right panes
    pub fn areas(&self, area: Rect) -> (Rect, Rect) {
        let left_width = (f32::from(area.width) * self.left_fraction).round() as u16;
        let left_width = left_width.min(area.width);
        let left = Rect::new(area.x, area.y, left_width, area.height);
        let right = Rect::new(
            area.x + left_width,
            area.y,
            area.width - left_width,
            area.height,
        );
        (left, right)
    }
}

#[derive(Debug)]
enum DragState {
    Idle,
    Dragging {
        start_x: f32,
        start_fraction: f32,
        live: PaneSplit,
        _listeners: ListenerGuard,
    },
}

/// What a terminal mouse event did to the split
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResizeOutcome {
    Ignored,
    Started,
    Live(PaneSplit),
    Committed(PaneSplit),
}

pub struct SplitPaneResizer {
    committed: PaneSplit,
    state: DragState,
    registry: Arc<dyn ListenerRegistry>,
}

impl SplitPaneResizer {
    pub fn new(initial: PaneSplit, registry: Arc<dyn ListenerRegistry>) -> Self {
        Self {
            committed: initial,
            state: DragState::Idle,
            registry,
        }
    }

    /// Split the host should lay out right now: the live one mid-drag
    pub fn split(&self) -> PaneSplit {
        match &self.state {
            DragState::Dragging { live, .. } => *live,
            DragState::Idle => self.committed,
        }
    }

    pub fn committed(&self) -> PaneSplit {
        self.committed
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Starts a drag at pointer `x`. Ignored while already dragging.
    pub fn pointer_down(&mut self, x: f32) -> bool {
        if self.is_dragging() {
            return false;
        }

        let listeners = ListenerGuard::attach(
            &self.registry,
            &[ListenerKind::PointerMove, ListenerKind::PointerUp],
        );
        self.state = DragState::Dragging {
            start_x: x,
            start_fraction: self.committed.left_fraction,
            live: self.committed,
            _listeners: listeners,
        };
        true
    }

    /// Updates the live split; `None` when no drag is active
    pub fn pointer_move(&mut self, x: f32, container_width: f32) -> Option<PaneSplit> {
        let DragState::Dragging {
            start_x,
            start_fraction,
            live,
            ..
        } = &mut self.state
        else {
            return None;
        };

        if container_width > 0.0 {
            let delta = (x - *start_x) / container_width;
            *live = PaneSplit::new(*start_fraction + delta);
        }
        Some(*live)
    }

    /// Ends the drag and commits the last live split
    pub fn pointer_up(&mut self) -> Option<PaneSplit> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging { live, .. } => {
                debug!("Pane split committed at {:.3}", live.left_fraction);
                self.committed = live;
                Some(live)
            }
            DragState::Idle => None,
        }
    }

    /// Abandons a drag without committing
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Programmatic change; abandons any drag in progress
    pub fn set_fraction(&mut self, fraction: f32) -> PaneSplit {
        self.cancel();
        self.committed = PaneSplit::new(fraction);
        self.committed
    }

    /// Drives the gesture from terminal mouse events. `divider` is the
    /// grab area, `container` the area being split.
    pub fn handle_mouse(
        &mut self,
        mouse: MouseEvent,
        divider: Rect,
        container: Rect,
    ) -> ResizeOutcome {
        let x = f32::from(mouse.column.saturating_sub(container.x));
        let width = f32::from(container.width);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let on_divider = divider.contains(Position::new(mouse.column, mouse.row));
                if on_divider && self.pointer_down(x) {
                    ResizeOutcome::Started
                } else {
                    ResizeOutcome::Ignored
                }
            }
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => self
                .pointer_move(x, width)
                .map_or(ResizeOutcome::Ignored, ResizeOutcome::Live),
            MouseEventKind::Up(MouseButton::Left) => {
                if self.is_dragging() {
                    self.pointer_move(x, width);
                }
                self.pointer_up()
                    .map_or(ResizeOutcome::Ignored, ResizeOutcome::Committed)
            }
            _ => ResizeOutcome::Ignored,
        }
    }
}

impl std::fmt::Debug for SplitPaneResizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitPaneResizer")
            .field("committed", &self.committed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
