//! Viewer state management

use super::geometry::Rotation;
use super::navigation::{NavigationController, PanelRequest};
use super::search::SearchMatch;
use super::split::PaneSplit;
use super::zoom::Zoom;

/// Results panel visibility, remembering whether the user closed it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultsPanel {
    pub visible: bool,
    /// Set when the user hides the panel; suppresses auto-opening
    pub user_closed: bool,
}

/// Per-document viewer state
#[derive(Clone, Debug)]
pub struct ViewerState {
    /// Current page (1-based)
    pub current_page: usize,

    pub page_count: usize,

    pub zoom: Zoom,

    pub rotation: Rotation,

    /// Query as typed; matching uses it trimmed
    pub query: String,

    /// Matches for `query`, ordered by page then item
    pub matches: Vec<SearchMatch>,

    /// Active match ordinal, 0 when none is active
    pub current_match: usize,

    pub results_panel: ResultsPanel,

    pub pane: PaneSplit,
}

impl ViewerState {
    /// Fresh state for a document of `page_count` pages, opened at
    /// `initial_page` (clamped into range)
    #[must_use]
    pub fn new(page_count: usize, initial_page: usize, pane: PaneSplit) -> Self {
        Self {
            current_page: initial_page.clamp(1, page_count.max(1)),
            page_count,
            zoom: Zoom::default(),
            rotation: Rotation::Deg0,
            query: String::new(),
            matches: Vec::new(),
            current_match: 0,
            results_panel: ResultsPanel::default(),
            pane,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::GoToPage(page) => {
                if !(1..=self.page_count).contains(&page) {
                    return vec![];
                }
                let had_active = self.current_match != 0;
                self.current_match = 0;
                if self.current_page != page {
                    self.show_page(page)
                } else if had_active {
                    vec![Effect::RebuildOverlay]
                } else {
                    vec![]
                }
            }

            Command::SetZoom(level) => {
                let before = self.zoom.level();
                self.zoom.set_level(level);
                self.rerender_if_changed(before)
            }

            Command::ZoomIn(step) => {
                let before = self.zoom.level();
                self.zoom.zoom_in(step);
                self.rerender_if_changed(before)
            }

            Command::ZoomOut(step) => {
                let before = self.zoom.level();
                self.zoom.zoom_out(step);
                self.rerender_if_changed(before)
            }

            Command::EnableFit => {
                self.zoom.enable_fit();
                vec![Effect::RecomputeFit]
            }

            Command::ApplyFit(level) => {
                if self.zoom.auto_fit() && self.zoom.apply_fit(level) {
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::SetRotation(rotation) => {
                if self.rotation != rotation {
                    self.rotation = rotation;
                    self.fit_then_render()
                } else {
                    vec![]
                }
            }

            Command::SetQuery(query) => {
                if query.trim() == self.query.trim() {
                    self.query = query;
                    return vec![];
                }
                self.query = query;
                if self.query.trim().is_empty() {
                    let mut effects = vec![Effect::ClearSearch];
                    effects.extend(self.apply_matches(Vec::new()));
                    effects
                } else {
                    // Old matches stay listed until the new scan lands, but
                    // none of them is active for the new query.
                    let had_active = self.current_match != 0;
                    self.current_match = 0;
                    if had_active {
                        vec![Effect::ScheduleSearch, Effect::RebuildOverlay]
                    } else {
                        vec![Effect::ScheduleSearch]
                    }
                }
            }

            Command::SetMatches(matches) => self.apply_matches(matches),

            Command::NextMatch => NavigationController::new(self).next(),

            Command::PrevMatch => NavigationController::new(self).prev(),

            Command::GotoMatch { ordinal, panel } => {
                NavigationController::new(self).goto_ordinal(ordinal, panel)
            }

            Command::ToggleResultsPanel => {
                let panel = &mut self.results_panel;
                panel.visible = !panel.visible;
                panel.user_closed = !panel.visible;
                self.panel_changed()
            }

            Command::SetPaneFraction(fraction) => {
                let pane = PaneSplit::new(fraction);
                if pane != self.pane {
                    self.pane = pane;
                    self.panel_changed()
                } else {
                    vec![]
                }
            }

            Command::ViewportResized => self.panel_changed(),
        }
    }

    /// Replaces the match list with the result of a finished scan.
    ///
    /// Opens the results panel on a transition from no matches to some,
    /// unless the user closed it; hides it when the list becomes empty.
    pub fn apply_matches(&mut self, matches: Vec<SearchMatch>) -> Vec<Effect> {
        let had_matches = !self.matches.is_empty();
        let was_visible = self.results_panel.visible;

        self.matches = matches;
        self.current_match = 0;

        if self.matches.is_empty() {
            self.results_panel.visible = false;
        } else if !had_matches && !self.results_panel.user_closed {
            self.results_panel.visible = true;
        }

        let mut effects = vec![Effect::RebuildOverlay];
        if self.results_panel.visible != was_visible {
            effects.extend(self.panel_changed());
        }
        effects
    }

    /// Switches to `page`, which must differ from the current one
    pub(super) fn show_page(&mut self, page: usize) -> Vec<Effect> {
        self.current_page = page;
        self.fit_then_render()
    }

    /// Opens the results panel on request; returns true if it was hidden
    pub(super) fn open_results_panel(&mut self) -> bool {
        let opened = !self.results_panel.visible;
        self.results_panel = ResultsPanel {
            visible: true,
            user_closed: false,
        };
        opened
    }

    /// Effects after the space available to the page changed
    pub(super) fn panel_changed(&self) -> Vec<Effect> {
        if self.zoom.auto_fit() {
            vec![Effect::RecomputeFit]
        } else {
            vec![]
        }
    }

    fn fit_then_render(&self) -> Vec<Effect> {
        if self.zoom.auto_fit() {
            vec![Effect::RecomputeFit, Effect::RenderCurrentPage]
        } else {
            vec![Effect::RenderCurrentPage]
        }
    }

    fn rerender_if_changed(&self, before: f32) -> Vec<Effect> {
        if (self.zoom.level() - before).abs() > f32::EPSILON {
            vec![Effect::RenderCurrentPage]
        } else {
            vec![]
        }
    }

    pub fn active_match(&self) -> Option<&SearchMatch> {
        self.current_match
            .checked_sub(1)
            .and_then(|i| self.matches.get(i))
    }
}

/// Commands that modify viewer state
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Manual page change; clears the active match
    GoToPage(usize),
    /// Explicit zoom level; disables auto-fit
    SetZoom(f32),
    ZoomIn(f32),
    ZoomOut(f32),
    /// Turn auto-fit back on
    EnableFit,
    /// Store a freshly computed fit level (ignored unless auto-fit is on)
    ApplyFit(f32),
    SetRotation(Rotation),
    SetQuery(String),
    /// Results of a completed scan for the current query
    SetMatches(Vec<SearchMatch>),
    NextMatch,
    PrevMatch,
    GotoMatch { ordinal: usize, panel: PanelRequest },
    ToggleResultsPanel,
    SetPaneFraction(f32),
    /// The host resized the container
    ViewportResized,
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Render the current page at the current zoom and rotation
    RenderCurrentPage,
    /// Recompute the auto-fit zoom level
    RecomputeFit,
    /// Start the debounce period for a new search
    ScheduleSearch,
    /// Abandon any pending or running search
    ClearSearch,
    /// Rebuild the highlight overlay
    RebuildOverlay,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ViewerState {
        ViewerState::new(5, 1, PaneSplit::default())
    }

    fn found(page: usize, ordinal: usize) -> SearchMatch {
        SearchMatch {
            page,
            item_index: 0,
            snippet: format!("match {ordinal}"),
            global_ordinal: ordinal,
            page_match_count: 1,
        }
    }

    #[test]
    fn initial_page_is_clamped() {
        assert_eq!(ViewerState::new(3, 0, PaneSplit::default()).current_page, 1);
        assert_eq!(ViewerState::new(3, 9, PaneSplit::default()).current_page, 3);
    }

    #[test]
    fn go_to_page_renders_and_refits() {
        let mut state = test_state();
        assert_eq!(
            state.apply(Command::GoToPage(3)),
            vec![Effect::RecomputeFit, Effect::RenderCurrentPage]
        );
        assert_eq!(state.current_page, 3);
    }

    #[test]
    fn out_of_range_page_is_ignored() {
        let mut state = test_state();
        assert!(state.apply(Command::GoToPage(0)).is_empty());
        assert!(state.apply(Command::GoToPage(6)).is_empty());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn manual_page_change_clears_active_match() {
        let mut state = test_state();
        let _ = state.apply_matches(vec![found(1, 1), found(4, 2)]);
        let _ = state.apply(Command::NextMatch);
        assert_eq!(state.current_match, 1);

        let _ = state.apply(Command::GoToPage(2));
        assert_eq!(state.current_match, 0);
    }

    #[test]
    fn manual_zoom_disables_fit_until_reenabled() {
        let mut state = test_state();
        assert_eq!(
            state.apply(Command::ZoomIn(Zoom::STEP)),
            vec![Effect::RenderCurrentPage]
        );
        assert!(!state.zoom.auto_fit());
        assert!(state.apply(Command::ApplyFit(0.5)).is_empty());
        assert_eq!(state.apply(Command::EnableFit), vec![Effect::RecomputeFit]);
        assert_eq!(
            state.apply(Command::ApplyFit(0.5)),
            vec![Effect::RenderCurrentPage]
        );
    }

    #[test]
    fn clearing_query_clears_matches_and_hides_panel() {
        let mut state = test_state();
        assert_eq!(
            state.apply(Command::SetQuery("revenue".into())),
            vec![Effect::ScheduleSearch]
        );
        let _ = state.apply(Command::SetMatches(vec![found(2, 1)]));
        let _ = state.apply(Command::NextMatch);
        assert!(state.results_panel.visible);

        let effects = state.apply(Command::SetQuery("   ".into()));
        assert_eq!(effects[0], Effect::ClearSearch);
        assert!(state.matches.is_empty());
        assert_eq!(state.current_match, 0);
        assert!(!state.results_panel.visible);
    }

    #[test]
    fn new_query_drops_the_active_match() {
        let mut state = test_state();
        let _ = state.apply(Command::SetQuery("revenue".into()));
        let _ = state.apply(Command::SetMatches(vec![found(2, 1), found(4, 2)]));
        let _ = state.apply(Command::NextMatch);
        assert_eq!(state.current_match, 1);

        assert_eq!(
            state.apply(Command::SetQuery("report".into())),
            vec![Effect::ScheduleSearch, Effect::RebuildOverlay]
        );
        assert_eq!(state.current_match, 0);
        assert!(state.active_match().is_none());
        assert_eq!(state.matches.len(), 2);
    }

    #[test]
    fn whitespace_only_query_edits_do_not_rescan() {
        let mut state = test_state();
        let _ = state.apply(Command::SetQuery("revenue".into()));
        assert!(state.apply(Command::SetQuery("revenue ".into())).is_empty());
    }

    #[test]
    fn panel_auto_opens_once_and_respects_user_close() {
        let mut state = test_state();
        let _ = state.apply_matches(vec![found(1, 1)]);
        assert!(state.results_panel.visible);

        let _ = state.apply(Command::ToggleResultsPanel);
        assert!(state.results_panel.user_closed);

        let _ = state.apply_matches(Vec::new());
        let _ = state.apply_matches(vec![found(2, 1)]);
        assert!(!state.results_panel.visible);

        let _ = state.apply(Command::ToggleResultsPanel);
        assert!(state.results_panel.visible);
        assert!(!state.results_panel.user_closed);
    }

    #[test]
    fn panel_visibility_change_refits() {
        let mut state = test_state();
        let effects = state.apply_matches(vec![found(1, 1)]);
        assert_eq!(effects, vec![Effect::RebuildOverlay, Effect::RecomputeFit]);

        let effects = state.apply_matches(vec![found(1, 1), found(3, 2)]);
        assert_eq!(effects, vec![Effect::RebuildOverlay]);
    }

    #[test]
    fn rotation_change_refits_and_renders() {
        let mut state = test_state();
        assert_eq!(
            state.apply(Command::SetRotation(Rotation::Deg90)),
            vec![Effect::RecomputeFit, Effect::RenderCurrentPage]
        );
        assert!(state.apply(Command::SetRotation(Rotation::Deg90)).is_empty());
    }

    #[test]
    fn pane_fraction_is_clamped() {
        let mut state = test_state();
        let _ = state.apply(Command::SetPaneFraction(0.99));
        assert_eq!(state.pane.left_fraction(), PaneSplit::MAX_FRACTION);
    }
}
