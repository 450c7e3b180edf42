//! Match navigation
//!
//! Maps match ordinals to pages and moves the active match. Traversal is
//! cyclic in both directions.

use log::debug;

use super::search::SearchMatch;
use super::state::{Effect, ViewerState};

/// What a jump does to the results panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanelRequest {
    /// Leave the panel as it is
    #[default]
    Keep,
    /// Show the panel, clearing a previous user close
    Open,
}

pub struct NavigationController<'a> {
    state: &'a mut ViewerState,
}

impl<'a> NavigationController<'a> {
    pub fn new(state: &'a mut ViewerState) -> Self {
        Self { state }
    }

    /// Makes `target` the active match and shows its page
    pub fn jump_to(&mut self, target: &SearchMatch, panel: PanelRequest) -> Vec<Effect> {
        let mut effects = Vec::new();

        self.state.current_match = target.global_ordinal;
        let page_valid = (1..=self.state.page_count).contains(&target.page);
        if page_valid && target.page != self.state.current_page {
            effects.extend(self.state.show_page(target.page));
        }

        if panel == PanelRequest::Open && self.state.open_results_panel() {
            for effect in self.state.panel_changed() {
                if !effects.contains(&effect) {
                    effects.push(effect);
                }
            }
        }

        effects.push(Effect::RebuildOverlay);
        debug!(
            "Active match {} of {} on page {}",
            target.global_ordinal,
            self.state.matches.len(),
            target.page
        );
        effects
    }

    /// Jumps to the match with `ordinal`; unknown ordinals are ignored
    pub fn goto_ordinal(&mut self, ordinal: usize, panel: PanelRequest) -> Vec<Effect> {
        let Some(target) = ordinal
            .checked_sub(1)
            .and_then(|i| self.state.matches.get(i))
            .cloned()
        else {
            return vec![];
        };
        self.jump_to(&target, panel)
    }

    /// Following match, wrapping after the last. From no active match this
    /// is the first one.
    pub fn next(&mut self) -> Vec<Effect> {
        let count = self.state.matches.len();
        if count == 0 {
            return vec![];
        }
        let ordinal = self.state.current_match % count + 1;
        self.goto_ordinal(ordinal, PanelRequest::Keep)
    }

    /// Preceding match, wrapping before the first. From no active match
    /// this is the last one.
    pub fn prev(&mut self) -> Vec<Effect> {
        let count = self.state.matches.len();
        if count == 0 {
            return vec![];
        }
        let ordinal = match self.state.current_match {
            0 | 1 => count,
            n => n - 1,
        };
        self.goto_ordinal(ordinal, PanelRequest::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::split::PaneSplit;

    fn state_with_matches(pages: &[usize]) -> ViewerState {
        let mut state = ViewerState::new(5, 1, PaneSplit::default());
        let matches = pages
            .iter()
            .enumerate()
            .map(|(i, &page)| SearchMatch {
                page,
                item_index: i,
                snippet: String::new(),
                global_ordinal: i + 1,
                page_match_count: pages.iter().filter(|p| **p == page).count(),
            })
            .collect();
        let _ = state.apply_matches(matches);
        state
    }

    #[test]
    fn jump_sets_page_and_ordinal() {
        let mut state = state_with_matches(&[2, 2, 3]);
        let target = state.matches[2].clone();
        let effects =
            NavigationController::new(&mut state).jump_to(&target, PanelRequest::Keep);

        assert_eq!(state.current_page, 3);
        assert_eq!(state.current_match, 3);
        assert!(effects.contains(&Effect::RenderCurrentPage));
        assert_eq!(effects.last(), Some(&Effect::RebuildOverlay));
    }

    #[test]
    fn jump_within_page_only_rebuilds_overlay() {
        let mut state = state_with_matches(&[1, 1]);
        let effects =
            NavigationController::new(&mut state).goto_ordinal(2, PanelRequest::Keep);
        assert_eq!(effects, vec![Effect::RebuildOverlay]);
    }

    #[test]
    fn next_cycles_back_to_start() {
        let mut state = state_with_matches(&[1, 2, 2, 4]);
        let mut nav = NavigationController::new(&mut state);
        let _ = nav.next();
        assert_eq!(nav.state.current_match, 1);

        for _ in 0..4 {
            let _ = nav.next();
        }
        assert_eq!(nav.state.current_match, 1);
    }

    #[test]
    fn prev_undoes_next() {
        let mut state = state_with_matches(&[1, 2, 3]);
        let _ = state.apply(crate::viewer::state::Command::GotoMatch {
            ordinal: 3,
            panel: PanelRequest::Keep,
        });

        let mut nav = NavigationController::new(&mut state);
        let _ = nav.next();
        assert_eq!(nav.state.current_match, 1);
        let _ = nav.prev();
        assert_eq!(nav.state.current_match, 3);
        assert_eq!(nav.state.current_page, 3);
    }

    #[test]
    fn prev_from_none_goes_to_last() {
        let mut state = state_with_matches(&[1, 2, 3]);
        let _ = NavigationController::new(&mut state).prev();
        assert_eq!(state.current_match, 3);
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let mut state = state_with_matches(&[]);
        let mut nav = NavigationController::new(&mut state);
        assert!(nav.next().is_empty());
        assert!(nav.prev().is_empty());
        assert!(nav.goto_ordinal(1, PanelRequest::Open).is_empty());
        assert_eq!(nav.state.current_match, 0);
    }

    #[test]
    fn unknown_ordinal_is_ignored() {
        let mut state = state_with_matches(&[1]);
        let mut nav = NavigationController::new(&mut state);
        assert!(nav.goto_ordinal(0, PanelRequest::Keep).is_empty());
        assert!(nav.goto_ordinal(2, PanelRequest::Keep).is_empty());
    }

    #[test]
    fn open_request_reopens_a_user_closed_panel() {
        let mut state = state_with_matches(&[1, 3]);
        let _ = state.apply(crate::viewer::state::Command::ToggleResultsPanel);
        assert!(!state.results_panel.visible);

        let _ = NavigationController::new(&mut state).goto_ordinal(1, PanelRequest::Keep);
        assert!(!state.results_panel.visible);

        let effects =
            NavigationController::new(&mut state).goto_ordinal(2, PanelRequest::Open);
        assert!(state.results_panel.visible);
        assert!(!state.results_panel.user_closed);
        assert!(effects.contains(&Effect::RecomputeFit));
    }
}
