//! Reader page navigation.
//!
//! Desktop readers hand the actual page turn to a flip renderer and wait for it
//! to report completion; mobile readers (or readers without a renderer) jump
//! straight to the target page.

use serde::Serialize;

/// Page-flip widget driven by the navigator
pub trait FlipRenderer: Send {
    /// Starts animating towards `index`; completion is reported back through
    /// [`FlipNavigator::flip_completed`].
    fn flip_to(&mut self, index: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavMode {
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FlipState {
    Idle,
    Flipping { target: usize },
}

/// What a navigation request did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "index", rename_all = "snake_case")]
pub enum NavOutcome {
    /// Current page changed immediately
    Moved(usize),
    /// Renderer is animating towards the page
    FlipStarted(usize),
    /// Already there, at a bound, or a flip is in progress
    Ignored,
}

pub struct FlipNavigator {
    current: usize,
    page_count: usize,
    mode: NavMode,
    state: FlipState,
    renderer: Option<Box<dyn FlipRenderer>>,
}

impl FlipNavigator {
    pub fn new(page_count: usize, mode: NavMode) -> Self {
        Self {
            current: 0,
            page_count,
            mode,
            state: FlipState::Idle,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn FlipRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn state(&self) -> FlipState {
        self.state
    }

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    /// Switches layout. Mobile has no page-turn animation, so a flip still
    /// in progress is committed to its target right away.
    pub fn set_mode(&mut self, mode: NavMode) {
        self.mode = mode;
        if mode == NavMode::Mobile {
            self.flip_completed();
        }
    }

    fn last_index(&self) -> usize {
        self.page_count.saturating_sub(1)
    }

    pub fn next(&mut self) -> NavOutcome {
        if self.current >= self.last_index() {
            return NavOutcome::Ignored;
        }
        self.navigate(self.current + 1)
    }

    pub fn prev(&mut self) -> NavOutcome {
        if self.current == 0 {
            return NavOutcome::Ignored;
        }
        self.navigate(self.current - 1)
    }

    /// Moves to `index`, clamped into the book
    pub fn go_to(&mut self, index: usize) -> NavOutcome {
        self.navigate(index.min(self.last_index()))
    }

    pub fn first(&mut self) -> NavOutcome {
        self.navigate(0)
    }

    pub fn last(&mut self) -> NavOutcome {
        self.navigate(self.last_index())
    }

    fn navigate(&mut self, target: usize) -> NavOutcome {
        if self.page_count == 0 || target == self.current {
            return NavOutcome::Ignored;
        }
        if let FlipState::Flipping { target: pending } = self.state {
            tracing::debug!(pending, requested = target, "flip in progress, navigation ignored");
            return NavOutcome::Ignored;
        }

        match (self.mode, self.renderer.as_mut()) {
            (NavMode::Desktop, Some(renderer)) => {
                self.state = FlipState::Flipping { target };
                renderer.flip_to(target);
                NavOutcome::FlipStarted(target)
            }
            _ => {
                self.current = target;
                NavOutcome::Moved(target)
            }
        }
    }

    /// Renderer finished the page turn; returns the page now shown
    pub fn flip_completed(&mut self) -> usize {
        if let FlipState::Flipping { target } = self.state {
            self.current = target.min(self.last_index());
            self.state = FlipState::Idle;
        }
        self.current
    }

    /// Updates the page count and re-clamps the current page
    pub fn set_page_count(&mut self, page_count: usize) {
        self.page_count = page_count;
        self.current = self.current.min(self.last_index());
        if let FlipState::Flipping { target } = self.state {
            self.state = FlipState::Flipping {
                target: target.min(self.last_index()),
            };
        }
    }
}
