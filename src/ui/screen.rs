use ratatui::Frame;

use crate::{
    ui::{cockpit::render_cockpit, learning::render_learning, results::render_results},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Falling kanji, HUD and input line
pub struct CockpitScreen;

impl Screen for CockpitScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_cockpit(app, f);
    }
}

/// Mission verdict and the last missed kanji
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_results(app, f);
    }
}

/// Kanji browser with search
pub struct LearningScreen;

impl Screen for LearningScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_learning(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Playing => Box::new(CockpitScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::Learning => Box::new(LearningScreen),
    }
}
