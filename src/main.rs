mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use kanji_cockpit::{
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore, Settings, SpeedTier},
    explosion::{BurstKind, Explosion},
    game::Game,
    kanji::{Browser, Catalog, Level, Mode, SelectionStrategy},
    mission::Penalty,
    round::{OutcomeKind, RoundNotice},
    runtime::{AppEvent, Clock, CrosstermEventSource, EventSource, FixedTicker, MonotonicClock, Runner, Ticker},
    sink::{NullSink, OutcomeSink, SinkWorker},
    stats::StatsDb,
    trajectory::ARRIVAL,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};

/// type the reading before the kanji reaches your cockpit
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Kanji fall toward your cockpit. Type the meaning or reading of each one before it arrives. Results and per-kanji history are kept locally."
)]
pub struct Cli {
    /// what to answer with
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// how long each kanji takes to arrive
    #[clap(short = 's', long, value_enum)]
    speed: Option<SpeedTier>,

    /// kanji group to draw from (bundled data covers n5 and n4 only)
    #[clap(short = 'l', long, value_enum)]
    level: Option<Level>,

    /// hits needed to win
    #[clap(short = 't', long, conflicts_with = "attrition")]
    target: Option<u32>,

    /// win by clearing every kanji of the level instead of reaching a target
    #[clap(long)]
    attrition: bool,

    /// failures allowed before the mission is lost
    #[clap(short = 'b', long, conflicts_with = "no_budget")]
    budget: Option<u32>,

    /// never lose on failures
    #[clap(long)]
    no_budget: bool,

    /// cost of misses and wrong answers
    #[clap(long, value_enum)]
    penalty: Option<Penalty>,

    /// how the next kanji is picked
    #[clap(long, value_enum)]
    selection: Option<SelectionStrategy>,

    /// narrow layout: every kanji falls down the centre
    #[clap(long)]
    mobile: bool,

    /// name stored with results
    #[clap(short = 'p', long)]
    player: Option<String>,

    /// seed for a reproducible run
    #[clap(long)]
    seed: Option<u64>,

    /// write the resulting settings back to the config file
    #[clap(long)]
    save_config: bool,

    /// open the kanji browser before the first mission
    #[clap(long)]
    learn: bool,

    /// print the last N sessions and the most missed kanji, then exit
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    history: Option<usize>,
}

impl Cli {
    /// Flags override stored settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(speed) = self.speed {
            settings.speed = speed;
        }
        if let Some(level) = self.level {
            settings.level = level;
        }
        if self.attrition {
            settings.mission_target = None;
        } else if let Some(target) = self.target {
            settings.mission_target = Some(target);
        }
        if self.no_budget {
            settings.error_budget = None;
        } else if let Some(budget) = self.budget {
            settings.error_budget = Some(budget);
        }
        if let Some(penalty) = self.penalty {
            settings.penalty = penalty;
        }
        if let Some(selection) = self.selection {
            settings.selection = selection;
        }
        if self.mobile {
            settings.mobile = true;
        }
        if let Some(player) = &self.player {
            settings.player = player.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Playing,
    Results,
    Learning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitType {
    Continue,
    Quit,
}

pub struct App {
    pub game: Game,
    pub state: AppState,
    pub input: String,
    /// last rejected answer, cleared when the next kanji appears
    pub feedback: Option<String>,
    pub explosion: Explosion,
    pub browser: Browser,
    /// where Esc leaves the learning screen to
    back_to: AppState,
    fx_rng: ChaCha8Rng,
    seed: Option<u64>,
    missions: u64,
}

impl App {
    pub fn new(
        settings: Settings,
        catalog: Catalog,
        seed: Option<u64>,
        sink: Box<dyn OutcomeSink>,
        now: Duration,
    ) -> Self {
        let fx_rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ 0x5eed),
            None => ChaCha8Rng::from_entropy(),
        };
        let browser = Browser::new(catalog.clone(), settings.level, settings.mode);
        let game = Game::new(settings, catalog, mission_rng(seed, 0), sink);
        let mut app = Self {
            game,
            state: AppState::Playing,
            input: String::new(),
            feedback: None,
            explosion: Explosion::new(),
            browser,
            back_to: AppState::Playing,
            fx_rng,
            seed,
            missions: 0,
        };
        app.begin(now);
        app
    }

    fn begin(&mut self, now: Duration) {
        match self.game.begin(now) {
            Ok(notices) => notices.into_iter().for_each(|n| self.on_notice(n)),
            Err(e) => log::error!("could not start mission: {e}"),
        }
        self.sync_state();
    }

    pub fn restart(&mut self, now: Duration) {
        self.missions += 1;
        self.game.reset(mission_rng(self.seed, self.missions));
        self.state = AppState::Playing;
        self.input.clear();
        self.feedback = None;
        self.explosion.clear();
        self.begin(now);
    }

    /// Show the kanji browser. A running mission is paused underneath.
    pub fn open_learning(&mut self, now: Duration) {
        if self.state == AppState::Learning {
            return;
        }
        if self.state == AppState::Playing {
            self.game.pause(now);
            self.explosion.freeze();
        }
        self.back_to = self.state;
        self.state = AppState::Learning;
    }

    pub fn on_tick(&mut self, now: Duration) {
        match self.game.on_frame(now) {
            Ok(notices) => notices.into_iter().for_each(|n| self.on_notice(n)),
            Err(e) => log::error!("frame failed: {e}"),
        }
        if !self.game.is_paused() {
            self.explosion.update(now);
        }
        self.sync_state();
    }

    fn on_notice(&mut self, notice: RoundNotice) {
        match notice {
            RoundNotice::Started { .. } => {
                self.input.clear();
                self.feedback = None;
            }
            RoundNotice::Rejected { answer } => self.feedback = Some(answer),
            RoundNotice::Exploding { at } => self.explosion.burst(at, BurstKind::Hit, &mut self.fx_rng),
            RoundNotice::Outcome(outcome) if outcome.kind == OutcomeKind::Missed => {
                self.explosion.burst(ARRIVAL, BurstKind::Miss, &mut self.fx_rng)
            }
            RoundNotice::Outcome(_) | RoundNotice::Ready => {}
        }
    }

    fn sync_state(&mut self) {
        if self.state == AppState::Playing && self.game.is_finished() {
            self.state = AppState::Results;
        }
    }

    fn on_key(&mut self, key: KeyEvent, now: Duration) -> ExitType {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.game.return_to_menu(now);
            return ExitType::Quit;
        }

        match self.state {
            AppState::Playing if self.game.is_paused() => match key.code {
                KeyCode::Tab | KeyCode::Esc => self.game.resume(now),
                KeyCode::Char('l') => self.open_learning(now),
                KeyCode::Char('m') => {
                    self.game.return_to_menu(now);
                    self.explosion.clear();
                    self.sync_state();
                }
                KeyCode::Char('q') => {
                    self.game.return_to_menu(now);
                    return ExitType::Quit;
                }
                _ => {}
            },
            AppState::Playing => match key.code {
                KeyCode::Tab | KeyCode::Esc => {
                    self.game.pause(now);
                    self.explosion.freeze();
                }
                KeyCode::Enter => {
                    let answer = std::mem::take(&mut self.input);
                    self.game.submit_answer(&answer);
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.restart(now),
                KeyCode::Char('l') => self.open_learning(now),
                KeyCode::Char('q') | KeyCode::Esc => return ExitType::Quit,
                _ => {}
            },
            AppState::Learning => match key.code {
                KeyCode::Esc => {
                    self.state = self.back_to;
                    self.sync_state();
                }
                KeyCode::Left => self.browser.prev(),
                KeyCode::Right => self.browser.next(),
                KeyCode::Home => self.browser.first(),
                KeyCode::End => self.browser.last(),
                KeyCode::Up => self.browser.cycle_level(false),
                KeyCode::Down => self.browser.cycle_level(true),
                KeyCode::Tab => self.browser.cycle_mode(),
                KeyCode::Backspace => self.browser.pop_char(),
                KeyCode::Char(c) => self.browser.push_char(c),
                _ => {}
            },
        }
        ExitType::Continue
    }
}

fn mission_rng(seed: Option<u64>, mission: u64) -> Box<dyn RngCore> {
    match seed {
        Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed.wrapping_add(mission))),
        None => Box::new(ChaCha8Rng::from_entropy()),
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    // stderr belongs to the TUI
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn open_sink() -> Box<dyn OutcomeSink> {
    match StatsDb::new() {
        Ok(db) => Box::new(SinkWorker::spawn(db)),
        Err(e) => {
            log::warn!("stats disabled: {e}");
            Box::new(NullSink)
        }
    }
}

fn print_history(player: &str, limit: usize) -> Result<(), Box<dyn Error>> {
    let db = StatsDb::new()?;
    let sessions = db.recent_sessions(player, limit)?;
    if sessions.is_empty() {
        println!("no sessions recorded for {player}");
        return Ok(());
    }

    println!("last {} sessions for {player}:", sessions.len());
    for s in &sessions {
        println!(
            "{}  {:<5} {:<8} {:<6} {:>6} pts  {:>3}/{:<3} {:>5.1}%  {:>4}s  {}",
            s.timestamp.format("%Y-%m-%d %H:%M"),
            s.level,
            s.mode,
            s.speed,
            s.score,
            s.successes,
            s.attempts,
            s.accuracy,
            s.duration_secs,
            s.verdict
        );
    }

    let worst: Vec<_> = db
        .kanji_summary(player)?
        .into_iter()
        .filter(|k| k.misses > 0)
        .take(5)
        .collect();
    if !worst.is_empty() {
        println!("\nmost missed:");
        for k in worst {
            println!(
                "  {}  {:>3} misses / {:>3} attempts ({:.0}%)",
                k.character,
                k.misses,
                k.attempts,
                k.miss_rate()
            );
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    init_logging();

    let store = FileConfigStore::new();
    let mut settings = store.load();
    cli.apply(&mut settings);
    if cli.save_config {
        store.save(&settings)?;
        log::info!("settings saved to {}", store.path().display());
    }

    if let Some(limit) = cli.history {
        return print_history(&settings.player, limit);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let catalog = Catalog::embedded()?;
    let clock = MonotonicClock::new();
    let mut app = App::new(settings, catalog, cli.seed, open_sink(), clock.now());
    if cli.learn {
        app.open_learning(clock.now());
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::frame_rate());
    let result = start_tui(&mut terminal, &mut app, &runner, &clock);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // flushes the stats worker before exit
    drop(app);
    result
}

fn start_tui<B: Backend, E: EventSource, T: Ticker, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
    clock: &C,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(clock.now()),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if app.on_key(key, clock.now()) == ExitType::Quit {
                    return Ok(());
                }
            }
        }
    }
}
