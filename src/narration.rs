//! Narration word highlighting.
//!
//! `NarrationScheduler` is a clock-free state machine: callers feed it
//! elapsed time and get back the events that fell due. `NarrationPlayer`
//! drives one on a tokio task for live playback.

use std::ops::Range;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::WordTiming;

/// Word interval at 1x speed
pub const BASE_WORD_INTERVAL: Duration = Duration::from_millis(500);
/// Pause between the last word and the automatic page turn
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(1000);

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum NarrationEvent {
    WordChanged(usize),
    Completed,
    AdvancePage,
}

/// Highlighted word split out of a page's plain text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight<'a> {
    pub before: &'a str,
    pub word: &'a str,
    pub after: &'a str,
}

/// Byte range of a word entry inside `plain`.
///
/// Offsets up to 1.0 are read as fractions of the text length; larger
/// offsets are read as character positions.
pub fn highlight_range(plain: &str, entry: &WordTiming) -> Option<Range<usize>> {
    let total = plain.chars().count();
    if total == 0 || !entry.start.is_finite() || !entry.end.is_finite() {
        return None;
    }

    let fractional = entry.end <= 1.0;
    let to_char = |offset: f64| -> usize {
        let pos = if fractional { offset * total as f64 } else { offset };
        pos.round().clamp(0.0, total as f64) as usize
    };

    let start = to_char(entry.start);
    let end = to_char(entry.end);
    if end <= start {
        return None;
    }

    let byte_at = |char_idx: usize| {
        plain
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(plain.len())
    };
    Some(byte_at(start)..byte_at(end))
}

pub fn highlight<'a>(plain: &'a str, entry: &WordTiming) -> Option<Highlight<'a>> {
    let range = highlight_range(plain, entry)?;
    Some(Highlight {
        before: &plain[..range.start],
        word: &plain[range.clone()],
        after: &plain[range.end..],
    })
}

#[derive(Debug, Clone)]
pub struct NarrationScheduler {
    words: Vec<WordTiming>,
    speed: f32,
    auto_advance: bool,
    state: PlaybackState,
    current_word: Option<usize>,
    since_step: Duration,
    advance_in: Option<Duration>,
    book_id: Option<i64>,
    page_index: usize,
}

impl NarrationScheduler {
    pub fn new(words: Vec<WordTiming>) -> Self {
        Self {
            words,
            speed: 1.0,
            auto_advance: false,
            state: PlaybackState::Idle,
            current_word: None,
            since_step: Duration::ZERO,
            advance_in: None,
            book_id: None,
            page_index: 0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.set_speed(speed);
        self
    }

    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.auto_advance = enabled;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Index of the highlighted word, if any
    pub fn current_word(&self) -> Option<usize> {
        self.current_word
    }

    /// Highlighted word index in the reader's convention (-1 for none)
    pub fn current_word_index(&self) -> i64 {
        self.current_word.map(|i| i as i64).unwrap_or(-1)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
        if !enabled {
            self.advance_in = None;
        }
    }

    pub fn interval(&self) -> Duration {
        BASE_WORD_INTERVAL.div_f32(self.speed)
    }

    /// Starts or stops playback
    pub fn toggle(&mut self) -> PlaybackState {
        self.advance_in = None;
        self.since_step = Duration::ZERO;

        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Idle,
            PlaybackState::Idle if self.words.is_empty() => PlaybackState::Idle,
            PlaybackState::Idle => {
                if self.current_word == Some(self.words.len() - 1) {
                    self.current_word = None;
                }
                PlaybackState::Playing
            }
        };
        self.state
    }

    /// Switches to another page (or book); playback stops and the highlight
    /// resets when the page identity changes.
    pub fn set_page(&mut self, book_id: Option<i64>, page_index: usize, words: Vec<WordTiming>) {
        if self.book_id == book_id && self.page_index == page_index {
            self.words = words;
            return;
        }
        self.book_id = book_id;
        self.page_index = page_index;
        self.words = words;
        self.reset();
    }

    /// Back to idle with nothing highlighted and no pending timers
    pub fn reset(&mut self) {
        self.state = PlaybackState::Idle;
        self.current_word = None;
        self.since_step = Duration::ZERO;
        self.advance_in = None;
    }

    /// Time until the next event falls due, if any is pending
    pub fn next_deadline(&self) -> Option<Duration> {
        match self.state {
            PlaybackState::Playing => Some(self.interval().saturating_sub(self.since_step)),
            PlaybackState::Idle => self.advance_in,
        }
    }

    /// Feeds elapsed time and returns the events that fell due, in order.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<NarrationEvent> {
        let mut events = Vec::new();
        let mut remaining = elapsed;

        if self.is_playing() {
            self.since_step += remaining;
            remaining = Duration::ZERO;

            let interval = self.interval();
            while self.is_playing() && self.since_step >= interval {
                self.since_step -= interval;
                let next = self.current_word.map_or(0, |i| i + 1);
                if next < self.words.len() {
                    self.current_word = Some(next);
                    events.push(NarrationEvent::WordChanged(next));
                } else {
                    self.state = PlaybackState::Idle;
                    events.push(NarrationEvent::Completed);
                    if self.auto_advance {
                        self.advance_in = Some(AUTO_ADVANCE_DELAY);
                    }
                    remaining = self.since_step;
                    self.since_step = Duration::ZERO;
                }
            }
        }

        if let Some(left) = self.advance_in {
            if remaining >= left {
                self.advance_in = None;
                events.push(NarrationEvent::AdvancePage);
            } else {
                self.advance_in = Some(left - remaining);
            }
        }

        events
    }

    /// Current highlight over the page's plain text
    pub fn highlight<'a>(&self, plain: &'a str) -> Option<Highlight<'a>> {
        let entry = self.words.get(self.current_word?)?;
        highlight(plain, entry)
    }
}

enum PlayerCommand {
    Toggle,
    SetPage {
        book_id: Option<i64>,
        page_index: usize,
        words: Vec<WordTiming>,
    },
    SetSpeed(f32),
}

/// Live playback of a scheduler on a tokio task; dropping the player stops it.
pub struct NarrationPlayer {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    task: JoinHandle<()>,
}

impl NarrationPlayer {
    pub fn spawn(scheduler: NarrationScheduler, events: mpsc::UnboundedSender<NarrationEvent>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(scheduler, rx, events));
        Self { commands, task }
    }

    pub fn toggle(&self) {
        let _ = self.commands.send(PlayerCommand::Toggle);
    }

    pub fn set_page(&self, book_id: Option<i64>, page_index: usize, words: Vec<WordTiming>) {
        let _ = self.commands.send(PlayerCommand::SetPage {
            book_id,
            page_index,
            words,
        });
    }

    pub fn set_speed(&self, speed: f32) {
        let _ = self.commands.send(PlayerCommand::SetSpeed(speed));
    }
}

impl Drop for NarrationPlayer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    mut scheduler: NarrationScheduler,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
    events: mpsc::UnboundedSender<NarrationEvent>,
) {
    let mut last = Instant::now();

    loop {
        let wake_at = scheduler.next_deadline().map(|d| last + d);
        let wake = async move {
            match wake_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let now = Instant::now();
                let due = scheduler.tick(now - last);
                last = now;
                if !publish(&events, due) {
                    break;
                }
                match command {
                    PlayerCommand::Toggle => {
                        let state = scheduler.toggle();
                        tracing::debug!(?state, "narration toggled");
                    }
                    PlayerCommand::SetPage { book_id, page_index, words } => {
                        scheduler.set_page(book_id, page_index, words);
                    }
                    PlayerCommand::SetSpeed(speed) => scheduler.set_speed(speed),
                }
            }
            _ = wake => {
                let now = Instant::now();
                let due = scheduler.tick(now - last);
                last = now;
                if !publish(&events, due) {
                    break;
                }
            }
        }
    }
}

fn publish(events: &mpsc::UnboundedSender<NarrationEvent>, due: Vec<NarrationEvent>) -> bool {
    due.into_iter().all(|event| events.send(event).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<WordTiming> {
        (0..n)
            .map(|i| WordTiming {
                text: format!("w{}", i),
                start: i as f64 / n as f64,
                end: (i + 1) as f64 / n as f64,
            })
            .collect()
    }

    #[test]
    fn test_advances_one_word_per_interval() {
        let mut s = NarrationScheduler::new(words(3));
        assert_eq!(s.current_word_index(), -1);
        assert_eq!(s.toggle(), PlaybackState::Playing);

        assert!(s.tick(Duration::from_millis(499)).is_empty());
        assert_eq!(s.tick(Duration::from_millis(1)), vec![NarrationEvent::WordChanged(0)]);
        assert_eq!(
            s.tick(Duration::from_millis(1000)),
            vec![NarrationEvent::WordChanged(1), NarrationEvent::WordChanged(2)]
        );
        assert_eq!(s.current_word(), Some(2));
    }

    #[test]
    fn test_speed_shortens_interval() {
        let s = NarrationScheduler::new(words(2)).with_speed(2.0);
        assert_eq!(s.interval(), Duration::from_millis(250));
        let s = NarrationScheduler::new(words(2)).with_speed(100.0);
        assert_eq!(s.speed(), 4.0);
        let s = NarrationScheduler::new(words(2)).with_speed(f32::NAN);
        assert_eq!(s.speed(), 1.0);
    }

    #[test]
    fn test_completion_fires_single_auto_advance() {
        let mut s = NarrationScheduler::new(words(2)).with_auto_advance(true);
        s.toggle();

        let mut all = s.tick(Duration::from_millis(1500));
        assert_eq!(
            all,
            vec![
                NarrationEvent::WordChanged(0),
                NarrationEvent::WordChanged(1),
                NarrationEvent::Completed
            ]
        );
        assert_eq!(s.state(), PlaybackState::Idle);
        assert_eq!(s.next_deadline(), Some(AUTO_ADVANCE_DELAY));

        all = s.tick(Duration::from_millis(999));
        assert!(all.is_empty());
        assert_eq!(s.tick(Duration::from_millis(1)), vec![NarrationEvent::AdvancePage]);
        assert!(s.tick(Duration::from_secs(10)).is_empty());
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn test_no_auto_advance_when_disabled() {
        let mut s = NarrationScheduler::new(words(1));
        s.toggle();
        let events = s.tick(Duration::from_secs(5));
        assert_eq!(events, vec![NarrationEvent::WordChanged(0), NarrationEvent::Completed]);
    }

    #[test]
    fn test_toggle_cancels_pending_advance() {
        let mut s = NarrationScheduler::new(words(1)).with_auto_advance(true);
        s.toggle();
        s.tick(Duration::from_millis(1000));
        // Half a second already elapsed past completion
        assert_eq!(s.next_deadline(), Some(Duration::from_millis(500)));

        // Replays from the start
        assert_eq!(s.toggle(), PlaybackState::Playing);
        assert_eq!(s.current_word(), None);
        assert_eq!(s.tick(Duration::from_millis(500)), vec![NarrationEvent::WordChanged(0)]);
    }

    #[test]
    fn test_page_change_resets() {
        let mut s = NarrationScheduler::new(words(4));
        s.set_page(Some(7), 1, words(4));
        s.toggle();
        s.tick(Duration::from_millis(1000));
        assert_eq!(s.current_word(), Some(1));

        s.set_page(Some(7), 1, words(4));
        assert!(s.is_playing());

        s.set_page(Some(7), 2, words(5));
        assert!(!s.is_playing());
        assert_eq!(s.current_word_index(), -1);

        s.toggle();
        s.tick(Duration::from_millis(500));
        s.set_page(Some(8), 2, words(5));
        assert_eq!(s.current_word_index(), -1);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn test_empty_page_never_plays() {
        let mut s = NarrationScheduler::new(Vec::new());
        assert_eq!(s.toggle(), PlaybackState::Idle);
        assert!(s.tick(Duration::from_secs(3)).is_empty());
    }

    #[test]
    fn test_highlight_fractional_offsets() {
        let plain = "The cat sat";
        let entry = WordTiming {
            text: "cat".into(),
            start: 4.0 / 11.0,
            end: 7.0 / 11.0,
        };
        let h = highlight(plain, &entry).unwrap();
        assert_eq!(h.before, "The ");
        assert_eq!(h.word, "cat");
        assert_eq!(h.after, " sat");
    }

    #[test]
    fn test_highlight_character_offsets_and_unicode() {
        let plain = "Él corrió rápido";
        let entry = WordTiming {
            text: "corrió".into(),
            start: 3.0,
            end: 9.0,
        };
        assert_eq!(highlight(plain, &entry).unwrap().word, "corrió");

        let empty = WordTiming {
            text: String::new(),
            start: 0.5,
            end: 0.5,
        };
        assert!(highlight(plain, &empty).is_none());
        assert!(highlight("", &entry).is_none());
    }

    #[test]
    fn test_scheduler_highlight_follows_current_word() {
        let mut s = NarrationScheduler::new(vec![
            WordTiming { text: "Hi".into(), start: 0.0, end: 2.0 / 9.0 },
            WordTiming { text: "there".into(), start: 3.0 / 9.0, end: 8.0 / 9.0 },
        ]);
        assert!(s.highlight("Hi there!").is_none());
        s.toggle();
        s.tick(Duration::from_millis(1000));
        assert_eq!(s.highlight("Hi there!").unwrap().word, "there");
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_emits_words_then_one_page_turn() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player = NarrationPlayer::spawn(
            NarrationScheduler::new(words(3)).with_auto_advance(true),
            tx,
        );
        let started = Instant::now();
        player.toggle();

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push((event, started.elapsed().as_millis()));
            if event == NarrationEvent::AdvancePage {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                (NarrationEvent::WordChanged(0), 500),
                (NarrationEvent::WordChanged(1), 1000),
                (NarrationEvent::WordChanged(2), 1500),
                (NarrationEvent::Completed, 2000),
                (NarrationEvent::AdvancePage, 3000),
            ]
        );

        let extra = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(extra.is_err());
        drop(player);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_stops_on_page_change() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player = NarrationPlayer::spawn(NarrationScheduler::new(words(10)), tx);
        player.toggle();

        assert_eq!(rx.recv().await, Some(NarrationEvent::WordChanged(0)));
        player.set_page(None, 3, words(2));

        let extra = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(extra.is_err());
    }
}
