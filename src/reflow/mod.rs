//! Word-processor style auto-pagination.
//!
//! Keeps every page's visible text within a character budget: overflow is
//! split at a word boundary and pushed to the following page, and slack is
//! filled by pulling content back from the following page. A run repeats
//! until a full pass changes nothing, so running it twice is a no-op.

pub mod queue;

use crate::html;
use crate::models::Page;
use serde::{Deserialize, Serialize};

pub use queue::{ReflowQueue, ReflowRun};

/// Default character budget per page
pub const DEFAULT_MAX_CHARS: usize = 650;
/// Smallest chunk worth pulling back from the following page
pub const MIN_PULL_CHARS: usize = 50;
/// Minimum number of pages a book keeps
pub const MIN_PAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflowOptions {
    pub max_chars: usize,
    /// Leave page 0 (the cover) out of text reflow
    pub protect_cover: bool,
}

impl Default for ReflowOptions {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            protect_cover: true,
        }
    }
}

impl ReflowOptions {
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    fn first_flowing_page(&self) -> usize {
        usize::from(self.protect_cover)
    }
}

/// What a reflow run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflowReport {
    pub changed: bool,
    pub passes: usize,
    pub splits: usize,
    pub pulls: usize,
    pub merges: usize,
    pub pages_created: usize,
    pub pages_removed: usize,
}

/// Finds where to cut `chars` so the head holds at most `limit` characters.
///
/// Looks for the last whitespace, then the last period, then the last comma
/// inside the final 20% of the window; otherwise cuts exactly at `limit`.
/// Returns the number of characters kept.
pub fn find_cut(chars: &[char], limit: usize) -> usize {
    if chars.len() <= limit {
        return chars.len();
    }
    if limit == 0 {
        return 0;
    }

    let window_start = limit - limit / 5;
    let preferences: [fn(char) -> bool; 3] = [char::is_whitespace, |c| c == '.', |c| c == ','];
    for is_boundary in preferences {
        if let Some(i) = (window_start..limit).rev().find(|&i| is_boundary(chars[i])) {
            return i + 1;
        }
    }
    limit
}

/// Largest boundary-aligned prefix of `chars` fitting in `room`, if at least
/// [`MIN_PULL_CHARS`] long. Word breaks win over periods and commas so a
/// pull never lands inside a token like "Mr.Smith".
fn find_pull(chars: &[char], room: usize) -> Option<usize> {
    let limit = room.min(chars.len());
    if limit < MIN_PULL_CHARS {
        return None;
    }
    let preferences: [fn(char) -> bool; 3] = [char::is_whitespace, |c| c == '.', |c| c == ','];
    preferences.into_iter().find_map(|is_boundary| {
        (MIN_PULL_CHARS - 1..limit)
            .rev()
            .find(|&i| is_boundary(chars[i]))
            .map(|i| i + 1)
    })
}

/// Pages that open something of their own keep their content
fn is_anchor(page: &Page) -> bool {
    page.has_image() || page.has_title()
}

/// Re-paginates `pages` starting at the edited page.
pub fn reflow(pages: &mut Vec<Page>, edited_page: usize, options: &ReflowOptions) -> ReflowReport {
    let mut report = ReflowReport::default();
    let max_passes = pages.len() * 4 + 64;

    loop {
        report.passes += 1;
        let changed = reflow_pass(pages, edited_page, options, &mut report);
        report.changed |= changed;
        if !changed {
            break;
        }
        if report.passes >= max_passes {
            tracing::warn!(
                passes = report.passes,
                pages = pages.len(),
                "reflow did not settle, stopping"
            );
            break;
        }
    }

    if report.changed {
        tracing::debug!(
            edited_page,
            pages = pages.len(),
            splits = report.splits,
            pulls = report.pulls,
            merges = report.merges,
            "reflow settled"
        );
    }
    report
}

/// One pass over the pages; returns whether anything moved.
fn reflow_pass(
    pages: &mut Vec<Page>,
    edited_page: usize,
    options: &ReflowOptions,
    report: &mut ReflowReport,
) -> bool {
    let max = options.max_chars.max(1);
    let mut changed = false;
    let mut i = edited_page.max(options.first_flowing_page());

    while i < pages.len() {
        let len = pages[i].text_len();

        if len > max {
            let chars: Vec<char> = html::plain_text(&pages[i].text).chars().collect();
            let keep = find_cut(&chars, max);
            let (head, tail) = html::split_at_char(&pages[i].text, keep);
            pages[i].text = head;

            if i + 1 < pages.len() {
                let next = &mut pages[i + 1];
                next.text = format!("{}{}", tail, next.text);
            } else {
                let mut next = pages[i].continuation();
                next.text = tail;
                pages.push(next);
                report.pages_created += 1;
            }
            report.splits += 1;
            changed = true;
            i += 1;
            continue;
        }

        if len < max && i + 1 < pages.len() && !is_anchor(&pages[i + 1]) {
            let room = max - len;
            let next_len = pages[i + 1].text_len();
            let same_look = pages[i].background == pages[i + 1].background;

            if next_len > 0 && next_len <= room && same_look && pages.len() > MIN_PAGES {
                let next = pages.remove(i + 1);
                pages[i].text.push_str(&next.text);
                report.merges += 1;
                report.pages_removed += 1;
                changed = true;
                // Page i may now take from its new neighbour
                continue;
            }

            if next_len > room {
                let chars: Vec<char> = html::plain_text(&pages[i + 1].text).chars().collect();
                if let Some(keep) = find_pull(&chars, room) {
                    let (head, tail) = html::split_at_char(&pages[i + 1].text, keep);
                    pages[i].text.push_str(&head);
                    pages[i + 1].text = tail;
                    report.pulls += 1;
                    changed = true;
                }
            }
        }

        i += 1;
    }

    changed |= prune_pages(pages, report);
    changed
}

/// Drops interior pages without text or image, trims surplus trailing blank
/// pages, and pads the book back up to the minimum page count.
fn prune_pages(pages: &mut Vec<Page>, report: &mut ReflowReport) -> bool {
    let mut changed = false;

    // Interior pages only: never the first, never the last
    let mut idx = pages.len().saturating_sub(2);
    while idx >= 1 && pages.len() > MIN_PAGES {
        if pages[idx].is_empty() {
            pages.remove(idx);
            report.pages_removed += 1;
            changed = true;
        }
        idx -= 1;
    }

    // At most one trailing empty page
    while pages.len() > MIN_PAGES {
        let n = pages.len();
        if pages[n - 1].is_blank() && pages[n - 2].is_blank() {
            pages.pop();
            report.pages_removed += 1;
            changed = true;
        } else {
            break;
        }
    }

    while pages.len() < MIN_PAGES {
        pages.push(Page::default());
        report.pages_created += 1;
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Background, ImageSource};
    use crate::models::PageLayout;

    fn cover() -> Page {
        Page::new(PageLayout::Cover)
    }

    fn plain_lengths(pages: &[Page]) -> Vec<usize> {
        pages.iter().map(Page::text_len).collect()
    }

    #[test]
    fn test_find_cut_prefers_whitespace() {
        // window is the last 20% of the limit: indices 12..15
        let chars: Vec<char> = "abcdefghijkl m.pqrst".chars().collect();
        assert_eq!(find_cut(&chars, 15), 13);
        let chars: Vec<char> = "short".chars().collect();
        assert_eq!(find_cut(&chars, 15), 5);
    }

    #[test]
    fn test_find_cut_falls_back_to_period_then_comma() {
        let chars: Vec<char> = "abcdefghijklm.opqrst".chars().collect();
        assert_eq!(find_cut(&chars, 15), 14);
        let chars: Vec<char> = "abcdefghijkl,nopqrst".chars().collect();
        assert_eq!(find_cut(&chars, 15), 13);
        // boundaries before the window do not count
        let chars: Vec<char> = "abc defghijklmnopqrst".chars().collect();
        assert_eq!(find_cut(&chars, 15), 15);
    }

    #[test]
    fn test_find_pull_prefers_word_breaks() {
        let chars: Vec<char> = format!("{} Mr.Smith went home", "a".repeat(55)).chars().collect();
        assert_eq!(find_pull(&chars, 60), Some(56));

        let chars: Vec<char> = format!("{}.{}", "a".repeat(55), "b".repeat(20)).chars().collect();
        assert_eq!(find_pull(&chars, 70), Some(56));

        let chars: Vec<char> = format!("{} {}", "a".repeat(20), "b".repeat(60)).chars().collect();
        assert_eq!(find_pull(&chars, 70), None);
    }

    #[test]
    fn test_overflow_moves_to_next_page_before_existing_text() {
        let mut pages = vec![Page::with_text("A ".repeat(400)), Page::with_text("B ".repeat(100))];
        let options = ReflowOptions {
            protect_cover: false,
            ..ReflowOptions::default()
        };

        let report = reflow(&mut pages, 0, &options);

        assert!(report.changed);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].text_len() <= 650);
        assert!(pages[0].text.chars().all(|c| c == 'A' || c == ' '));
        assert!(pages[1].text.starts_with("A "));
        let first_b = pages[1].text.find('B').unwrap();
        assert!(pages[1].text[..first_b].chars().all(|c| c == 'A' || c == ' '));
        let total_a = pages.iter().map(|p| p.text.matches('A').count()).sum::<usize>();
        assert_eq!(total_a, 400);
    }

    #[test]
    fn test_overflow_creates_page_inheriting_layout() {
        let mut pages = vec![
            cover(),
            Page {
                layout: PageLayout::ImageTop,
                text: "word ".repeat(200),
                ..Page::default()
            },
        ];

        reflow(&mut pages, 1, &ReflowOptions::default());

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].layout, PageLayout::ImageTop);
        assert!(pages[1].text_len() <= DEFAULT_MAX_CHARS);
        assert_eq!(pages[1].text_len() + pages[2].text_len(), 1000);
    }

    #[test]
    fn test_cover_is_left_alone() {
        let long = "x ".repeat(500);
        let mut pages = vec![Page::with_text(long.clone()), Page::with_text("short")];
        reflow(&mut pages, 0, &ReflowOptions::default());
        assert_eq!(pages[0].text, long);
        assert_eq!(pages[1].text, "short");
    }

    #[test]
    fn test_empty_interior_page_is_removed() {
        let mut pages = vec![cover(), Page::with_text(""), Page::with_text("<p>The end.</p>")];
        reflow(&mut pages, 1, &ReflowOptions::default());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "<p>The end.</p>");
    }

    #[test]
    fn test_empty_interior_page_before_illustrated_page() {
        let illustrated = Page {
            text: "Look!".into(),
            image: Some(ImageSource::Remote("https://cdn/fox.png".into())),
            ..Page::default()
        };
        let mut pages = vec![cover(), Page::default(), illustrated.clone()];
        reflow(&mut pages, 1, &ReflowOptions::default());
        assert_eq!(pages, vec![cover(), illustrated]);
    }

    #[test]
    fn test_titled_interior_page_without_text_is_removed() {
        let illustrated = Page {
            text: "Look!".into(),
            image: Some(ImageSource::Remote("https://cdn/fox.png".into())),
            ..Page::default()
        };
        let titled = Page {
            title: "<h2>Chapter</h2>".into(),
            ..Page::default()
        };
        let mut pages = vec![cover(), titled, illustrated.clone()];

        reflow(&mut pages, 1, &ReflowOptions::default());

        assert_eq!(pages, vec![cover(), illustrated]);
    }

    #[test]
    fn test_titled_page_is_not_merged_away() {
        let chapter = Page {
            title: "Chapter Two".into(),
            text: "b".repeat(100),
            ..Page::default()
        };
        let mut pages = vec![cover(), Page::with_text("a".repeat(200)), chapter.clone()];

        let report = reflow(&mut pages, 1, &ReflowOptions::default());

        assert!(!report.changed);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], chapter);
    }

    #[test]
    fn test_page_with_other_background_is_not_merged_away() {
        let night = Page {
            text: "b".repeat(100),
            background: Some(Background::Color("#112244".into())),
            ..Page::default()
        };
        let mut pages = vec![cover(), Page::with_text("a".repeat(200)), night.clone()];

        let report = reflow(&mut pages, 1, &ReflowOptions::default());

        assert_eq!(report.merges, 0);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].background, night.background);
        assert_eq!(pages[2].text_len(), 100);
    }

    #[test]
    fn test_following_page_merges_when_it_fits() {
        let mut pages = vec![cover(), Page::with_text("a".repeat(200)), Page::with_text("b".repeat(300))];
        let report = reflow(&mut pages, 1, &ReflowOptions::default());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, format!("{}{}", "a".repeat(200), "b".repeat(300)));
        assert_eq!(report.merges, 1);
    }

    #[test]
    fn test_pull_moves_only_what_fits() {
        let first = "a ".repeat(150); // 300 chars, 350 free
        let second = "b ".repeat(300); // 600 chars
        let mut pages = vec![cover(), Page::with_text(first), Page::with_text(second)];

        let report = reflow(&mut pages, 1, &ReflowOptions::default());

        assert_eq!(report.pulls, 1);
        assert_eq!(pages.len(), 3);
        assert_eq!(plain_lengths(&pages), vec![0, 650, 250]);
    }

    #[test]
    fn test_small_pull_is_skipped() {
        let first = format!("{} ", "a".repeat(619)); // 620 chars, 30 free
        let second = "b ".repeat(300);
        let mut pages = vec![cover(), Page::with_text(first.clone()), Page::with_text(second.clone())];
        let report = reflow(&mut pages, 1, &ReflowOptions::default());
        assert!(!report.changed);
        assert_eq!(pages[1].text, first);
        assert_eq!(pages[2].text, second);
    }

    #[test]
    fn test_illustrated_page_is_not_drained() {
        let illustrated = Page {
            text: "c ".repeat(50),
            image: Some(ImageSource::Remote("https://cdn/owl.png".into())),
            ..Page::default()
        };
        let mut pages = vec![cover(), Page::with_text("short"), illustrated.clone()];
        reflow(&mut pages, 1, &ReflowOptions::default());
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], illustrated);
    }

    #[test]
    fn test_keeps_minimum_pages() {
        let mut pages = vec![cover()];
        reflow(&mut pages, 0, &ReflowOptions::default());
        assert_eq!(pages.len(), MIN_PAGES);

        let mut pages = Vec::new();
        reflow(&mut pages, 0, &ReflowOptions::default());
        assert_eq!(pages.len(), MIN_PAGES);
    }

    #[test]
    fn test_one_trailing_empty_page_survives() {
        let mut pages = vec![cover(), Page::with_text("story"), Page::default(), Page::default(), Page::default()];
        reflow(&mut pages, 1, &ReflowOptions::default());
        assert_eq!(pages.len(), 3);
        assert!(pages[2].is_blank());
    }

    #[test]
    fn test_reflow_is_idempotent() {
        let texts = [
            "Once upon a time, in a forest far away. ".repeat(40),
            "<p>The fox ran <em>very</em> fast.</p>".repeat(30),
            String::new(),
            "tiny".to_string(),
            "z".repeat(1500),
        ];
        let mut pages = vec![cover()];
        pages.extend(texts.iter().map(|t| Page::with_text(t.clone())));
        let options = ReflowOptions::default().with_max_chars(300);

        reflow(&mut pages, 1, &options);
        let settled = pages.clone();
        let second = reflow(&mut pages, 1, &options);

        assert!(!second.changed);
        assert_eq!(pages, settled);
    }

    #[test]
    fn test_settled_pages_respect_budget() {
        let mut pages = vec![cover(), Page::with_text("Lorem ipsum dolor sit amet, ".repeat(90))];
        let options = ReflowOptions::default().with_max_chars(200);

        reflow(&mut pages, 1, &options);

        assert!(pages.len() >= 3);
        for page in &pages[1..pages.len() - 1] {
            assert!(page.text_len() <= 200);
            assert!(page.text_len() > 0);
        }
        let total: usize = plain_lengths(&pages).iter().sum();
        assert_eq!(total, "Lorem ipsum dolor sit amet, ".len() * 90);
    }

    #[test]
    fn test_split_preserves_markup() {
        let text = format!("<p><strong>{}</strong></p>", "ha ".repeat(300));
        let mut pages = vec![cover(), Page::with_text(text)];

        reflow(&mut pages, 1, &ReflowOptions::default());

        assert!(pages[1].text.starts_with("<p><strong>"));
        assert!(pages[1].text.ends_with("</strong></p>"));
        assert!(pages[2].text.starts_with("<p><strong>"));
        assert_eq!(pages[1].text_len() + pages[2].text_len(), 900);
    }
}
