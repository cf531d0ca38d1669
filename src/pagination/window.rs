//! Page-button window computation
//!
//! Turns (page, last) into the sequence of controls shown under a table:
//!
//! ```text
//! «  1  •••  10 11 12 13 [14] 15 16 17 18 19  20  »
//! ```
//!
//! The function is pure. It never mutates pagination state; a page beyond
//! `last` is clamped for display only.

/// Tunables for the window shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    /// Maximum number of contiguous page buttons in the middle block
    pub max_middle: u32,
    /// Show the leading ellipsis once the page is past this number
    pub early_ellipsis_threshold: u32,
    /// Show the trailing ellipsis when more than this many pages follow
    pub late_ellipsis_gap: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            max_middle: 10,
            early_ellipsis_threshold: 7,
            late_ellipsis_gap: 10,
        }
    }
}

/// Inclusive bounds of the middle block plus the total page count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: u32,
    pub end: u32,
    pub last: u32,
}

/// One control in the pagination bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageButton {
    /// « button; disabled on the first page
    Previous { target: u32, enabled: bool },
    /// A numbered page; `active` marks the current page
    Page { index: u32, active: bool },
    /// Non-interactive filler between the edge buttons and the middle block
    Ellipsis,
    /// » button; disabled on the last page
    Next { target: u32, enabled: bool },
}

impl PageButton {
    /// Page this button navigates to, if it is interactive
    pub fn target(&self) -> Option<u32> {
        match *self {
            PageButton::Previous { target, enabled } | PageButton::Next { target, enabled } => {
                enabled.then_some(target)
            }
            PageButton::Page { index, active } => (!active).then_some(index),
            PageButton::Ellipsis => None,
        }
    }
}

/// Rendered pagination bar
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationControl {
    pub buttons: Vec<PageButton>,
    pub window: Option<PageWindow>,
}

impl PaginationControl {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Index of the active page button
    pub fn active_page(&self) -> Option<u32> {
        self.buttons.iter().find_map(|b| match *b {
            PageButton::Page { index, active: true } => Some(index),
            _ => None,
        })
    }

    /// Numbered page indices in display order
    pub fn page_indices(&self) -> Vec<u32> {
        self.buttons
            .iter()
            .filter_map(|b| match *b {
                PageButton::Page { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Target of the « button when enabled
    pub fn previous_target(&self) -> Option<u32> {
        self.buttons.iter().find_map(|b| match b {
            PageButton::Previous { .. } => b.target(),
            _ => None,
        })
    }

    /// Target of the » button when enabled
    pub fn next_target(&self) -> Option<u32> {
        self.buttons.iter().find_map(|b| match b {
            PageButton::Next { .. } => b.target(),
            _ => None,
        })
    }

    pub fn last_page(&self) -> Option<u32> {
        self.window.map(|w| w.last)
    }
}

/// Compute the pagination bar for `page` out of `last` pages
pub fn compute_window(page: u32, last: u32, settings: &WindowSettings) -> PaginationControl {
    if last <= 1 {
        return PaginationControl::empty();
    }

    let current = page.clamp(1, last);
    let span = settings.max_middle.max(1);

    let mut start = current.saturating_sub(span / 2).max(1);
    let end = start.saturating_add(span - 1).min(last);
    if end - start + 1 < span {
        start = (end + 1).saturating_sub(span).max(1);
    }

    let middle: Vec<u32> = (start..=end).collect();
    build(current, last, &middle, settings)
}

/// Compute the pagination bar from server-supplied neighbour pages
///
/// Paged responses may carry `left`/`right` lists of page numbers around
/// the current page. The middle block is exactly those pages plus the
/// current one: out-of-range and duplicate entries are dropped, gaps are
/// kept, and the block is capped at `max_middle` buttons nearest the
/// current page. Without any usable neighbours this falls back to
/// [`compute_window`].
pub fn compute_window_with_neighbors(
    page: u32,
    last: u32,
    left: &[u32],
    right: &[u32],
    settings: &WindowSettings,
) -> PaginationControl {
    if last <= 1 {
        return PaginationControl::empty();
    }

    let current = page.clamp(1, last);
    let mut middle: Vec<u32> = left
        .iter()
        .chain(right)
        .copied()
        .filter(|p| (1..=last).contains(p) && *p != current)
        .collect();
    if middle.is_empty() {
        return compute_window(page, last, settings);
    }

    middle.push(current);
    middle.sort_unstable();
    middle.dedup();

    // Drop whichever end lies further from the current page until it fits
    let span = settings.max_middle.max(1) as usize;
    while middle.len() > span {
        let first = middle[0];
        let final_page = middle[middle.len() - 1];
        if current - first >= final_page - current {
            middle.remove(0);
        } else {
            middle.pop();
        }
    }

    build(current, last, &middle, settings)
}

/// Assemble the bar around `middle`, a sorted block containing `current`
fn build(
    current: u32,
    last: u32,
    middle: &[u32],
    settings: &WindowSettings,
) -> PaginationControl {
    let start = middle.first().copied().unwrap_or(current);
    let end = middle.last().copied().unwrap_or(current);
    let window = PageWindow { start, end, last };
    let mut buttons = Vec::with_capacity(middle.len() + 6);

    buttons.push(if current == 1 {
        PageButton::Previous {
            target: start,
            enabled: false,
        }
    } else {
        PageButton::Previous {
            target: current - 1,
            enabled: true,
        }
    });

    if start > 1 {
        buttons.push(PageButton::Page {
            index: 1,
            active: false,
        });
        if current > settings.early_ellipsis_threshold {
            buttons.push(PageButton::Ellipsis);
        }
    }

    for &index in middle {
        buttons.push(PageButton::Page {
            index,
            active: index == current,
        });
    }

    if end < last {
        if last - current > settings.late_ellipsis_gap {
            buttons.push(PageButton::Ellipsis);
        }
        buttons.push(PageButton::Page {
            index: last,
            active: false,
        });
    }

    // current == last also covers current == end == last: the page is shown
    // once as active and » is disabled.
    buttons.push(if current >= last {
        PageButton::Next {
            target: end,
            enabled: false,
        }
    } else {
        PageButton::Next {
            target: current + 1,
            enabled: true,
        }
    });

    PaginationControl {
        buttons,
        window: Some(window),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn window(page: u32, last: u32) -> PaginationControl {
        compute_window(page, last, &WindowSettings::default())
    }

    #[test]
    fn test_single_page_renders_nothing() {
        for last in 0..=1 {
            for page in 0..5 {
                assert!(window(page, last).is_empty(), "page={page} last={last}");
            }
        }
    }

    #[test]
    fn test_first_page_of_twenty() {
        let control = window(1, 20);

        assert_eq!(
            control.buttons.first(),
            Some(&PageButton::Previous {
                target: 1,
                enabled: false
            })
        );

        let mut expected: Vec<u32> = (1..=10).collect();
        expected.push(20);
        assert_eq!(control.page_indices(), expected);
        assert_eq!(control.active_page(), Some(1));

        // Ellipsis sits between 10 and 20
        let ellipsis_at = control
            .buttons
            .iter()
            .position(|b| *b == PageButton::Ellipsis)
            .expect("trailing ellipsis");
        assert_eq!(
            control.buttons[ellipsis_at - 1],
            PageButton::Page {
                index: 10,
                active: false
            }
        );
        assert_eq!(
            control.buttons[ellipsis_at + 1],
            PageButton::Page {
                index: 20,
                active: false
            }
        );
        assert_eq!(control.next_target(), Some(2));
    }

    #[test]
    fn test_page_fifteen_of_twenty() {
        let control = window(15, 20);

        assert_eq!(control.previous_target(), Some(14));
        assert_eq!(
            &control.buttons[1..3],
            &[
                PageButton::Page {
                    index: 1,
                    active: false
                },
                PageButton::Ellipsis
            ]
        );

        let w = control.window.unwrap();
        assert!(w.start <= 15 && 15 <= w.end);
        assert_eq!(w.end - w.start + 1, 10);
        assert_eq!(control.active_page(), Some(15));

        // Only 5 pages follow, so no trailing ellipsis; last button still shown
        let trailing_ellipses = control
            .buttons
            .iter()
            .skip(3)
            .filter(|b| **b == PageButton::Ellipsis)
            .count();
        assert_eq!(trailing_ellipses, 0);
        assert_eq!(control.page_indices().last(), Some(&20));
        assert_eq!(control.next_target(), Some(16));
    }

    #[test]
    fn test_last_page_shown_once_and_next_disabled() {
        let control = window(20, 20);

        let indices = control.page_indices();
        assert_eq!(indices.iter().filter(|&&i| i == 20).count(), 1);
        assert_eq!(control.active_page(), Some(20));
        assert_eq!(
            control.buttons.last(),
            Some(&PageButton::Next {
                target: 20,
                enabled: false
            })
        );
        assert_eq!(control.next_target(), None);
    }

    #[test]
    fn test_page_beyond_last_is_clamped_for_display() {
        let control = window(99, 20);
        assert_eq!(control.active_page(), Some(20));
        assert_eq!(control.next_target(), None);
        assert_eq!(control.previous_target(), Some(19));
    }

    #[test]
    fn test_page_zero_is_treated_as_first() {
        let control = window(0, 5);
        assert_eq!(control.active_page(), Some(1));
        assert_eq!(control.previous_target(), None);
    }

    #[test]
    fn test_exactly_one_active_and_it_matches_page() {
        for last in 2..=40 {
            for page in 2..=last {
                let control = window(page, last);
                let active: Vec<_> = control
                    .buttons
                    .iter()
                    .filter(|b| matches!(b, PageButton::Page { active: true, .. }))
                    .collect();
                assert_eq!(active.len(), 1, "page={page} last={last}");
                assert_eq!(control.active_page(), Some(page));
            }
        }
    }

    #[test]
    fn test_no_index_rendered_twice() {
        for last in 0..=40 {
            for page in 0..=last + 2 {
                let indices = window(page, last).page_indices();
                let unique: HashSet<_> = indices.iter().collect();
                assert_eq!(unique.len(), indices.len(), "page={page} last={last}");
            }
        }
    }

    #[test]
    fn test_small_page_count_has_no_edges() {
        let control = window(3, 4);
        assert_eq!(control.page_indices(), vec![1, 2, 3, 4]);
        assert!(!control.buttons.contains(&PageButton::Ellipsis));
    }

    #[test]
    fn test_early_ellipsis_needs_page_past_threshold() {
        let settings = WindowSettings {
            max_middle: 3,
            ..Default::default()
        };
        // Window starts at 5 (>1) but page 6 is not past the threshold of 7
        let control = compute_window(6, 30, &settings);
        assert_eq!(
            &control.buttons[1..3],
            &[
                PageButton::Page {
                    index: 1,
                    active: false
                },
                PageButton::Page {
                    index: 5,
                    active: false
                }
            ]
        );

        let control = compute_window(8, 30, &settings);
        assert_eq!(control.buttons[2], PageButton::Ellipsis);
    }

    #[test]
    fn test_deterministic() {
        let settings = WindowSettings::default();
        assert_eq!(
            compute_window(12, 50, &settings),
            compute_window(12, 50, &settings)
        );
    }

    #[test]
    fn test_server_neighbours_define_middle_block() {
        let settings = WindowSettings::default();
        let control = compute_window_with_neighbors(5, 20, &[3, 4], &[6, 7], &settings);

        assert_eq!(control.page_indices(), vec![1, 3, 4, 5, 6, 7, 20]);
        assert_eq!(control.active_page(), Some(5));
    }

    #[test]
    fn test_server_neighbours_are_capped_and_filtered() {
        let settings = WindowSettings {
            max_middle: 5,
            ..Default::default()
        };
        let left: Vec<u32> = (1..10).collect();
        let right: Vec<u32> = (11..40).collect();
        let control = compute_window_with_neighbors(10, 20, &left, &right, &settings);

        let w = control.window.unwrap();
        assert_eq!(w.end - w.start + 1, 5);
        assert!(w.start <= 10 && 10 <= w.end);
        assert!(w.end <= 20);
    }

    #[test]
    fn test_server_neighbours_keep_their_gaps() {
        let settings = WindowSettings::default();
        let control = compute_window_with_neighbors(5, 20, &[1, 3, 3, 0], &[8, 25], &settings);

        assert_eq!(control.page_indices(), vec![1, 3, 5, 8, 20]);
        assert_eq!(control.active_page(), Some(5));
        assert_eq!(control.previous_target(), Some(4));
    }

    #[test]
    fn test_server_neighbours_cap_drops_furthest() {
        let settings = WindowSettings {
            max_middle: 3,
            ..Default::default()
        };
        let control = compute_window_with_neighbors(10, 30, &[2, 9], &[12, 20], &settings);

        assert_eq!(control.page_indices(), vec![1, 9, 10, 12, 30]);
    }

    #[test]
    fn test_server_neighbours_missing_falls_back() {
        let settings = WindowSettings::default();
        assert_eq!(
            compute_window_with_neighbors(4, 9, &[], &[], &settings),
            compute_window(4, 9, &settings)
        );
    }
}
