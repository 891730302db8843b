//! Diff-position resolver.
//!
//! The review-comment API anchors inline comments by a *diff position*: a
//! 1-based counter over every content line of a file's unified diff,
//! continuous across hunk boundaries. A target line suggested by an analysis
//! step may legitimately fall outside any hunk (context far from a change),
//! so an inexact nearest-hunk fallback keeps the comment attached to the
//! right file near the right area instead of failing outright.
//!
//! Robust to hunk-only input (no ---/+++ headers, as in the provider's
//! `patch` field) and to `\ No newline at end of file` marker lines.

use crate::git_providers::CommentSide;

/// Outcome of a position lookup inside one file's patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPosition {
    /// 1-based cumulative diff position the provider expects.
    pub position: u32,
    /// The file line the position actually lands on (equals the target when
    /// `exact`, the nearest hunk's start line otherwise).
    pub actual_line: u32,
    /// False when the nearest-hunk fallback was used.
    pub exact: bool,
}

/// Per-hunk bookkeeping for the fallback search.
struct HunkMark {
    old_start: u32,
    new_start: u32,
    /// Position counter at the hunk's first content line.
    first_position: Option<u32>,
}

/// Resolves `(line, side)` to a diff position inside `patch`.
///
/// Scans line by line keeping running old/new line counters; the first
/// content line whose nature matches the requested side and whose counter
/// equals the target wins. When the whole patch yields no exact match, the
/// hunk whose start line (on the requested side) is numerically closest to
/// the target supplies an inexact anchor. Returns `None` for an empty patch
/// or one without hunks (binary/too-large files).
pub fn resolve_position(patch: &str, line: u32, side: CommentSide) -> Option<ResolvedPosition> {
    if patch.trim().is_empty() {
        return None;
    }

    let mut position = 0u32;
    let mut old_line = 0u32;
    let mut new_line = 0u32;
    let mut in_hunk = false;
    let mut hunks: Vec<HunkMark> = Vec::new();

    for l in patch.lines() {
        if l.starts_with("@@") {
            if let Some((o_start, n_start)) = parse_hunk_header(l) {
                old_line = o_start;
                new_line = n_start;
                in_hunk = true;
                hunks.push(HunkMark {
                    old_start: o_start,
                    new_start: n_start,
                    first_position: None,
                });
            }
            continue;
        }

        // Skip prelude (---/+++ file headers) and marker lines.
        if !in_hunk || l.starts_with('\\') {
            continue;
        }

        position += 1;
        if let Some(h) = hunks.last_mut() {
            if h.first_position.is_none() {
                h.first_position = Some(position);
            }
        }

        if let Some(_rest) = l.strip_prefix('+') {
            if side == CommentSide::Right && new_line == line {
                return Some(ResolvedPosition {
                    position,
                    actual_line: new_line,
                    exact: true,
                });
            }
            new_line += 1;
        } else if let Some(_rest) = l.strip_prefix('-') {
            if side == CommentSide::Left && old_line == line {
                return Some(ResolvedPosition {
                    position,
                    actual_line: old_line,
                    exact: true,
                });
            }
            old_line += 1;
        } else {
            // Context (leading space, or a weird line we treat as context).
            let counter = match side {
                CommentSide::Right => new_line,
                CommentSide::Left => old_line,
            };
            if counter == line {
                return Some(ResolvedPosition {
                    position,
                    actual_line: counter,
                    exact: true,
                });
            }
            old_line += 1;
            new_line += 1;
        }
    }

    // No exact match: nearest hunk by start line on the requested side.
    hunks
        .iter()
        .filter_map(|h| {
            let start = match side {
                CommentSide::Right => h.new_start,
                CommentSide::Left => h.old_start,
            };
            h.first_position.map(|p| (start.abs_diff(line), p, start))
        })
        .min_by_key(|(dist, _, _)| *dist)
        .map(|(_, position, start)| ResolvedPosition {
            position,
            actual_line: start,
            exact: false,
        })
}

/// Parses "@@ -oldStart[,oldLen] +newStart[,newLen] @@ ..." into the two
/// start line numbers.
fn parse_hunk_header(l: &str) -> Option<(u32, u32)> {
    let rest = l.trim_start_matches('@').trim();
    let (old_part, rest) = rest.strip_prefix('-')?.split_once(' ')?;
    let new_part = rest.trim().strip_prefix('+')?;
    Some((leading_number(old_part)?, leading_number(new_part)?))
}

/// Reads the integer before the first ',' / whitespace / '@'.
fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // @@ -10,5 +10,6 @@ with one addition; line 12 is the added line.
    const ONE_ADDITION: &str = "\
@@ -10,5 +10,6 @@ fn demo()
 line ten
 line eleven
+line twelve added
 line twelve old
 line thirteen
 line fourteen";

    #[test]
    fn exact_match_on_added_line_right_side() {
        let got = resolve_position(ONE_ADDITION, 12, CommentSide::Right).unwrap();
        // Content lines: ctx(10)=1, ctx(11)=2, add(12)=3.
        assert_eq!(got.position, 3);
        assert_eq!(got.actual_line, 12);
        assert!(got.exact);
    }

    #[test]
    fn exact_match_on_context_left_side() {
        let got = resolve_position(ONE_ADDITION, 11, CommentSide::Left).unwrap();
        assert_eq!(got.position, 2);
        assert_eq!(got.actual_line, 11);
        assert!(got.exact);
    }

    #[test]
    fn far_target_falls_back_to_nearest_hunk_start() {
        let got = resolve_position(ONE_ADDITION, 500, CommentSide::Right).unwrap();
        assert!(!got.exact);
        assert_eq!(got.actual_line, 10);
        assert_eq!(got.position, 1);
    }

    #[test]
    fn deletion_matches_left_only() {
        let patch = "\
@@ -3,3 +3,2 @@
 keep
-dropped
 keep too";
        let left = resolve_position(patch, 4, CommentSide::Left).unwrap();
        assert_eq!(left.position, 2);
        assert_eq!(left.actual_line, 4);
        assert!(left.exact);

        // On the right side line 4 is "keep too" (context), matched via the
        // new-line counter.
        let right = resolve_position(patch, 4, CommentSide::Right).unwrap();
        assert_eq!(right.position, 3);
        assert!(right.exact);
    }

    #[test]
    fn position_counter_is_continuous_across_hunks() {
        let patch = "\
@@ -1,2 +1,2 @@
 a
-b
@@ -10,2 +10,3 @@
 j
+k added
 l";
        // Hunk 1 contributes positions 1..=2; hunk 2 starts at position 3.
        let got = resolve_position(patch, 11, CommentSide::Right).unwrap();
        assert_eq!(got.position, 4);
        assert_eq!(got.actual_line, 11);
        assert!(got.exact);
    }

    #[test]
    fn fallback_picks_numerically_closest_hunk() {
        let patch = "\
@@ -1,1 +1,1 @@
-a
@@ -100,1 +100,2 @@
 x
+y";
        let got = resolve_position(patch, 90, CommentSide::Right).unwrap();
        assert!(!got.exact);
        assert_eq!(got.actual_line, 100);
        assert_eq!(got.position, 2);
    }

    #[test]
    fn first_match_wins_and_headers_are_skipped() {
        let patch = "\
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 one
-two
+two prime
 three";
        let got = resolve_position(patch, 1, CommentSide::Right).unwrap();
        assert_eq!(got.position, 1);
        assert!(got.exact);
    }

    #[test]
    fn empty_or_hunkless_patch_is_not_resolvable() {
        assert!(resolve_position("", 1, CommentSide::Right).is_none());
        assert!(resolve_position("Binary files differ", 1, CommentSide::Right).is_none());
    }

    #[test]
    fn no_newline_marker_does_not_consume_a_position() {
        let patch = "\
@@ -1,2 +1,2 @@
 a
-b
\\ No newline at end of file
+c";
        let got = resolve_position(patch, 2, CommentSide::Right).unwrap();
        assert_eq!(got.position, 3);
        assert_eq!(got.actual_line, 2);
        assert!(got.exact);
    }
}
