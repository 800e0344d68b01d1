// Copyright 2025 Querex Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keyword snippets
//!
//! A [`Snippet`] finds keyword occurrences in a text, picks the windows of
//! `width` characters that contain the most distinct keywords and renders
//! them with every occurrence wrapped in a [`TagPair`].
//!
//! Tags are assigned per distinct keyword in order of first occurrence in
//! the text: the first keyword seen uses tag 0, the next tag 1, wrapping
//! around the tag list.
//!
//! ```
//! use querex::snippet::{Snippet, SnippetOptions, TagPair};
//!
//! let tags = vec![TagPair::new("<b>", "</b>")];
//! let snippet = Snippet::new(["groonga"], tags, SnippetOptions::default()).unwrap();
//! assert_eq!(snippet.execute("I use Groonga"), vec!["I use <b>Groonga</b>"]);
//! ```

use std::fmt::Write as _;

use crate::core::{Error, Result};

/// Default characters per fragment
pub const DEFAULT_WIDTH: usize = 100;

/// Default number of fragments
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Markup placed around one keyword occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPair {
    pub open: String,
    pub close: String,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Build tag pairs from loosely shaped entries; each must have two items
    pub fn from_entries<S: AsRef<str>>(entries: &[Vec<S>]) -> Result<Vec<TagPair>> {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry.as_slice() {
                [open, close] => Ok(TagPair::new(open.as_ref(), close.as_ref())),
                other => Err(Error::invalid_argument(format!(
                    "tag #{} must be an [open, close] pair, got {} item(s)",
                    i,
                    other.len()
                ))),
            })
            .collect()
    }
}

impl<O: Into<String>, C: Into<String>> From<(O, C)> for TagPair {
    fn from((open, close): (O, C)) -> Self {
        TagPair::new(open, close)
    }
}

/// How snippets are cut and rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetOptions {
    /// Fold case of text and keywords before matching
    pub normalize: bool,
    /// Drop whitespace at the start of each fragment
    pub skip_leading_spaces: bool,
    /// Characters per fragment (default 100)
    pub width: usize,
    /// Maximum number of fragments (default 3)
    pub max_results: usize,
    /// Escape `< > & "` in document text
    pub html_escape: bool,
}

impl Default for SnippetOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            skip_leading_spaces: false,
            width: DEFAULT_WIDTH,
            max_results: DEFAULT_MAX_RESULTS,
            html_escape: false,
        }
    }
}

impl SnippetOptions {
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_skip_leading_spaces(mut self, skip: bool) -> Self {
        self.skip_leading_spaces = skip;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_html_escape(mut self, html_escape: bool) -> Self {
        self.html_escape = html_escape;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(Error::invalid_argument("snippet width must be positive"));
        }
        if self.max_results == 0 {
            return Err(Error::invalid_argument(
                "snippet max_results must be positive",
            ));
        }
        Ok(())
    }
}

/// A keyword occurrence, in character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurrence {
    start: usize,
    end: usize,
    keyword: usize,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: usize,
    end: usize,
    score: usize,
}

impl Window {
    fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A reusable snippet extractor for a fixed keyword set
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Keywords as matched (folded when normalizing)
    keywords: Vec<Vec<char>>,
    tags: Vec<TagPair>,
    options: SnippetOptions,
}

impl Snippet {
    pub fn new<I, K>(keywords: I, tags: Vec<TagPair>, options: SnippetOptions) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        if tags.is_empty() {
            return Err(Error::EmptyTagList);
        }
        options.validate()?;

        let mut folded: Vec<Vec<char>> = Vec::new();
        for keyword in keywords {
            let chars: Vec<char> = if options.normalize {
                keyword.as_ref().chars().map(fold_char).collect()
            } else {
                keyword.as_ref().chars().collect()
            };
            if !chars.is_empty() && !folded.contains(&chars) {
                folded.push(chars);
            }
        }

        Ok(Self {
            keywords: folded,
            tags,
            options,
        })
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn options(&self) -> &SnippetOptions {
        &self.options
    }

    /// Render the best fragments of `text`; empty when nothing matches
    pub fn execute(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let occurrences = self.find_occurrences(&chars);
        if occurrences.is_empty() {
            return Vec::new();
        }

        // Distinct keywords ranked by first occurrence
        let mut ranks: Vec<Option<usize>> = vec![None; self.keywords.len()];
        let mut next_rank = 0;
        for occurrence in &occurrences {
            if ranks[occurrence.keyword].is_none() {
                ranks[occurrence.keyword] = Some(next_rank);
                next_rank += 1;
            }
        }

        let windows = self.select_windows(chars.len(), &occurrences);
        tracing::trace!(
            occurrences = occurrences.len(),
            fragments = windows.len(),
            "snippet windows"
        );

        windows
            .iter()
            .map(|window| self.render(&chars, window, &occurrences, &ranks))
            .collect()
    }

    /// Non-overlapping occurrences; at each position the longest keyword wins
    fn find_occurrences(&self, chars: &[char]) -> Vec<Occurrence> {
        let haystack: Vec<char> = if self.options.normalize {
            chars.iter().copied().map(fold_char).collect()
        } else {
            chars.to_vec()
        };

        let mut occurrences = Vec::new();
        let mut i = 0;
        while i < haystack.len() {
            let best = self
                .keywords
                .iter()
                .enumerate()
                .filter(|(_, keyword)| haystack[i..].starts_with(keyword))
                .max_by_key(|(index, keyword)| (keyword.len(), std::cmp::Reverse(*index)));
            match best {
                Some((keyword, chars)) => {
                    occurrences.push(Occurrence {
                        start: i,
                        end: i + chars.len(),
                        keyword,
                    });
                    i += chars.len();
                }
                None => i += 1,
            }
        }
        occurrences
    }

    /// Candidate windows are scored over a sliding range of occurrences.
    ///
    /// Occurrences are sorted and non-overlapping, and both window edges only
    /// move forward, so `[lo, hi)` always holds the occurrences fully inside
    /// the current window.
    fn select_windows(&self, len: usize, occurrences: &[Occurrence]) -> Vec<Window> {
        let width = self.options.width;
        let mut candidates: Vec<Window> = Vec::with_capacity(occurrences.len());
        let mut counts = vec![0usize; self.keywords.len()];
        let mut distinct = 0;
        let (mut lo, mut hi) = (0, 0);

        for occurrence in occurrences {
            // A keyword longer than the width gets a window of its own size
            let (start, end) = if occurrence.end - occurrence.start >= width {
                (occurrence.start, occurrence.end)
            } else {
                let start = occurrence.start.min(len.saturating_sub(width));
                (start, (start + width).min(len))
            };
            if candidates.last().is_some_and(|w| w.start == start) {
                continue;
            }

            while hi < occurrences.len() && occurrences[hi].end <= end {
                let keyword = occurrences[hi].keyword;
                if counts[keyword] == 0 {
                    distinct += 1;
                }
                counts[keyword] += 1;
                hi += 1;
            }
            while lo < hi && occurrences[lo].start < start {
                let keyword = occurrences[lo].keyword;
                counts[keyword] -= 1;
                if counts[keyword] == 0 {
                    distinct -= 1;
                }
                lo += 1;
            }

            if distinct == 0 {
                continue;
            }
            candidates.push(Window {
                start,
                end,
                score: distinct,
            });
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));

        let mut selected: Vec<Window> = Vec::with_capacity(self.options.max_results);
        for candidate in candidates {
            if selected.len() == self.options.max_results {
                break;
            }
            if selected.iter().all(|w| !w.overlaps(&candidate)) {
                selected.push(candidate);
            }
        }
        selected.sort_by_key(|w| w.start);
        selected
    }

    fn render(
        &self,
        chars: &[char],
        window: &Window,
        occurrences: &[Occurrence],
        ranks: &[Option<usize>],
    ) -> String {
        let mut start = window.start;
        if self.options.skip_leading_spaces {
            while start < window.end
                && chars[start].is_whitespace()
                && !occurrences.iter().any(|o| o.start == start)
            {
                start += 1;
            }
        }

        let mut out = String::with_capacity((window.end - start) * 2);
        let mut cursor = start;
        for occurrence in occurrences
            .iter()
            .filter(|o| o.start >= start && o.end <= window.end)
        {
            self.push_text(&mut out, &chars[cursor..occurrence.start]);
            let rank = ranks[occurrence.keyword].unwrap_or(0);
            let tag = &self.tags[rank % self.tags.len()];
            out.push_str(&tag.open);
            self.push_text(&mut out, &chars[occurrence.start..occurrence.end]);
            out.push_str(&tag.close);
            cursor = occurrence.end;
        }
        self.push_text(&mut out, &chars[cursor..window.end]);
        out
    }

    fn push_text(&self, out: &mut String, text: &[char]) {
        for &c in text {
            if self.options.html_escape {
                match c {
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '&' => out.push_str("&amp;"),
                    '"' => out.push_str("&quot;"),
                    _ => out.push(c),
                }
            } else {
                out.push(c);
            }
        }
    }
}

impl std::fmt::Display for Snippet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keywords = String::new();
        for (i, keyword) in self.keywords.iter().enumerate() {
            if i > 0 {
                keywords.push_str(", ");
            }
            let keyword: String = keyword.iter().collect();
            let _ = write!(keywords, "{:?}", keyword);
        }
        write!(
            f,
            "#<Snippet keywords=[{}] tags={} width={} max_results={}>",
            keywords,
            self.tags.len(),
            self.options.width,
            self.options.max_results
        )
    }
}

/// Single-character case fold; multi-character expansions keep the input
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_tags() -> Vec<TagPair> {
        vec![TagPair::new("<1>", "</1>"), TagPair::new("<2>", "</2>")]
    }

    #[test]
    fn test_two_keywords_one_fragment() {
        let snippet =
            Snippet::new(["Ruby", "groonga"], numbered_tags(), SnippetOptions::default()).unwrap();
        assert_eq!(
            snippet.execute("Rubyでgroonga使って全文検索"),
            vec!["<1>Ruby</1>で<2>groonga</2>使って全文検索"]
        );
    }

    #[test]
    fn test_tags_follow_document_order() {
        let snippet =
            Snippet::new(["groonga", "Ruby"], numbered_tags(), SnippetOptions::default()).unwrap();
        assert_eq!(
            snippet.execute("Rubyでgroonga"),
            vec!["<1>Ruby</1>で<2>groonga</2>"]
        );
    }

    #[test]
    fn test_tag_cycling() {
        let snippet =
            Snippet::new(["a", "b", "c"], numbered_tags(), SnippetOptions::default()).unwrap();
        assert_eq!(
            snippet.execute("a b c a"),
            vec!["<1>a</1> <2>b</2> <1>c</1> <1>a</1>"]
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let snippet =
            Snippet::new(["groonga"], numbered_tags(), SnippetOptions::default()).unwrap();
        assert!(snippet.execute("nothing here").is_empty());
        assert!(snippet.execute("").is_empty());
    }

    #[test]
    fn test_longest_keyword_wins() {
        let snippet =
            Snippet::new(["gro", "groonga"], numbered_tags(), SnippetOptions::default()).unwrap();
        assert_eq!(snippet.execute("groonga"), vec!["<1>groonga</1>"]);
    }

    #[test]
    fn test_normalize() {
        let tags = vec![TagPair::new("[", "]")];
        let folded = Snippet::new(["GROONGA"], tags.clone(), SnippetOptions::default()).unwrap();
        assert_eq!(folded.execute("Groonga"), vec!["[Groonga]"]);

        let exact = Snippet::new(
            ["GROONGA"],
            tags,
            SnippetOptions::default().with_normalize(false),
        )
        .unwrap();
        assert!(exact.execute("Groonga").is_empty());
    }

    #[test]
    fn test_windows_rank_and_order() {
        let text = "aaaa x bbbb y aaaa z bbbb";
        let options = SnippetOptions::default().with_width(4).with_max_results(2);
        let snippet = Snippet::new(["aaaa", "bbbb"], numbered_tags(), options).unwrap();
        assert_eq!(
            snippet.execute(text),
            vec!["<1>aaaa</1>", "<2>bbbb</2>"]
        );

        let options = SnippetOptions::default().with_width(11).with_max_results(3);
        let snippet = Snippet::new(["aaaa", "bbbb"], numbered_tags(), options).unwrap();
        let fragments = snippet.execute(text);
        assert_eq!(fragments[0], "<1>aaaa</1> x <2>bbbb</2>");
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn test_window_shifted_at_end() {
        let options = SnippetOptions::default().with_width(8);
        let snippet = Snippet::new(["end"], vec![TagPair::new("[", "]")], options).unwrap();
        assert_eq!(snippet.execute("the very end"), vec!["very [end]"]);
    }

    #[test]
    fn test_keyword_wider_than_window() {
        let options = SnippetOptions::default().with_width(3);
        let snippet = Snippet::new(["groonga"], vec![TagPair::new("[", "]")], options).unwrap();
        assert_eq!(snippet.execute("I use groonga daily"), vec!["[groonga]"]);

        let options = SnippetOptions::default().with_width(3).with_max_results(2);
        let snippet = Snippet::new(["groonga", "use"], numbered_tags(), options).unwrap();
        assert_eq!(
            snippet.execute("I use groonga daily"),
            vec!["<1>use</1>", "<2>groonga</2>"]
        );
    }

    #[test]
    fn test_many_occurrences() {
        let text = "a ".repeat(40_000);
        let options = SnippetOptions::default().with_width(10);
        let snippet = Snippet::new(["a"], vec![TagPair::new("[", "]")], options).unwrap();
        let fragments = snippet.execute(&text);
        assert_eq!(fragments.len(), 3);
        for fragment in &fragments {
            assert_eq!(fragment, "[a] [a] [a] [a] [a] ");
        }
    }

    #[test]
    fn test_densest_window_wins() {
        // Only the last window holds both keywords
        let options = SnippetOptions::default().with_width(5).with_max_results(1);
        let snippet = Snippet::new(["aa", "bb"], numbered_tags(), options).unwrap();
        assert_eq!(snippet.execute("aa  bb cc bb aa"), vec!["<2>bb</2> <1>aa</1>"]);
    }

    #[test]
    fn test_html_escape_spares_tags() {
        let options = SnippetOptions::default().with_html_escape(true);
        let snippet = Snippet::new(["b"], vec![TagPair::new("<em>", "</em>")], options).unwrap();
        assert_eq!(
            snippet.execute("a<b>&\"c\""),
            vec!["a&lt;<em>b</em>&gt;&amp;&quot;c&quot;"]
        );
    }

    #[test]
    fn test_skip_leading_spaces() {
        let options = SnippetOptions::default()
            .with_width(4)
            .with_skip_leading_spaces(true);
        let snippet = Snippet::new(["x"], vec![TagPair::new("[", "]")], options).unwrap();
        assert_eq!(snippet.execute("abc   x"), vec!["[x]"]);
    }

    #[test]
    fn test_invalid_construction() {
        let err = Snippet::new(["a"], Vec::new(), SnippetOptions::default()).unwrap_err();
        assert_eq!(err, Error::EmptyTagList);

        let err = Snippet::new(
            ["a"],
            numbered_tags(),
            SnippetOptions::default().with_width(0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Argument);

        let err = TagPair::from_entries(&[vec!["<b>"]]).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Argument);
        assert_eq!(
            TagPair::from_entries(&[vec!["<b>", "</b>"]]).unwrap(),
            vec![TagPair::new("<b>", "</b>")]
        );
    }
}
