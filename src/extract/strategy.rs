//! JSON candidate extraction strategies.
//!
//! Models wrap structured output in prose or markdown despite instructions.
//! Each strategy is a pure function from the full response text to an
//! optional candidate slice; an [`Extractor`] tries them in order and the
//! first hit wins. None of them validate the candidate -- that is the
//! validator's job.

use serde::{Deserialize, Serialize};

/// A single way of locating the JSON payload inside a model response.
pub trait ExtractStrategy: Send + Sync {
    /// Stable name used in logs and events.
    fn name(&self) -> &'static str;

    /// Return the trimmed candidate, or `None` if this strategy does not apply.
    fn extract<'a>(&self, text: &'a str) -> Option<&'a str>;
}

/// A `` ```json `` fenced block, up to the next `` ``` ``.
///
/// The opening marker is matched case-sensitively and need not be followed
/// by a newline. A fenced block with an empty interior still counts as a
/// match (the parse step then fails).
///
/// # Examples
///
/// ```
/// use llm_scaffold::extract::{ExtractStrategy, FencedJson};
///
/// let input = "Here:\n```json\n{\"a\": 1}\n```\nbye";
/// assert_eq!(FencedJson.extract(input), Some("{\"a\": 1}"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedJson;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

impl ExtractStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced-json"
    }

    fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        // An unclosed first fence means no later fence can close either.
        let content_start = text.find(FENCE_OPEN)? + FENCE_OPEN.len();
        let close = text[content_start..].find(FENCE_CLOSE)?;
        Some(text[content_start..content_start + close].trim())
    }
}

/// First `{` through last `}` of the whole text.
///
/// Misbehaves when the surrounding prose contains its own braces; see
/// [`BalancedBraces`] for the stricter alternative.
///
/// # Examples
///
/// ```
/// use llm_scaffold::extract::{ExtractStrategy, OuterBraces};
///
/// let input = r#"Sure: {"a": {"b": 2}} done"#;
/// assert_eq!(OuterBraces.extract(input), Some(r#"{"a": {"b": 2}}"#));
/// assert_eq!(OuterBraces.extract("} backwards {"), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OuterBraces;

impl ExtractStrategy for OuterBraces {
    fn name(&self) -> &'static str {
        "outer-braces"
    }

    fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if start < end {
            Some(text[start..=end].trim())
        } else {
            None
        }
    }
}

/// The last complete top-level `{...}` object, found by a nesting-aware scan
/// that ignores braces inside JSON string literals.
///
/// # Examples
///
/// ```
/// use llm_scaffold::extract::{BalancedBraces, ExtractStrategy};
///
/// let input = r#"Use {braces} like this: {"codeFiles": {"a.js": "if (x) { y }"}}"#;
/// assert_eq!(
///     BalancedBraces.extract(input),
///     Some(r#"{"codeFiles": {"a.js": "if (x) { y }"}}"#)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedBraces;

impl ExtractStrategy for BalancedBraces {
    fn name(&self) -> &'static str {
        "balanced-braces"
    }

    fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        // Prefer the last top-level region: models put the answer after the chatter.
        let mut best: Option<&str> = None;
        let mut scan_from = 0;

        while scan_from < text.len() {
            let Some(offset) = text[scan_from..].find('{') else {
                break;
            };
            let start = scan_from + offset;
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escape_next = false;
            let mut found_end = None;

            for (i, ch) in text[start..].char_indices() {
                if escape_next {
                    escape_next = false;
                    continue;
                }
                if ch == '\\' && in_string {
                    escape_next = true;
                    continue;
                }
                if ch == '"' {
                    in_string = !in_string;
                    continue;
                }
                if in_string {
                    continue;
                }
                if ch == '{' {
                    depth += 1;
                } else if ch == '}' {
                    depth -= 1;
                    if depth == 0 {
                        found_end = Some(start + i);
                        break;
                    }
                }
            }

            match found_end {
                Some(end) => {
                    best = Some(text[start..=end].trim());
                    scan_from = end + 1;
                }
                // Unclosed: a stray prose brace, or a truncated tail.
                None => scan_from = start + 1,
            }
        }

        best
    }
}

/// Which brace strategy runs after the fenced-block search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BraceFallback {
    /// First `{` to last `}` (compatible default).
    #[default]
    OuterBraces,
    /// Nesting- and string-aware scan.
    Balanced,
}

impl std::str::FromStr for BraceFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outer-braces" => Ok(BraceFallback::OuterBraces),
            "balanced" => Ok(BraceFallback::Balanced),
            other => Err(format!(
                "unknown brace fallback '{}' (expected 'outer-braces' or 'balanced')",
                other
            )),
        }
    }
}

/// A candidate found by one of the strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// The trimmed JSON candidate text.
    pub text: &'a str,
    /// Name of the strategy that produced it.
    pub strategy: &'static str,
}

/// An ordered list of strategies; the first one that matches wins.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Extractor {
    /// Build an extractor from an explicit strategy list.
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    /// Fenced block first, then the chosen brace fallback.
    pub fn with_fallback(fallback: BraceFallback) -> Self {
        let brace: Box<dyn ExtractStrategy> = match fallback {
            BraceFallback::OuterBraces => Box::new(OuterBraces),
            BraceFallback::Balanced => Box::new(BalancedBraces),
        };
        Self::new(vec![Box::new(FencedJson), brace])
    }

    /// Append a strategy to the end of the list.
    pub fn push(mut self, strategy: Box<dyn ExtractStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategies in order.
    pub fn extract<'a>(&self, text: &'a str) -> Option<Candidate<'a>> {
        self.strategies.iter().find_map(|s| {
            s.extract(text).map(|candidate| Candidate {
                text: candidate,
                strategy: s.name(),
            })
        })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_fallback(BraceFallback::default())
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── FencedJson ──

    #[test]
    fn fenced_block_with_surrounding_prose() {
        let input = "Here you go:\n```json\n{\"codeFiles\":{\"a.js\":\"x\"}}\n```\nEnjoy!";
        assert_eq!(
            FencedJson.extract(input),
            Some("{\"codeFiles\":{\"a.js\":\"x\"}}")
        );
    }

    #[test]
    fn fenced_block_without_newline_after_tag() {
        let input = "```json{\"a\":1}```";
        assert_eq!(FencedJson.extract(input), Some("{\"a\":1}"));
    }

    #[test]
    fn fenced_block_empty_interior_still_matches() {
        assert_eq!(FencedJson.extract("```json\n\n```"), Some(""));
    }

    #[test]
    fn fenced_block_unclosed_is_no_match() {
        assert_eq!(FencedJson.extract("```json\n{\"a\": 1}"), None);
    }

    #[test]
    fn fenced_block_other_language_is_no_match() {
        assert_eq!(FencedJson.extract("```yaml\na: 1\n```"), None);
        assert_eq!(FencedJson.extract("```\n{\"a\": 1}\n```"), None);
    }

    #[test]
    fn fenced_block_stops_at_first_closing_fence() {
        let input = "```json\n{\"a\": 1}\n```\ntext\n```json\n{\"b\": 2}\n```";
        assert_eq!(FencedJson.extract(input), Some("{\"a\": 1}"));
    }

    // ── OuterBraces ──

    #[test]
    fn outer_braces_bare_object() {
        let input = r#"{"codeFiles":{"a.js":"x"}}"#;
        assert_eq!(OuterBraces.extract(input), Some(input));
    }

    #[test]
    fn outer_braces_spans_first_to_last() {
        let input = r#"Example {x} then {"a": 1}"#;
        assert_eq!(OuterBraces.extract(input), Some(r#"{x} then {"a": 1}"#));
    }

    #[test]
    fn outer_braces_requires_open_before_close() {
        assert_eq!(OuterBraces.extract("} nothing {"), None);
        assert_eq!(OuterBraces.extract("no braces"), None);
    }

    #[test]
    fn outer_braces_truncated_has_no_close() {
        assert_eq!(OuterBraces.extract(r#"{"codeFiles": {"a.js": "x""#), None);
    }

    // ── BalancedBraces ──

    #[test]
    fn balanced_prefers_last_complete_object() {
        let input = r#"{"draft": 1} and finally {"codeFiles": {}}"#;
        assert_eq!(BalancedBraces.extract(input), Some(r#"{"codeFiles": {}}"#));
    }

    #[test]
    fn balanced_ignores_braces_in_strings() {
        let input = r#"{"codeFiles": {"a.js": "function f() { return '}'; }"}}"#;
        assert_eq!(BalancedBraces.extract(input), Some(input));
    }

    #[test]
    fn balanced_handles_escaped_quotes() {
        let input = r#"{"codeFiles": {"a.js": "say \"}\""}}"#;
        assert_eq!(BalancedBraces.extract(input), Some(input));
    }

    #[test]
    fn balanced_skips_unclosed_prose_brace() {
        let input = r#"Press { to open a block. {"codeFiles":{"a.js":"x"}}"#;
        assert_eq!(
            BalancedBraces.extract(input),
            Some(r#"{"codeFiles":{"a.js":"x"}}"#)
        );
    }

    #[test]
    fn balanced_skips_prose_brace_with_stray_quote() {
        let input = r#"Use {"name} here, then {"codeFiles":{"a.js":"x"}}"#;
        assert_eq!(
            BalancedBraces.extract(input),
            Some(r#"{"codeFiles":{"a.js":"x"}}"#)
        );
    }

    #[test]
    fn balanced_keeps_earlier_object_before_truncated_tail() {
        let input = r#"{"codeFiles":{}} then {"codeFiles": {"a.js": "x""#;
        assert_eq!(BalancedBraces.extract(input), Some(r#"{"codeFiles":{}}"#));
    }

    #[test]
    fn balanced_truncated_is_no_match() {
        assert_eq!(BalancedBraces.extract(r#"{"codeFiles": {"a.js": "x""#), None);
    }

    // ── Extractor ──

    #[test]
    fn extractor_prefers_fenced_block() {
        let input = "{\"stray\": true}\n```json\n{\"codeFiles\":{}}\n```\n{\"more\": 1}";
        let candidate = Extractor::default().extract(input).unwrap();
        assert_eq!(candidate.text, "{\"codeFiles\":{}}");
        assert_eq!(candidate.strategy, "fenced-json");
    }

    #[test]
    fn extractor_falls_back_to_braces() {
        let candidate = Extractor::default()
            .extract("Sure! {\"codeFiles\":{}} Hope that helps")
            .unwrap();
        assert_eq!(candidate.text, "{\"codeFiles\":{}}");
        assert_eq!(candidate.strategy, "outer-braces");
    }

    #[test]
    fn extractor_no_candidate() {
        assert!(Extractor::default().extract("Sorry, I cannot do that.").is_none());
    }

    #[test]
    fn extractor_balanced_fallback() {
        let ex = Extractor::with_fallback(BraceFallback::Balanced);
        assert_eq!(ex.strategy_names(), vec!["fenced-json", "balanced-braces"]);
        let candidate = ex.extract("See {this} then {\"codeFiles\":{}}").unwrap();
        assert_eq!(candidate.text, "{\"codeFiles\":{}}");
    }

    #[test]
    fn extractor_custom_strategy_appended() {
        struct Whole;
        impl ExtractStrategy for Whole {
            fn name(&self) -> &'static str {
                "whole"
            }
            fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
                Some(text.trim())
            }
        }

        let ex = Extractor::default().push(Box::new(Whole));
        let candidate = ex.extract("  plain  ").unwrap();
        assert_eq!(candidate.text, "plain");
        assert_eq!(candidate.strategy, "whole");
    }

    #[test]
    fn brace_fallback_from_str() {
        assert_eq!("balanced".parse::<BraceFallback>(), Ok(BraceFallback::Balanced));
        assert_eq!(
            "outer-braces".parse::<BraceFallback>(),
            Ok(BraceFallback::OuterBraces)
        );
        assert!("greedy".parse::<BraceFallback>().is_err());
    }
}
