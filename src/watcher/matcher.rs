use super::types::{FeedItem, WatchRule};

/// Outcome of a single watch-rule predicate.
///
/// `Absent` means the rule does not configure the predicate at all, which is
/// different from configuring it and failing to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Absent,
    Matched,
    NotMatched,
}

impl Verdict {
    fn of<T>(predicates: &[T], mut hit: impl FnMut(&T) -> bool) -> Self {
        if predicates.is_empty() {
            Verdict::Absent
        } else if predicates.iter().any(|p| hit(p)) {
            Verdict::Matched
        } else {
            Verdict::NotMatched
        }
    }

    pub fn is_matched(self) -> bool {
        self == Verdict::Matched
    }

    /// Absent predicates never veto.
    pub fn vetoes(self) -> bool {
        self == Verdict::NotMatched
    }
}

/// Per-predicate verdicts for one item against one rule, plus the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub tag: Verdict,
    pub include: Verdict,
    pub exclude: Verdict,
    pub decision: bool,
}

/// Evaluate `item` against `rule`.
///
/// Tags are case-insensitive substrings of the title; include and exclude
/// patterns are unanchored searches over the title.
pub fn evaluate(item: &FeedItem, rule: &WatchRule) -> Evaluation {
    let title = item.title.as_str();
    let lowered = title.to_lowercase();

    let tag = Verdict::of(&rule.tags, |tag| lowered.contains(tag.as_str()));
    let include = Verdict::of(&rule.include_regex, |re| re.is_match(title));
    let exclude = Verdict::of(&rule.exclude_regex, |re| re.is_match(title));

    Evaluation {
        tag,
        include,
        exclude,
        decision: decide(tag, include, exclude),
    }
}

/// Combine predicate verdicts into a match decision.
///
/// At least one inclusion predicate must have matched, no configured
/// inclusion predicate may have failed, and the exclusion must not match.
pub fn decide(tag: Verdict, include: Verdict, exclude: Verdict) -> bool {
    let positive = tag.is_matched() || include.is_matched();
    positive && !tag.vetoes() && !include.vetoes() && !exclude.is_matched()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            identifier: format!("id-{title}"),
            ..Default::default()
        }
    }

    fn rule(tags: &[&str], include: &[&str], exclude: &[&str]) -> WatchRule {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        WatchRule::compile(
            Some("test"),
            &owned(tags),
            &owned(include),
            &owned(exclude),
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_tag_match_without_exclusion() {
        let eval = evaluate(&item("Show.S01E01.720p"), &rule(&["720p"], &[], &["CAM"]));
        assert_eq!(eval.tag, Verdict::Matched);
        assert_eq!(eval.include, Verdict::Absent);
        assert_eq!(eval.exclude, Verdict::NotMatched);
        assert!(eval.decision);
    }

    #[test]
    fn test_exclusion_vetoes_tag_match() {
        let eval = evaluate(
            &item("Show.S01E01.720p.CAM"),
            &rule(&["720p"], &[], &["CAM"]),
        );
        assert_eq!(eval.tag, Verdict::Matched);
        assert_eq!(eval.exclude, Verdict::Matched);
        assert!(!eval.decision);
    }

    #[test]
    fn test_tag_miss() {
        let eval = evaluate(&item("Show.S01E01.1080p"), &rule(&["720p"], &[], &["CAM"]));
        assert_eq!(eval.tag, Verdict::NotMatched);
        assert!(!eval.decision);
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        let eval = evaluate(
            &item("[Group] SHOW - 01 [1080P]"),
            &rule(&["show", "1080p"], &[], &[]),
        );
        assert!(eval.decision);
    }

    #[test]
    fn test_regex_is_a_search_not_a_full_match() {
        let eval = evaluate(&item("[Group] Show - 05 [720p]"), &rule(&[], &[r"Show - \d+"], &[]));
        assert_eq!(eval.tag, Verdict::Absent);
        assert_eq!(eval.include, Verdict::Matched);
        assert!(eval.decision);
    }

    #[test]
    fn test_regex_is_case_sensitive() {
        let eval = evaluate(&item("show - 05"), &rule(&[], &[r"Show"], &[]));
        assert_eq!(eval.include, Verdict::NotMatched);
        assert!(!eval.decision);
    }

    #[test]
    fn test_failed_regex_vetoes_matched_tag() {
        let eval = evaluate(&item("Show 720p"), &rule(&["720p"], &[r"S\d\dE\d\d"], &[]));
        assert_eq!(eval.tag, Verdict::Matched);
        assert_eq!(eval.include, Verdict::NotMatched);
        assert!(!eval.decision);
    }

    #[test]
    fn test_rule_with_only_absent_verdicts_never_matches() {
        let inert = rule(&[], &[], &[]);
        assert!(inert.is_inert());
        let eval = evaluate(&item("anything"), &inert);
        assert_eq!(eval.tag, Verdict::Absent);
        assert_eq!(eval.include, Verdict::Absent);
        assert!(!eval.decision);
    }

    #[test]
    fn test_exclude_only_rule_never_matches() {
        let eval = evaluate(&item("anything"), &rule(&[], &[], &["CAM"]));
        assert!(!eval.decision);
    }

    #[test]
    fn test_decide_table() {
        use Verdict::*;
        assert!(decide(Matched, Absent, Absent));
        assert!(decide(Absent, Matched, NotMatched));
        assert!(decide(Matched, Matched, NotMatched));
        assert!(!decide(Matched, NotMatched, Absent));
        assert!(!decide(NotMatched, Matched, Absent));
        assert!(!decide(Absent, Absent, Absent));
        assert!(!decide(Matched, Matched, Matched));
    }

    #[test]
    fn test_unnamed_rule_defaults_to_unknown() {
        let rule = WatchRule::compile(None, &["a".to_string()], &[], &[], &[]).unwrap();
        assert_eq!(rule.name, "unknown");
        let blank = WatchRule::compile(Some("  "), &["a".to_string()], &[], &[], &[]).unwrap();
        assert_eq!(blank.name, "unknown");
    }

    #[test]
    fn test_invalid_pattern_rejected_at_compile() {
        let result = WatchRule::compile(Some("bad"), &[], &["(unclosed".to_string()], &[], &[]);
        assert!(result.is_err());
    }
}
