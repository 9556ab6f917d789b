//! robots.txt policy
//!
//! Groups are introduced by one or more `User-agent` lines followed by
//! `Allow` / `Disallow` rules. A crawler uses the groups naming its product token,
//! falling back to `*`. Among matching rules the longest pattern wins and `Allow`
//! wins ties. Patterns support `*` wildcards and a trailing `$` anchor.

use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    /// Pattern length used for precedence
    specificity: usize,
    matcher: Regex,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
}

impl RobotsPolicy {
    /// Policy that allows everything (missing or unreadable robots.txt)
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt text; unknown directives are ignored
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;

        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    let starts_new = current.as_ref().map_or(true, |g| !g.rules.is_empty());
                    if starts_new {
                        if let Some(done) = current.take() {
                            groups.push(done);
                        }
                        current = Some(Group::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    // "Disallow:" with no path allows everything
                    if value.is_empty() {
                        continue;
                    }
                    match compile_pattern(value) {
                        Some(matcher) => group.rules.push(Rule {
                            allow: key == "allow",
                            specificity: value.len(),
                            matcher,
                        }),
                        None => debug!(pattern = value, "Skipping unusable robots.txt pattern"),
                    }
                }
                _ => {}
            }
        }

        if let Some(done) = current {
            groups.push(done);
        }

        Self { groups }
    }

    /// Check a path (with optional `?query`) for the given user agent
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let token = product_token(user_agent);
        let path = if path.is_empty() { "/" } else { path };

        let named: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && !a.is_empty() && token.contains(a.as_str())))
            .collect();

        let applicable = if named.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            named
        };

        let mut verdict: Option<(usize, bool)> = None;
        for rule in applicable.iter().flat_map(|g| g.rules.iter()) {
            if !rule.matcher.is_match(path) {
                continue;
            }
            verdict = match verdict {
                None => Some((rule.specificity, rule.allow)),
                Some((len, _)) if rule.specificity > len => Some((rule.specificity, rule.allow)),
                Some((len, allow)) if rule.specificity == len => Some((len, allow || rule.allow)),
                keep => keep,
            };
        }

        verdict.map_or(true, |(_, allow)| allow)
    }
}

/// Lowercase product name from a User-Agent ("PlaybillBot/0.1 (...)" → "playbillbot")
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(body) => (body, true),
        None => (pattern, false),
    };

    let mut expr = String::from("^");
    for (i, piece) in body.split('*').enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(piece));
    }
    if anchored {
        expr.push('$');
    }

    Regex::new(&expr).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "PlaybillBot/0.1 (+mailto:crawler@playbill.invalid)";

    #[test]
    fn test_empty_file_allows_everything() {
        let policy = RobotsPolicy::parse("");
        assert!(policy.is_allowed("/anything", UA));
    }

    #[test]
    fn test_wildcard_group_disallow() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private/\n");
        assert!(!policy.is_allowed("/private/calendar", UA));
        assert!(policy.is_allowed("/events", UA));
    }

    #[test]
    fn test_named_group_overrides_wildcard() {
        let text = "User-agent: *\nDisallow: /\n\nUser-agent: PlaybillBot\nDisallow: /admin\n";
        let policy = RobotsPolicy::parse(text);
        assert!(policy.is_allowed("/events", UA));
        assert!(!policy.is_allowed("/admin/login", UA));
        assert!(!policy.is_allowed("/events", "OtherBot/1.0"));
    }

    #[test]
    fn test_longest_match_and_allow_ties() {
        let text = "User-agent: *\nDisallow: /shows\nAllow: /shows/current\n";
        let policy = RobotsPolicy::parse(text);
        assert!(!policy.is_allowed("/shows/archive", UA));
        assert!(policy.is_allowed("/shows/current/hamlet", UA));

        let tie = RobotsPolicy::parse("User-agent: *\nDisallow: /page\nAllow: /page\n");
        assert!(tie.is_allowed("/page", UA));
    }

    #[test]
    fn test_wildcards_and_anchor() {
        let text = "User-agent: *\nDisallow: /*.ics$\nDisallow: /search*q=\n";
        let policy = RobotsPolicy::parse(text);
        assert!(!policy.is_allowed("/calendar/season.ics", UA));
        assert!(policy.is_allowed("/calendar/season.ics?download=1", UA));
        assert!(!policy.is_allowed("/search?q=hamlet", UA));
    }

    #[test]
    fn test_grouped_user_agents_and_comments() {
        let text = "# crawl policy\nUser-agent: googlebot\nUser-agent: playbillbot # ours\nDisallow: /tickets\nCrawl-delay: 5\n";
        let policy = RobotsPolicy::parse(text);
        assert!(!policy.is_allowed("/tickets/123", UA));
        assert!(policy.is_allowed("/tickets/123", "SomeOtherBot"));
    }
}
