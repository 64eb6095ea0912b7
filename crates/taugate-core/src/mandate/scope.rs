//! Mandate scopes and wildcard pattern matching.

use serde::{Deserialize, Serialize};

/// What a mandate permits: action patterns, resource patterns, and an
/// optional spending ceiling.
///
/// Patterns come in exactly three forms:
///
/// - `*` — matches anything, including the empty string
/// - an exact string — matches only itself
/// - `prefix:*` — matches any candidate starting with `prefix:` (so `a:*`
///   matches `a:` and `a:x`, but not `a`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Action patterns the delegate may execute.
    pub actions: Vec<String>,

    /// Resource patterns the delegate may touch.
    pub resources: Vec<String>,

    /// Spending ceiling in the smallest currency unit. `None` means
    /// unbounded; `Some(0)` means a zero budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u64>,

    /// ISO-4217 currency code for `max_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Scope {
    /// Creates a scope from action and resource patterns.
    #[must_use]
    pub fn new(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            max_value: None,
            currency: None,
        }
    }

    /// Sets the spending ceiling.
    #[must_use]
    pub const fn with_max_value(mut self, max_value: u64) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Sets the currency code for the spending ceiling.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Returns `true` if any action pattern matches the candidate.
    #[must_use]
    pub fn allows_action(&self, action: &str) -> bool {
        self.actions.iter().any(|p| pattern_matches(p, action))
    }

    /// Returns `true` if any resource pattern matches the candidate.
    #[must_use]
    pub fn allows_resource(&self, resource: &str) -> bool {
        self.resources.iter().any(|p| pattern_matches(p, resource))
    }

    /// Returns `true` if the value fits under the spending ceiling.
    ///
    /// An unset ceiling allows any value; a ceiling of zero rejects every
    /// positive value.
    #[must_use]
    pub fn within_budget(&self, value: u64) -> bool {
        self.max_value.map_or(true, |max| value <= max)
    }

    /// Validates the currency code, if one is set.
    ///
    /// # Errors
    ///
    /// Returns the offending code when it is not three ASCII uppercase
    /// letters.
    pub fn validate_currency(&self) -> Result<(), String> {
        match &self.currency {
            None => Ok(()),
            Some(code)
                if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) =>
            {
                Ok(())
            },
            Some(code) => Err(code.clone()),
        }
    }
}

/// Matches one pattern against a candidate.
fn pattern_matches(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(":*") {
        return candidate
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(':'));
    }
    pattern == candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("*", "a:b:c"));
    }

    #[test]
    fn exact_matches_only_itself() {
        assert!(pattern_matches("read_file", "read_file"));
        assert!(!pattern_matches("read_file", "write_file"));
        assert!(!pattern_matches("read_file", "read_file2"));
    }

    #[test]
    fn prefix_wildcard_requires_the_colon() {
        assert!(pattern_matches("a:*", "a:"));
        assert!(pattern_matches("a:*", "a:x"));
        assert!(!pattern_matches("a:*", "a"));
    }

    #[test]
    fn prefix_wildcard_does_not_match_longer_prefix() {
        assert!(pattern_matches("payment:*", "payment:transfer"));
        assert!(pattern_matches("payment:*", "payment:refund"));
        assert!(!pattern_matches("payment:*", "payments:x"));
    }

    #[test]
    fn scope_checks_any_pattern() {
        let scope = Scope::new(["read_file", "payment:*"], ["agent:openai"]);
        assert!(scope.allows_action("read_file"));
        assert!(scope.allows_action("payment:transfer"));
        assert!(!scope.allows_action("write_file"));
        assert!(scope.allows_resource("agent:openai"));
        assert!(!scope.allows_resource("agent:other"));
    }

    #[test]
    fn budget_edges() {
        let scope = Scope::new(["*"], ["*"]).with_max_value(10_000);
        assert!(scope.within_budget(10_000));
        assert!(!scope.within_budget(10_001));

        let unbounded = Scope::new(["*"], ["*"]);
        assert!(unbounded.within_budget(u64::MAX));

        let zero = Scope::new(["*"], ["*"]).with_max_value(0);
        assert!(zero.within_budget(0));
        assert!(!zero.within_budget(1));
    }

    #[test]
    fn currency_validation() {
        let ok = Scope::new(["*"], ["*"]).with_currency("USD");
        assert!(ok.validate_currency().is_ok());

        for bad in ["usd", "US", "USDX", "U$D"] {
            let scope = Scope::new(["*"], ["*"]).with_currency(bad);
            assert!(scope.validate_currency().is_err(), "expected rejection for {bad}");
        }

        let none = Scope::new(["*"], ["*"]);
        assert!(none.validate_currency().is_ok());
    }
}
