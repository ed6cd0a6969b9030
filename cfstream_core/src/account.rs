use serde::{Deserialize, Serialize};

/// A Cloudflare account as returned by the account listing API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Account {
    pub id: String,
    pub name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn description(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

/// Inclusion allow-list of account identifiers.
///
/// An empty filter includes every account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    ids: Vec<String>,
}

impl AccountFilter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(Into::into)
                .map(|id: String| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as `"abc,def"`. Blank entries are dropped.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn includes(&self, account: &Account) -> bool {
        self.ids.is_empty() || self.ids.iter().any(|id| *id == account.id)
    }

    pub fn apply(&self, accounts: Vec<Account>) -> Vec<Account> {
        accounts.into_iter().filter(|a| self.includes(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Vec<Account> {
        vec![
            Account::new("A", "Alpha"),
            Account::new("B", "Bravo"),
            Account::new("C", "Charlie"),
        ]
    }

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = AccountFilter::parse("");
        assert!(filter.is_empty());
        assert_eq!(filter.apply(accounts()).len(), 3);
    }

    #[test]
    fn test_filter_keeps_listed_accounts_in_order() {
        let filter = AccountFilter::parse("C, A");
        let kept: Vec<String> = filter.apply(accounts()).into_iter().map(|a| a.id).collect();
        assert_eq!(kept, vec!["A", "C"]);
    }

    #[test]
    fn test_filter_drops_blank_entries() {
        let filter = AccountFilter::parse(",A,,");
        assert_eq!(filter.ids(), &["A".to_string()]);
    }

    #[test]
    fn test_filter_matches_id_not_name() {
        let filter = AccountFilter::parse("Alpha");
        assert!(!filter.includes(&Account::new("A", "Alpha")));
    }
}
