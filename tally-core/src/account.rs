use std::collections::BTreeMap;

/// Separator between account path segments, e.g. `expenses:food:groceries`.
pub const ACCOUNT_SEPARATOR: char = ':';

/// Split an account name into its path segments.
pub fn account_segments(account: &str) -> Vec<&str> {
    account.split(ACCOUNT_SEPARATOR).collect()
}

/// Returns true when `account` equals `ancestor` or is nested under it.
pub fn is_nested_under(account: &str, ancestor: &str) -> bool {
    match account.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with(ACCOUNT_SEPARATOR),
        None => false,
    }
}

/// Prefix tree over account paths answering "is this account equal to, or nested under, any of
/// the reference accounts?".
///
/// Redundant references collapse: once a path is terminal, deeper references below it are
/// dropped and later insertions through it are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountTrie {
    root: Node,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Node {
    terminal: bool,
    children: BTreeMap<String, Node>,
}

impl AccountTrie {
    pub fn new<I, P, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut trie = Self::default();
        for entry in entries {
            trie.insert(entry.as_ref());
        }
        trie
    }

    /// Build a trie from `:` delimited account names.
    pub fn from_accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::default();
        for account in accounts {
            trie.insert(&account_segments(account.as_ref()));
        }
        trie
    }

    pub fn insert<S: AsRef<str>>(&mut self, path: &[S]) {
        let mut node = &mut self.root;
        for (ix, segment) in path.iter().enumerate() {
            let child = node
                .children
                .entry(segment.as_ref().to_string())
                .or_default();
            if child.terminal {
                return;
            }
            if ix + 1 == path.len() {
                child.terminal = true;
                child.children.clear();
                return;
            }
            node = child;
        }
    }

    /// True as soon as the walk over `path` reaches a terminal node.
    pub fn has_prefix_to<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let mut node = &self.root;
        for segment in path {
            match node.children.get(segment.as_ref()) {
                Some(child) if child.terminal => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Convenience wrapper over [`AccountTrie::has_prefix_to`] for a `:` delimited name.
    pub fn covers(&self, account: &str) -> bool {
        self.has_prefix_to(&account_segments(account))
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(entries: &[&[&str]]) -> AccountTrie {
        AccountTrie::new(entries.iter().copied())
    }

    #[test]
    fn collapses_nested_references() {
        assert_eq!(trie(&[&["A", "B", "C"], &["A", "B"]]), trie(&[&["A", "B"]]));
        assert_eq!(trie(&[&["A", "B"], &["A", "B", "C"]]), trie(&[&["A", "B"]]));
        assert!(trie(&[&[]]).is_empty());
        assert!(AccountTrie::default().is_empty());
    }

    #[test]
    fn prefix_queries() {
        let cases: &[(&[&[&str]], &[&str], bool)] = &[
            (&[&["A"]], &["A"], true),
            (&[&["A"]], &["B"], false),
            (&[&["A"], &["B"]], &["B"], true),
            (&[&["A"], &["B", "C"]], &["B"], false),
            (&[&["A"], &["B", "C"]], &["B", "C"], true),
            (&[&["A"], &["B", "C"]], &["B", "C", "D"], true),
            (&[&["A", "D"], &["B", "C"]], &["A", "E"], false),
            (&[&["A"], &["B", "C"]], &["D", "E"], false),
        ];
        for (entries, query, expected) in cases {
            assert_eq!(
                trie(entries).has_prefix_to(*query),
                *expected,
                "entries {entries:?} query {query:?}"
            );
        }
    }

    #[test]
    fn deeper_branches_survive_sibling_inserts() {
        let trie = trie(&[&["A", "B", "D", "E"], &["A", "B", "C"], &["E", "F", "A"]]);
        assert!(trie.has_prefix_to(&["A", "B", "C", "X"]));
        assert!(trie.has_prefix_to(&["A", "B", "D", "E"]));
        assert!(!trie.has_prefix_to(&["A", "B", "D"]));
        assert!(trie.has_prefix_to(&["E", "F", "A"]));
    }

    #[test]
    fn account_names() {
        let trie = AccountTrie::from_accounts(["shopping", "food:groceries"]);
        assert!(trie.covers("shopping:gifts"));
        assert!(trie.covers("food:groceries"));
        assert!(!trie.covers("food"));
        assert!(!trie.covers("food:restaurants"));
        assert!(is_nested_under("food:groceries", "food"));
        assert!(is_nested_under("food", "food"));
        assert!(!is_nested_under("foodie", "food"));
    }
}
