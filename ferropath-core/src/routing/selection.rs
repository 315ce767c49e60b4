use serde::Deserialize;

use crate::model::Address;

/// Which address candidate a route query snaps to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// First candidate in storage order
    #[default]
    FirstMatch,
    /// A case-insensitive exact label match if there is one, else the first
    ExactLabelFirst,
}

impl SelectionStrategy {
    pub fn select<'c>(&self, query: &str, candidates: &'c [Address]) -> Option<&'c Address> {
        match self {
            SelectionStrategy::FirstMatch => candidates.first(),
            SelectionStrategy::ExactLabelFirst => {
                let query = query.trim().to_lowercase();
                candidates
                    .iter()
                    .find(|address| address.display_name.to_lowercase() == query)
                    .or_else(|| candidates.first())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_pick_candidates() {
        let candidates = [
            Address::new("12 Rue Saint-Jean Est", 0.0, 0.0),
            Address::new("12 Rue Saint-Jean", 1.0, 1.0),
        ];
        let first = SelectionStrategy::FirstMatch.select("12 rue saint-jean", &candidates);
        let exact = SelectionStrategy::ExactLabelFirst.select("12 rue saint-jean", &candidates);
        let fallback = SelectionStrategy::ExactLabelFirst.select("12 rue", &candidates);

        assert_eq!(first, Some(&candidates[0]));
        assert_eq!(exact, Some(&candidates[1]));
        assert_eq!(fallback, Some(&candidates[0]));
        assert_eq!(SelectionStrategy::FirstMatch.select("x", &[]), None);
    }

    #[test]
    fn deserializes_snake_case() {
        let strategy: SelectionStrategy = serde_json::from_str("\"exact_label_first\"").unwrap();
        assert_eq!(strategy, SelectionStrategy::ExactLabelFirst);
    }
}
