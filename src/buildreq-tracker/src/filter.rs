//! Case-insensitive name search over fetched tasks.

use crate::model::RawTask;

/// Keep tasks whose name contains `query`, ignoring case.
///
/// An empty query keeps every task. Input order is preserved.
pub fn filter_by_name(tasks: Vec<RawTask>, query: &str) -> Vec<RawTask> {
    let needle = fold_case(query);
    if needle.is_empty() {
        return tasks;
    }

    tasks
        .into_iter()
        .filter(|task| fold_case(&task.name).contains(&needle))
        .collect()
}

/// Unicode case fold, one character at a time so the result never depends
/// on a letter's position in a word (final sigma). Upper-casing first maps
/// `ß` to `SS` so both spellings fold to the same text.
fn fold_case(s: &str) -> String {
    s.chars()
        .flat_map(char::to_uppercase)
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(names: &[&str]) -> Vec<RawTask> {
        names
            .iter()
            .map(|name| RawTask {
                name: name.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn names(tasks: &[RawTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_empty_query_keeps_everything_in_order() {
        let input = tasks(&["Zeta", "Acme Corp", "Beta"]);
        let result = filter_by_name(input.clone(), "");
        assert_eq!(result, input);
    }

    #[test]
    fn test_substring_match_case_insensitive() {
        let result = filter_by_name(tasks(&["Acme Corp", "Globex", "ACME Schools"]), "acme");
        assert_eq!(names(&result), vec!["Acme Corp", "ACME Schools"]);
    }

    #[test]
    fn test_query_and_uppercase_query_agree() {
        let input = tasks(&["Straße Werk", "Strasse Depot", "Acme Corp", "Ölfeld"]);
        for q in ["straße", "acme c", "öl", "x"] {
            assert_eq!(
                filter_by_name(input.clone(), q),
                filter_by_name(input.clone(), &q.to_uppercase()),
                "query {q}"
            );
        }
    }

    #[test]
    fn test_final_sigma_matches_in_any_position() {
        let input = tasks(&["ΟΔΟΣ", "Σοφία Ltd"]);
        assert_eq!(names(&filter_by_name(input.clone(), "Σ")), vec!["ΟΔΟΣ", "Σοφία Ltd"]);
        assert_eq!(names(&filter_by_name(input.clone(), "σ")), vec!["ΟΔΟΣ", "Σοφία Ltd"]);
        assert_eq!(names(&filter_by_name(input.clone(), "οδος")), vec!["ΟΔΟΣ"]);
        assert_eq!(names(&filter_by_name(input, "ς")), vec!["ΟΔΟΣ", "Σοφία Ltd"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let result = filter_by_name(tasks(&["Acme Corp"]), "initech");
        assert!(result.is_empty());
    }
}
