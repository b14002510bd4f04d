//! Utility functions for the setup service

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Check whether two maps have exactly the same key set
pub fn same_keys<A, B>(left: &BTreeMap<String, A>, right: &BTreeMap<String, B>) -> bool {
    left.len() == right.len() && left.keys().all(|key| right.contains_key(key))
}

/// Normalize a game or variant name for matching
///
/// Lowercases and drops everything that is not alphanumeric, so
/// "Tic-Tac-Toe", "tic tac toe" and "TICTACTOE" compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a command argument is a user mention rather than plain text
pub fn is_mention(token: &str) -> bool {
    (token.starts_with("<@") && token.ends_with('>')) || token.starts_with('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_same_keys() {
        let mut left = BTreeMap::new();
        left.insert("rounds".to_string(), 1);
        left.insert("board".to_string(), 2);

        let mut right = BTreeMap::new();
        right.insert("board".to_string(), "x");
        right.insert("rounds".to_string(), "y");
        assert!(same_keys(&left, &right));

        right.insert("timer".to_string(), "z");
        assert!(!same_keys(&left, &right));
        assert!(!same_keys(&right, &left));

        let empty: BTreeMap<String, u8> = BTreeMap::new();
        assert!(same_keys(&empty, &BTreeMap::<String, u8>::new()));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Tic-Tac-Toe"), "tictactoe");
        assert_eq!(normalize_name("  Connect 4 "), "connect4");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_is_mention() {
        assert!(is_mention("<@1234>"));
        assert!(is_mention("@alice"));
        assert!(!is_mention("alice"));
        assert!(!is_mention("3"));
    }
}
