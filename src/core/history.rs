//! Rolling in-memory conversation window.
//!
//! Only the last few exchanges are kept and sent along with each request.
//! Nothing is persisted.

use std::collections::VecDeque;

use serde::Serialize;

/// Default number of exchanges sent with each request.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Speaker of a turn, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One user message and the reply that answered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    limit: usize,
    exchanges: VecDeque<Exchange>,
}

impl ConversationHistory {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            exchanges: VecDeque::with_capacity(limit),
        }
    }

    /// Append an exchange, dropping the oldest when over the limit.
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.exchanges.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
        while self.exchanges.len() > self.limit {
            self.exchanges.pop_front();
        }
    }

    /// Flattened `(role, text)` turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = (Role, &str)> {
        self.exchanges.iter().flat_map(|e| {
            [
                (Role::User, e.user.as_str()),
                (Role::Assistant, e.assistant.as_str()),
            ]
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_last_exchanges() {
        let mut history = ConversationHistory::new(2);
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");

        assert_eq!(history.len(), 2);
        let users: Vec<_> = history.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, vec!["q2", "q3"]);
    }

    #[test]
    fn turns_alternate_user_and_assistant() {
        let mut history = ConversationHistory::default();
        history.push("hi", "hello");
        let turns: Vec<_> = history.turns().collect();
        assert_eq!(
            turns,
            vec![(Role::User, "hi"), (Role::Assistant, "hello")]
        );
    }

    #[test]
    fn zero_limit_is_clamped() {
        let mut history = ConversationHistory::new(0);
        history.push("a", "b");
        assert_eq!(history.limit(), 1);
        assert_eq!(history.len(), 1);
    }
}
