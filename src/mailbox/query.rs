//! Search query builder for the mailbox token grammar.

use chrono::NaiveDate;

/// Builds space-joined search tokens understood by the mailbox:
/// `after:YYYY/MM/DD`, `newer_than:Nd`, `is:unread`. Tokens are ANDed by
/// the collaborator.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    after: Option<NaiveDate>,
    newer_than_days: Option<u32>,
    unread_only: bool,
}

impl SearchQuery {
    /// Constrain to messages received after `date`.
    pub fn after(date: NaiveDate) -> Self {
        Self {
            after: Some(date),
            ..Default::default()
        }
    }

    /// Constrain to messages younger than `days` days.
    pub fn newer_than_days(days: u32) -> Self {
        Self {
            newer_than_days: Some(days),
            ..Default::default()
        }
    }

    /// Additionally constrain to unread messages.
    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }

    /// Render the query string.
    pub fn build(&self) -> String {
        let mut tokens = Vec::new();
        if let Some(date) = self.after {
            tokens.push(format!("after:{}", date.format("%Y/%m/%d")));
        }
        if let Some(days) = self.newer_than_days {
            tokens.push(format!("newer_than:{days}d"));
        }
        if self.unread_only {
            tokens.push("is:unread".to_string());
        }
        tokens.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_date_with_unread() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        assert_eq!(
            SearchQuery::after(date).unread().build(),
            "after:2026/08/08 is:unread"
        );
    }

    #[test]
    fn newer_than_with_unread() {
        assert_eq!(
            SearchQuery::newer_than_days(1).unread().build(),
            "newer_than:1d is:unread"
        );
    }

    #[test]
    fn empty_query_renders_empty() {
        assert_eq!(SearchQuery::default().build(), "");
    }

    #[test]
    fn single_digit_day_and_month_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        assert_eq!(SearchQuery::after(date).build(), "after:2026/01/03");
    }
}
