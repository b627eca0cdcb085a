//! Importance classifier — ordered pattern groups over message fields.
//!
//! Group order: sender → subject → body → keyword (keyword patterns check
//! subject *and* body). First match wins; a message only needs to satisfy
//! one rule anywhere. Empty groups never match. The whole thing is pure —
//! same message and criteria always give the same answer.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::{env_flag, env_list};
use crate::mailbox::MailMessage;

/// Label that marks provider-flagged priority mail.
const PRIORITY_LABEL: &str = "IMPORTANT";

/// One compiled importance pattern.
///
/// Patterns are matched case-insensitively as regexes; a pattern that does
/// not compile is demoted to an escaped literal, so plain substrings work
/// without escaping.
#[derive(Debug, Clone)]
pub struct ImportanceRule {
    /// Original pattern text, kept for logging.
    pub pattern: String,
    regex: Regex,
}

impl ImportanceRule {
    pub fn compile(pattern: &str) -> Self {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| {
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
                    .expect("escaped literal always compiles")
            });
        Self {
            pattern: pattern.to_string(),
            regex,
        }
    }

    fn matches(&self, field: &str) -> bool {
        self.regex.is_match(field)
    }
}

/// Ordered importance criteria. Loaded once, read-only at runtime.
#[derive(Debug, Clone, Default)]
pub struct ImportanceCriteria {
    sender_rules: Vec<ImportanceRule>,
    subject_rules: Vec<ImportanceRule>,
    body_rules: Vec<ImportanceRule>,
    keyword_rules: Vec<ImportanceRule>,
    /// Also accept messages the provider itself flagged as priority.
    match_priority_label: bool,
}

impl ImportanceCriteria {
    /// Empty criteria — nothing matches (for testing).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        senders: &[&str],
        subjects: &[&str],
        bodies: &[&str],
        keywords: &[&str],
    ) -> Self {
        Self {
            sender_rules: compile_all(senders),
            subject_rules: compile_all(subjects),
            body_rules: compile_all(bodies),
            keyword_rules: compile_all(keywords),
            match_priority_label: false,
        }
    }

    pub fn with_priority_label(mut self, enabled: bool) -> Self {
        self.match_priority_label = enabled;
        self
    }

    /// Default criteria — the job-search rule set.
    pub fn default_rules() -> Self {
        Self::new(
            &[r"noreply@linkedin\.com", r"jobs@indeed\.com"],
            &[
                "job application",
                "interview",
                "resume",
                "cover letter",
                "position",
                "opportunity",
                "hiring",
                "recruiter",
                "offer",
                "application status",
            ],
            &[],
            &[
                "job application",
                "interview",
                "recruiter",
                "offer",
                "application status",
            ],
        )
    }

    /// Build criteria from `MONITOR_IMPORTANT_SENDERS` / `_SUBJECTS` /
    /// `_BODIES` / `_KEYWORDS` (comma-separated). With none of them set,
    /// falls back to `default_rules`.
    pub fn from_env() -> Self {
        let senders = env_list("MONITOR_IMPORTANT_SENDERS");
        let subjects = env_list("MONITOR_IMPORTANT_SUBJECTS");
        let bodies = env_list("MONITOR_IMPORTANT_BODIES");
        let keywords = env_list("MONITOR_IMPORTANT_KEYWORDS");
        let priority = env_flag("MONITOR_MATCH_PRIORITY_LABEL");

        if senders.is_empty() && subjects.is_empty() && bodies.is_empty() && keywords.is_empty() {
            return Self::default_rules().with_priority_label(priority);
        }

        Self {
            sender_rules: senders.iter().map(|p| ImportanceRule::compile(p)).collect(),
            subject_rules: subjects.iter().map(|p| ImportanceRule::compile(p)).collect(),
            body_rules: bodies.iter().map(|p| ImportanceRule::compile(p)).collect(),
            keyword_rules: keywords.iter().map(|p| ImportanceRule::compile(p)).collect(),
            match_priority_label: priority,
        }
    }

    /// Total number of compiled rules across all groups.
    pub fn rule_count(&self) -> usize {
        self.sender_rules.len()
            + self.subject_rules.len()
            + self.body_rules.len()
            + self.keyword_rules.len()
    }

    /// Evaluate a message. Returns true on the first matching rule group.
    pub fn is_important(&self, msg: &MailMessage) -> bool {
        for rule in &self.sender_rules {
            if rule.matches(&msg.sender) {
                debug!(pattern = %rule.pattern, sender = %msg.sender, "Sender rule matched");
                return true;
            }
        }
        for rule in &self.subject_rules {
            if rule.matches(&msg.subject) {
                debug!(pattern = %rule.pattern, subject = %msg.subject, "Subject rule matched");
                return true;
            }
        }
        for rule in &self.body_rules {
            if rule.matches(&msg.body) {
                debug!(pattern = %rule.pattern, "Body rule matched");
                return true;
            }
        }
        for rule in &self.keyword_rules {
            if rule.matches(&msg.subject) || rule.matches(&msg.body) {
                debug!(pattern = %rule.pattern, "Keyword rule matched");
                return true;
            }
        }
        if self.match_priority_label && msg.labels.contains(PRIORITY_LABEL) {
            debug!("Provider priority label matched");
            return true;
        }
        false
    }
}

fn compile_all(patterns: &[&str]) -> Vec<ImportanceRule> {
    patterns.iter().map(|p| ImportanceRule::compile(p)).collect()
}
