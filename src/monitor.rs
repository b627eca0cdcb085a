//! Monitor loop — periodic polling with crash-safe progress tracking.
//!
//! One logical worker drives everything: build query → fetch candidates →
//! classify → dispatch → record processed → sleep. A message id is
//! recorded after its classify/dispatch attempt completes whether or not
//! delivery succeeded, so a message gets at most one notification attempt
//! ever. Nothing below this loop terminates the process; collaborator
//! failures become log lines and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::classifier::ImportanceCriteria;
use crate::config::MonitorConfig;
use crate::dedup::ProcessedLog;
use crate::error::MailboxError;
use crate::mailbox::{Mailbox, SearchQuery};
use crate::notify::NotificationDispatcher;

/// The polling monitor. Owns the dedup log and the last-check watermark.
pub struct Monitor {
    mailbox: Arc<dyn Mailbox>,
    criteria: ImportanceCriteria,
    dispatcher: NotificationDispatcher,
    processed: ProcessedLog,
    poll_interval: Duration,
    max_per_cycle: usize,
    last_check: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        criteria: ImportanceCriteria,
        dispatcher: NotificationDispatcher,
        processed: ProcessedLog,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            mailbox,
            criteria,
            dispatcher,
            processed,
            poll_interval: config.poll_interval,
            max_per_cycle: config.max_per_cycle,
            last_check: None,
        }
    }

    /// Watermark of the last completed cycle's start time.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    pub fn processed(&self) -> &ProcessedLog {
        &self.processed
    }

    /// Poll forever. Cancellation comes from outside (`tokio::select!`
    /// against ctrl-c in `main`), so the loop itself never returns.
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            max_per_cycle = self.max_per_cycle,
            "Monitor started"
        );
        loop {
            self.run_cycle().await;
            debug!(secs = self.poll_interval.as_secs(), "Sleeping until next cycle");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One poll cycle. The watermark advances to the cycle's *start* time
    /// even when the cycle fails, so a slow cycle cannot lose messages
    /// that arrived while it ran.
    pub async fn run_cycle(&mut self) {
        let cycle_start = Utc::now();
        if let Err(e) = self.check_for_new_messages().await {
            warn!(error = %e, "Mail check failed, retrying next cycle");
        }
        self.last_check = Some(cycle_start);
    }

    fn build_query(&self) -> SearchQuery {
        match self.last_check {
            Some(at) => SearchQuery::after(at.date_naive()).unread(),
            None => SearchQuery::newer_than_days(1).unread(),
        }
    }

    async fn check_for_new_messages(&mut self) -> Result<(), MailboxError> {
        let query = self.build_query().build();
        info!(%query, "Searching mailbox");

        let ids = self.mailbox.search(&query).await?;
        if ids.is_empty() {
            info!("No new messages");
            return Ok(());
        }

        let total = ids.len();
        let mut important = 0usize;

        for id in ids.into_iter().take(self.max_per_cycle) {
            if self.processed.contains(&id) {
                debug!(message_id = %id, "Already processed, skipping");
                continue;
            }

            // One bad message must not abort the cycle.
            match self.process_message(&id).await {
                Ok(true) => important += 1,
                Ok(false) => {}
                Err(e) => warn!(message_id = %id, error = %e, "Message processing failed"),
            }

            // Recorded regardless of outcome: at most one attempt per id.
            if let Err(e) = self.processed.record(&id) {
                error!(message_id = %id, error = %e, "Failed to record processed id");
            }
        }

        info!(important, total, "Cycle complete");
        Ok(())
    }

    /// Fetch, classify, and (if important) dispatch one message. Returns
    /// whether the message classified as important.
    async fn process_message(&self, id: &str) -> Result<bool, MailboxError> {
        let Some(msg) = self.mailbox.get_message(id).await? else {
            debug!(message_id = %id, "Message not retrievable, skipping");
            return Ok(false);
        };

        info!(subject = %msg.subject, sender = %msg.sender, "Processing message");
        if !self.criteria.is_important(&msg) {
            debug!(message_id = %id, "Not flagged as important");
            return Ok(false);
        }

        info!(message_id = %id, subject = %msg.subject, "Important message found");
        if self.dispatcher.dispatch(&msg).await {
            info!(message_id = %id, "Notifications sent");
        } else {
            warn!(message_id = %id, "All notification channels failed");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::ChannelError;
    use crate::mailbox::MailMessage;
    use crate::notify::NotificationChannel;

    struct MockMailbox {
        ids: Vec<String>,
        messages: HashMap<String, MailMessage>,
        queries: Mutex<Vec<String>>,
        fetches: Mutex<Vec<String>>,
    }

    impl MockMailbox {
        fn new(ids: &[&str], messages: Vec<MailMessage>) -> Arc<Self> {
            Arc::new(Self {
                ids: ids.iter().map(|s| s.to_string()).collect(),
                messages: messages.into_iter().map(|m| (m.id.clone(), m)).collect(),
                queries: Mutex::new(Vec::new()),
                fetches: Mutex::new(Vec::new()),
            })
        }

        fn fetched_ids(&self) -> Vec<String> {
            self.fetches.lock().unwrap().clone()
        }

        fn last_query(&self) -> Option<String> {
            self.queries.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Mailbox for MockMailbox {
        async fn search(&self, query: &str) -> Result<Vec<String>, MailboxError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.ids.clone())
        }

        async fn get_message(&self, id: &str) -> Result<Option<MailMessage>, MailboxError> {
            self.fetches.lock().unwrap().push(id.to_string());
            if id == "boom" {
                return Err(MailboxError::Http("fetch exploded".to_string()));
            }
            Ok(self.messages.get(id).cloned())
        }
    }

    struct CountingChannel {
        sends: AtomicUsize,
    }

    impl CountingChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sends: AtomicUsize::new(0),
            })
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _text: &str) -> Result<(), ChannelError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn interview_message(id: &str) -> MailMessage {
        MailMessage::stub(id, "hr@corp.com", "Interview Invitation")
    }

    fn monitor_with(
        mailbox: Arc<MockMailbox>,
        channel: Arc<CountingChannel>,
        dir: &tempfile::TempDir,
    ) -> Monitor {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(channel);
        let processed = ProcessedLog::load(dir.path().join("ids.log")).unwrap();
        let criteria = ImportanceCriteria::new(&[], &["interview"], &[], &[]);
        let config = MonitorConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        Monitor::new(mailbox, criteria, dispatcher, processed, &config)
    }

    #[tokio::test]
    async fn first_cycle_queries_last_day_unread() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(&[], vec![]);
        let mut monitor = monitor_with(mailbox.clone(), CountingChannel::new(), &dir);

        monitor.run_cycle().await;
        assert_eq!(mailbox.last_query().unwrap(), "newer_than:1d is:unread");
    }

    #[tokio::test]
    async fn later_cycles_query_after_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(&[], vec![]);
        let mut monitor = monitor_with(mailbox.clone(), CountingChannel::new(), &dir);

        monitor.run_cycle().await;
        monitor.run_cycle().await;

        let query = mailbox.last_query().unwrap();
        assert!(query.starts_with("after:"), "got {query}");
        assert!(query.ends_with("is:unread"));
    }

    #[tokio::test]
    async fn processed_ids_are_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(&["m1"], vec![interview_message("m1")]);
        let channel = CountingChannel::new();
        let mut monitor = monitor_with(mailbox.clone(), channel.clone(), &dir);

        monitor.run_cycle().await;
        monitor.run_cycle().await;

        // Fetched and dispatched once; second cycle skipped it entirely.
        assert_eq!(mailbox.fetched_ids(), vec!["m1"]);
        assert_eq!(channel.sends(), 1);
    }

    #[tokio::test]
    async fn bad_message_does_not_abort_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(&["boom", "m2"], vec![interview_message("m2")]);
        let channel = CountingChannel::new();
        let mut monitor = monitor_with(mailbox.clone(), channel.clone(), &dir);

        monitor.run_cycle().await;

        assert_eq!(mailbox.fetched_ids(), vec!["boom", "m2"]);
        assert_eq!(channel.sends(), 1);
        // The failed id was still marked processed: one attempt only, ever.
        assert!(monitor.processed().contains("boom"));
        assert!(monitor.processed().contains("m2"));
    }

    #[tokio::test]
    async fn unimportant_messages_are_recorded_without_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(
            &["m1"],
            vec![MailMessage::stub("m1", "news@letter.com", "Weekly digest")],
        );
        let channel = CountingChannel::new();
        let mut monitor = monitor_with(mailbox, channel.clone(), &dir);

        monitor.run_cycle().await;
        assert_eq!(channel.sends(), 0);
        assert!(monitor.processed().contains("m1"));
    }

    #[tokio::test]
    async fn cycle_respects_max_per_cycle_bound() {
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<String> = (0..25).map(|i| format!("m{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mailbox = MockMailbox::new(&id_refs, vec![]);
        let mut monitor = monitor_with(mailbox.clone(), CountingChannel::new(), &dir);

        monitor.run_cycle().await;
        assert_eq!(mailbox.fetched_ids().len(), 10);
    }

    #[tokio::test]
    async fn watermark_advances_even_when_search_fails() {
        struct FailingMailbox;

        #[async_trait]
        impl Mailbox for FailingMailbox {
            async fn search(&self, _query: &str) -> Result<Vec<String>, MailboxError> {
                Err(MailboxError::Http("down".to_string()))
            }

            async fn get_message(&self, _id: &str) -> Result<Option<MailMessage>, MailboxError> {
                Ok(None)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let processed = ProcessedLog::load(dir.path().join("ids.log")).unwrap();
        let config = MonitorConfig::default();
        let mut monitor = Monitor::new(
            Arc::new(FailingMailbox),
            ImportanceCriteria::empty(),
            NotificationDispatcher::new(),
            processed,
            &config,
        );

        assert!(monitor.last_check().is_none());
        let before = Utc::now();
        monitor.run_cycle().await;
        let watermark = monitor.last_check().unwrap();
        assert!(watermark >= before && watermark <= Utc::now());
    }
}
