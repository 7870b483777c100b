use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ModerationError;
use crate::models::{ModerationAction, ModerationOutcome, ReportTarget};
use crate::notifications::{Dispatcher, PushNotification};
use crate::storage::CommunityStore;

/// A user whose cumulative BLOCK count reaches this threshold (counting the
/// action just recorded) is notified.
pub const BLOCK_NOTIFICATION_THRESHOLD: i64 = 3;

const BLOCKED_TITLE: &str = "Blocked";
const BLOCKED_BODY: &str = "You have been blocked from using the Car Community!";

/// Processes moderator decisions against reported posts and comments:
/// closes out pending reports, audits the decision, blocks content, and
/// escalates repeat offenders to a push notification.
pub struct ReportModerator<S: CommunityStore> {
    store: Arc<S>,
    dispatcher: Dispatcher,
}

impl<S: CommunityStore> ReportModerator<S> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Resolves every pending report against the target with one decision.
    ///
    /// Validation happens before any mutation. The conditional
    /// mark-processed update is the only concurrency guard: when it affects
    /// zero rows another moderator already owns the target, and this call
    /// becomes an idempotent no-op instead of writing a second audit row.
    pub async fn resolve_report(
        &self,
        action: &str,
        comment_id: Option<i32>,
        post_id: Option<i32>,
        acting_user_id: i32,
    ) -> ModerationOutcome {
        match self
            .try_resolve(action, comment_id, post_id, acting_user_id)
            .await
        {
            Ok(()) => ModerationOutcome::success(),
            Err(err) => ModerationOutcome::failure(err.to_string()),
        }
    }

    async fn try_resolve(
        &self,
        action: &str,
        comment_id: Option<i32>,
        post_id: Option<i32>,
        acting_user_id: i32,
    ) -> Result<(), ModerationError> {
        let action: ModerationAction = action.parse()?;
        let target = ReportTarget::from_ids(comment_id, post_id)?;

        let processed = self.store.mark_reports_processed(target).await?;
        if processed == 0 {
            // Lost the race (or nothing was pending): the winning moderator
            // already audited this target.
            debug!(?target, "no pending reports to process");
            return Ok(());
        }

        let reported_user_id = self
            .store
            .resolve_owning_user(target)
            .await?
            .ok_or(ModerationError::TargetNotFound)?;

        self.store
            .insert_report_action(reported_user_id, acting_user_id, action, Utc::now())
            .await?;

        if action == ModerationAction::Block {
            self.store.block_content(target).await?;

            // Count taken after the insert, so the decision just recorded
            // counts toward the threshold.
            let block_count = self.store.count_block_actions(reported_user_id).await?;
            if block_count >= BLOCK_NOTIFICATION_THRESHOLD {
                match self.store.lookup_device_token(reported_user_id).await? {
                    Some(token) if !token.trim().is_empty() => {
                        info!(
                            reported_user_id,
                            block_count, "escalating repeat offender to push notification"
                        );
                        self.dispatcher.dispatch(PushNotification {
                            device_token: token,
                            title: BLOCKED_TITLE.to_string(),
                            body: BLOCKED_BODY.to_string(),
                        });
                    }
                    // No registered device is not an error.
                    _ => debug!(reported_user_id, "no device token, skipping notification"),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchPost;
    use crate::notifications::PushSender;
    use crate::storage::MemoryStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    struct RecordingSender {
        sent: Mutex<Vec<PushNotification>>,
    }

    impl RecordingSender {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PushSender for RecordingSender {
        async fn send(&self, notification: &PushNotification) -> bool {
            self.sent.lock().unwrap().push(notification.clone());
            true
        }
    }

    fn post(id: i32, title: &str, description: &str) -> SearchPost {
        SearchPost {
            id,
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    fn moderator_over(
        store: &MemoryStore,
    ) -> (ReportModerator<MemoryStore>, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::new());
        let dispatcher = Dispatcher::new(sender.clone());
        (
            ReportModerator::new(Arc::new(store.clone()), dispatcher),
            sender,
        )
    }

    #[tokio::test]
    async fn rejects_contradictory_targets_without_writing() -> Result<()> {
        let store = MemoryStore::new();
        store.file_report(ReportTarget::Post(1));
        let (moderator, sender) = moderator_over(&store);

        let both = moderator.resolve_report("block", Some(1), Some(2), 99).await;
        assert!(!both.succeeded);
        let neither = moderator.resolve_report("block", None, None, 99).await;
        assert!(!neither.succeeded);

        assert!(store.report_actions().is_empty());
        assert_eq!(store.count_pending_reports(ReportTarget::Post(1)).await?, 1);
        assert_eq!(sender.sent_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_action_without_writing() -> Result<()> {
        let store = MemoryStore::new();
        store.file_report(ReportTarget::Post(1));
        let (moderator, _sender) = moderator_over(&store);

        let outcome = moderator.resolve_report("purge", None, Some(1), 99).await;
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("valid action"));
        assert!(store.report_actions().is_empty());
        assert_eq!(store.count_pending_reports(ReportTarget::Post(1)).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn blocking_resolves_reports_audits_and_hides_content() -> Result<()> {
        let store = MemoryStore::new();
        store.add_post(post(1, "Brake pads", "squeaky"), 10);
        store.file_report(ReportTarget::Post(1));
        store.file_report(ReportTarget::Post(1));
        let (moderator, _sender) = moderator_over(&store);

        let outcome = moderator.resolve_report("block", None, Some(1), 99).await;
        assert!(outcome.succeeded, "{}", outcome.message);

        assert_eq!(store.count_pending_reports(ReportTarget::Post(1)).await?, 0);
        let actions = store.report_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].reported_user_id, 10);
        assert_eq!(actions[0].acting_user_id, 99);
        assert_eq!(actions[0].action, ModerationAction::Block);
        assert!(store.is_blocked(ReportTarget::Post(1)));
        Ok(())
    }

    #[tokio::test]
    async fn allowing_leaves_content_visible() -> Result<()> {
        let store = MemoryStore::new();
        store.add_comment(7, 11);
        store.file_report(ReportTarget::Comment(7));
        let (moderator, sender) = moderator_over(&store);

        let outcome = moderator.resolve_report("allow", Some(7), None, 99).await;
        assert!(outcome.succeeded);

        let actions = store.report_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ModerationAction::Allow);
        assert!(!store.is_blocked(ReportTarget::Comment(7)));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.sent_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_owner_fails_after_resolution() -> Result<()> {
        let store = MemoryStore::new();
        store.file_report(ReportTarget::Post(1));
        let (moderator, _sender) = moderator_over(&store);

        let outcome = moderator.resolve_report("block", None, Some(1), 99).await;
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("no owning user"));
        assert!(store.report_actions().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_resolution_audits_once() -> Result<()> {
        let store = MemoryStore::new();
        store.add_post(post(1, "Brake pads", "squeaky"), 10);
        store.file_report(ReportTarget::Post(1));
        let (first, _s1) = moderator_over(&store);
        let (second, _s2) = moderator_over(&store);

        let (a, b) = tokio::join!(
            first.resolve_report("block", None, Some(1), 98),
            second.resolve_report("block", None, Some(1), 99)
        );
        assert!(a.succeeded && b.succeeded);
        assert_eq!(store.report_actions().len(), 1, "never two audit rows");
        Ok(())
    }

    #[tokio::test]
    async fn notifies_only_at_the_block_threshold() -> Result<()> {
        let store = MemoryStore::new();
        store.set_device_token(10, "device-token-10");
        for post_id in 1..=4 {
            store.add_post(post(post_id, "spam", "spam"), 10);
            store.file_report(ReportTarget::Post(post_id));
        }
        let (moderator, sender) = moderator_over(&store);

        for post_id in 1..=2 {
            let outcome = moderator
                .resolve_report("block", None, Some(post_id), 99)
                .await;
            assert!(outcome.succeeded);
        }
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.sent_count(), 0, "below threshold, no escalation");

        let outcome = moderator.resolve_report("block", None, Some(3), 99).await;
        assert!(outcome.succeeded);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.sent_count(), 1, "third block escalates exactly once");

        let notification = sender.sent.lock().unwrap()[0].clone();
        assert_eq!(notification.device_token, "device-token-10");
        assert_eq!(notification.title, "Blocked");
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_blank_device_token_skips_notification() -> Result<()> {
        let store = MemoryStore::new();
        for post_id in 1..=3 {
            store.add_post(post(post_id, "spam", "spam"), 10);
            store.file_report(ReportTarget::Post(post_id));
        }
        let (moderator, sender) = moderator_over(&store);

        for post_id in 1..=2 {
            moderator
                .resolve_report("block", None, Some(post_id), 99)
                .await;
        }
        // Threshold crossed with a blank token: silently skipped, no error.
        store.set_device_token(10, "   ");
        let outcome = moderator.resolve_report("block", None, Some(3), 99).await;
        assert!(outcome.succeeded);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.sent_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn already_processed_target_is_an_idempotent_noop() -> Result<()> {
        let store = MemoryStore::new();
        store.add_post(post(1, "Brake pads", "squeaky"), 10);
        store.file_report(ReportTarget::Post(1));
        let (moderator, _sender) = moderator_over(&store);

        let first = moderator.resolve_report("block", None, Some(1), 99).await;
        let again = moderator.resolve_report("block", None, Some(1), 99).await;
        assert!(first.succeeded && again.succeeded);
        assert_eq!(store.report_actions().len(), 1);
        Ok(())
    }
}
