// Refresh cycle end to end against in-process fakes:
//  - a 3-identity batch is forged, cached, published and announced
//  - concurrent callers share one cycle
//  - abort paths leave the cache untouched and send an error alert
//  - downstream failures are recorded without dropping the batch

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;

    use crate::identity::IdentityProvider;
    use crate::refresh::{RefreshResult, RefreshStage};
    use crate::tests::common::{
        identities, orchestrator, test_forger, RecordingNotifier, RecordingPublisher, StaticProvider,
        TEST_VALIDITY_SECONDS,
    };
    use crate::token::claims::{TokenHeader, ALGORITHM, RELEASE_VERSION, TOKEN_TYPE};
    use crate::token::SignedToken;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn three_identities_are_forged_cached_published_and_announced() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("generated_tokens.json");
        let publisher = Arc::new(RecordingPublisher::new(true));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(StaticProvider::ok("local", identities(&["101", "102", "103"])));
        let orch = orchestrator(vec![provider], &cache_path, publisher.clone(), notifier.clone());

        let result = orch.refresh().await;

        assert_eq!(result.stage, RefreshStage::Done);
        assert!(result.is_success() && result.is_complete());
        assert_eq!(result.token_count, 3);
        assert!(result.persisted && result.published && result.notified);
        assert_eq!(result.error, None);
        assert_eq!(orch.stage(), RefreshStage::Done);

        // cache, store and webhook all saw the same batch
        let cached = orch.cache().load().await.unwrap();
        assert_eq!(cached.len(), 3);
        assert_eq!(publisher.published(), vec![cached.clone()]);
        assert_eq!(notifier.batch_sizes(), vec![3]);
        assert!(notifier.error_messages().is_empty());

        // tokens keep input order, verify, and share one issue time
        let forger = test_forger();
        let decoded: Vec<_> = cached.iter().map(|t| forger.decode(&t.token).unwrap()).collect();
        let uids: Vec<i64> = decoded.iter().map(|(_, p)| p.external_uid).collect();
        assert_eq!(uids, vec![101, 102, 103]);

        let issued_at = decoded[0].1.lock_region_time;
        for (header, payload) in &decoded {
            assert_eq!(header, &TokenHeader::new("1"));
            assert_eq!(header.alg, ALGORITHM);
            assert_eq!(header.typ, TOKEN_TYPE);
            assert_eq!(header.ver, RELEASE_VERSION);
            assert_eq!(payload.lock_region_time, issued_at);
            assert_eq!(payload.exp - payload.lock_region_time, TEST_VALIDITY_SECONDS as i64);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_share_one_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::new(true));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let slow = Arc::new(
            StaticProvider::ok("local", identities(&["1", "2"])).with_delay(Duration::from_millis(300)),
        );
        let tier: Arc<dyn IdentityProvider> = slow.clone();
        let orch = orchestrator(
            vec![tier],
            &dir.path().join("tokens.json"),
            publisher.clone(),
            notifier.clone(),
        );

        let results: Vec<RefreshResult> = join_all((0..5).map(|_| {
            let orch = orch.clone();
            async move { orch.refresh().await }
        }))
        .await;

        assert_eq!(slow.calls(), 1, "identity source must be read once");
        assert_eq!(publisher.published().len(), 1);
        assert_eq!(notifier.batch_sizes(), vec![2]);
        assert!(results.iter().all(|r| r == &results[0]), "every caller gets the same result");

        // once finished, the next call runs a fresh cycle
        let next = orch.refresh().await;
        assert!(next.is_success());
        assert_eq!(slow.calls(), 2);
        assert_eq!(publisher.published().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stage_moves_through_loading_while_cycle_runs() {
        let dir = tempfile::tempdir().unwrap();
        let slow = Arc::new(
            StaticProvider::ok("local", identities(&["7"])).with_delay(Duration::from_millis(300)),
        );
        let tier: Arc<dyn IdentityProvider> = slow;
        let orch = orchestrator(
            vec![tier],
            &dir.path().join("tokens.json"),
            Arc::new(RecordingPublisher::new(true)),
            Arc::new(RecordingNotifier::new(true)),
        );
        assert_eq!(orch.stage(), RefreshStage::Idle);

        let mut stages = orch.subscribe_stage();
        let running = tokio::spawn({
            let orch = orch.clone();
            async move { orch.refresh().await }
        });
        stages
            .wait_for(|stage| *stage == RefreshStage::Loading)
            .await
            .unwrap();

        let result = running.await.unwrap();
        assert_eq!(result.stage, RefreshStage::Done);
        assert_eq!(orch.stage(), RefreshStage::Done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wait_idle_lets_running_cycle_finish_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::new(true));
        let slow = Arc::new(
            StaticProvider::ok("local", identities(&["7", "8"])).with_delay(Duration::from_millis(300)),
        );
        let tier: Arc<dyn IdentityProvider> = slow;
        let orch = orchestrator(
            vec![tier],
            &dir.path().join("tokens.json"),
            publisher.clone(),
            Arc::new(RecordingNotifier::new(true)),
        );
        assert!(orch.wait_idle(Duration::from_millis(1)).await);

        let mut stages = orch.subscribe_stage();
        // the caller goes away, the cycle keeps running on its own task
        let caller = tokio::spawn({
            let orch = orch.clone();
            async move { orch.refresh().await }
        });
        stages
            .wait_for(|stage| *stage == RefreshStage::Loading)
            .await
            .unwrap();
        caller.abort();

        assert!(!orch.wait_idle(Duration::from_millis(10)).await);
        assert!(orch.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(publisher.published().len(), 1);
        assert_eq!(publisher.published()[0].len(), 2);
        assert_eq!(orch.stage(), RefreshStage::Done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn all_tiers_failing_aborts_and_keeps_previous_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("tokens.json");
        let previous = vec![SignedToken::new("previous".to_string())];
        std::fs::write(&cache_path, serde_json::to_string(&previous).unwrap()).unwrap();

        let publisher = Arc::new(RecordingPublisher::new(true));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let orch = orchestrator(
            vec![
                Arc::new(StaticProvider::failing("local")),
                Arc::new(StaticProvider::failing("remote")),
                Arc::new(StaticProvider::failing("embedded")),
            ],
            &cache_path,
            publisher.clone(),
            notifier.clone(),
        );

        let result = orch.refresh().await;

        assert_eq!(result.stage, RefreshStage::Aborted);
        assert!(!result.is_success());
        assert_eq!(result.token_count, 0);
        assert!(!result.published && !result.persisted);
        assert!(result.notified, "the error alert was delivered");
        assert!(result.error.as_deref().unwrap().contains("identity source unavailable"));

        assert_eq!(orch.cache().load().await.unwrap(), previous);
        assert!(publisher.published().is_empty());
        assert!(notifier.batch_sizes().is_empty());
        let alerts = notifier.error_messages();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("Token refresh failed:"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn malformed_identity_aborts_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("tokens.json");
        let publisher = Arc::new(RecordingPublisher::new(true));
        let notifier = Arc::new(RecordingNotifier::new(false));
        let orch = orchestrator(
            vec![Arc::new(StaticProvider::ok("local", identities(&["1", "not-a-number", "3"])))],
            &cache_path,
            publisher.clone(),
            notifier.clone(),
        );

        let result = orch.refresh().await;

        assert_eq!(result.stage, RefreshStage::Aborted);
        assert!(!result.notified, "alert delivery failure is reported, not hidden");
        assert!(result.error.as_deref().unwrap().contains("not-a-number"));
        assert!(!cache_path.exists());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn empty_batch_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new(true));
        let orch = orchestrator(
            vec![Arc::new(StaticProvider::ok("local", Vec::new()))],
            &dir.path().join("tokens.json"),
            Arc::new(RecordingPublisher::new(true)),
            notifier.clone(),
        );

        let result = orch.refresh().await;

        assert_eq!(result.stage, RefreshStage::Aborted);
        assert_eq!(notifier.error_messages().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_store_does_not_cancel_notification() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::new(false));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let orch = orchestrator(
            vec![Arc::new(StaticProvider::ok("local", identities(&["5", "6"])))],
            &dir.path().join("tokens.json"),
            publisher.clone(),
            notifier.clone(),
        );

        let result = orch.refresh().await;

        assert!(result.is_success(), "cycle completes");
        assert!(!result.is_complete());
        assert_eq!(result.token_count, 2);
        assert!(result.persisted);
        assert!(!result.published);
        assert!(result.notified);
        assert_eq!(notifier.batch_sizes(), vec![2]);
        assert_eq!(orch.cache().load().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unwritable_cache_is_recorded_and_batch_still_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the cache directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let publisher = Arc::new(RecordingPublisher::new(true));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let orch = orchestrator(
            vec![Arc::new(StaticProvider::ok("local", identities(&["9"])))],
            &blocker.join("tokens.json"),
            publisher.clone(),
            notifier.clone(),
        );

        let result = orch.refresh().await;

        assert_eq!(result.stage, RefreshStage::Done);
        assert!(!result.persisted);
        assert!(result.error.as_deref().unwrap().contains("token cache io"));
        assert!(result.published && result.notified);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn later_tier_is_used_when_first_fails() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::new(true));
        let fallback = Arc::new(StaticProvider::ok("embedded", identities(&["11", "12", "13", "14"])));
        let tiers: Vec<Arc<dyn IdentityProvider>> =
            vec![Arc::new(StaticProvider::failing("local")), fallback.clone()];
        let orch = orchestrator(
            tiers,
            &dir.path().join("tokens.json"),
            publisher.clone(),
            Arc::new(RecordingNotifier::new(true)),
        );

        let result = orch.refresh().await;

        assert!(result.is_success());
        assert_eq!(result.token_count, 4);
        assert_eq!(fallback.calls(), 1);
    }
}
