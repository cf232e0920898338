//! Backfill sweep: re-enqueues acquisition for users still missing a key

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::Pipeline;
use keyrelay_core::application::MissingAccountKeySweep;
use keyrelay_core::domain::{JobKind, JobState, UserId};
use keyrelay_core::port::key_fetcher::mocks::MockKeyFetcher;
use keyrelay_core::port::{KeyFetchError, KeyFetcher};

/// Derives a distinct key from each user id
struct PerUserFetcher;

#[async_trait]
impl KeyFetcher for PerUserFetcher {
    async fn fetch_account_key(&self, user_id: &UserId) -> Result<Option<String>, KeyFetchError> {
        Ok(Some(format!("tok-{}", user_id)))
    }
}

async fn seed_pending(p: &Pipeline, count: usize) -> Vec<UserId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        ids.push(p.seed_user(&format!("user{:03}", i), None).await.id);
    }
    ids
}

fn queued_fetch_targets(jobs: &[keyrelay_core::domain::Job]) -> Vec<String> {
    let mut targets: Vec<String> = jobs
        .iter()
        .filter(|j| j.kind == JobKind::FetchAccountKey)
        .map(|j| j.args.str_at(0).unwrap().to_string())
        .collect();
    targets.sort();
    targets
}

#[tokio::test]
async fn test_sweep_job_enqueues_at_most_one_hundred() {
    let p = Pipeline::new(MockKeyFetcher::new_unavailable()).await;
    let ids = seed_pending(&p, 150).await;

    p.queue.enqueue_fix_missing_account_keys().await.unwrap();
    assert!(p.worker().process_next_job().await.unwrap());

    let queued = p.jobs_in_state(JobState::Queued).await;
    assert_eq!(queued.len(), 100);

    // Oldest users first
    assert_eq!(queued_fetch_targets(&queued), ids[..100].to_vec());

    let done = p.jobs_in_state(JobState::Done).await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].kind, JobKind::FixMissingAccountKeys);
}

#[tokio::test]
async fn test_repeated_sweeps_select_same_users() {
    let p = Pipeline::new(MockKeyFetcher::new_unavailable()).await;
    seed_pending(&p, 5).await;
    p.seed_user("keyed", Some("tok-existing")).await;
    let sweep = MissingAccountKeySweep::new(p.users.clone(), p.queue.clone());

    assert_eq!(sweep.sweep().await.unwrap(), 5);
    let first = queued_fetch_targets(&p.jobs_in_state(JobState::Queued).await);

    assert_eq!(sweep.sweep().await.unwrap(), 5);
    let all = queued_fetch_targets(&p.jobs_in_state(JobState::Queued).await);

    assert_eq!(all.len(), 10);
    assert!(!all.contains(&"keyed".to_string()));
    let mut doubled: Vec<String> = first.iter().flat_map(|id| [id.clone(), id.clone()]).collect();
    doubled.sort();
    assert_eq!(all, doubled);
}

#[tokio::test]
async fn test_sweeps_eventually_cover_every_user() {
    let p = Pipeline::with_fetcher(Arc::new(PerUserFetcher)).await;
    let ids = seed_pending(&p, 150).await;
    let sweep = MissingAccountKeySweep::new(p.users.clone(), p.queue.clone());

    assert_eq!(sweep.sweep().await.unwrap(), 100);
    p.drain().await;
    assert_eq!(sweep.sweep().await.unwrap(), 50);
    p.drain().await;
    assert_eq!(sweep.sweep().await.unwrap(), 0);

    for id in &ids {
        let user = p.user(id).await;
        assert_eq!(user.account_key, Some(format!("tok-{}", id)));
    }
    assert_eq!(p.notifier.deliveries().len(), 150);
}

#[tokio::test]
async fn test_duplicate_jobs_after_sweep_are_absorbed() {
    let p = Pipeline::with_fetcher(Arc::new(PerUserFetcher)).await;
    let u1 = p.seed_user("u1", None).await;

    // Registration job plus a sweep that ran before it completed
    p.queue.enqueue_fetch_account_key(&u1.id).await.unwrap();
    let sweep = MissingAccountKeySweep::new(p.users.clone(), p.queue.clone());
    assert_eq!(sweep.sweep().await.unwrap(), 1);

    p.drain().await;

    assert_eq!(p.user("u1").await.account_key.as_deref(), Some("tok-u1"));
    assert_eq!(p.notifier.deliveries().len(), 1);
    assert!(p.exhaustion.records().is_empty());
}
