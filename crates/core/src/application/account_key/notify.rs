// Client notification job: relay a stored account key downstream

use crate::application::worker::{JobHandler, JobOutcome};
use crate::domain::{redact_account_key, JobArgs, JobKind};
use crate::port::ClientNotifier;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ClientNotificationHandler {
    notifier: Arc<dyn ClientNotifier>,
}

impl ClientNotificationHandler {
    pub fn new(notifier: Arc<dyn ClientNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl JobHandler for ClientNotificationHandler {
    fn kind(&self) -> JobKind {
        JobKind::SendAccountKeyToClient
    }

    async fn perform(&self, args: &JobArgs, attempt: i32) -> JobOutcome {
        let (email, account_key) = match (args.str_at(0), args.str_at(1)) {
            (Ok(email), Ok(key)) => (email, key),
            (Err(e), _) | (_, Err(e)) => return JobOutcome::FatalFailure(e.to_string()),
        };

        info!(
            account_key = %redact_account_key(account_key),
            attempt,
            "Sending account key to client application for user: {}",
            email
        );

        match self.notifier.send_account_key(email, account_key).await {
            Ok(()) => JobOutcome::Success,
            Err(e) => {
                warn!(email = %email, error = %e, "Client notification failed");
                JobOutcome::RetryableFailure(e.to_string())
            }
        }
    }
}
