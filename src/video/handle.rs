use snafu::ResultExt;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

use super::{
    model::Operation, ClientSnafu, Error, MissingVideosSnafu, OperationFailedSnafu,
    TimeoutSnafu,
};
use crate::{auth::Credentials, client::VeoClient};

/// Wait between two status fetches when none is set.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock budget for [`OperationHandle::wait_until_done`] when none is set.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// A handle for monitoring a video generation operation.
///
/// The operation name is fixed at construction; every fetch targets the same name and
/// returns a fresh [`Operation`] snapshot.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    client: Arc<VeoClient>,
    name: String,
    poll_interval: Duration,
    deadline: Duration,
}

impl OperationHandle {
    pub(crate) fn new(client: Arc<VeoClient>, name: String) -> Self {
        Self {
            client,
            name,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fetches the current state of the operation once.
    pub async fn fetch(&self, credentials: &Credentials) -> Result<Operation, Error> {
        self.client
            .fetch_predict_operation(credentials, &self.name)
            .await
            .map_err(Box::new)
            .context(ClientSnafu)
    }

    /// Polls until the operation is done and carries at least one video.
    ///
    /// Transport errors abort immediately. The deadline covers the whole wait,
    /// including a request that is still in flight when it expires.
    #[instrument(skip_all, fields(
        operation.name = %self.name,
        project = %credentials.project_id(),
        location = %self.client.location,
        poll.interval.secs = self.poll_interval.as_secs(),
        deadline.secs = self.deadline.as_secs(),
    ))]
    pub async fn wait_until_done(&self, credentials: &Credentials) -> Result<Operation, Error> {
        match tokio::time::timeout(self.deadline, self.poll_until_done(credentials)).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu {
                name: self.name.clone(),
                waited: self.deadline,
            }
            .fail(),
        }
    }

    async fn poll_until_done(&self, credentials: &Credentials) -> Result<Operation, Error> {
        let mut polls: u32 = 0;
        loop {
            let operation = self.fetch(credentials).await?;
            polls += 1;

            if operation.done {
                info!(polls, "operation finished");
                return self.check_completed(operation);
            }

            debug!(polls, "operation still running");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn check_completed(&self, operation: Operation) -> Result<Operation, Error> {
        if let Some(error) = &operation.error {
            return OperationFailedSnafu {
                name: self.name.clone(),
                code: error.code,
                message: error.message.clone(),
            }
            .fail();
        }

        if operation.videos().is_empty() {
            let response = operation.response.as_ref();
            return MissingVideosSnafu {
                name: self.name.clone(),
                filtered: response.and_then(|response| response.rai_media_filtered_count),
                reasons: response
                    .and_then(|response| response.rai_media_filtered_reasons.clone())
                    .unwrap_or_default(),
            }
            .fail();
        }

        Ok(operation)
    }
}
