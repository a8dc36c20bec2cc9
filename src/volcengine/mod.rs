pub mod extractor;
pub mod poller;
pub mod signer;
pub mod submit;
pub mod transport;

use std::sync::Arc;

use crate::{
    config::VolcengineConfig,
    error::Result,
    models::{GenerationParams, GenerationResult, SubmittedTask},
};

pub use extractor::{extract_image_url, extract_result};
pub use poller::{PollPolicy, TaskPoller};
pub use signer::{Credentials, RequestSigner};
pub use submit::submit_task;
pub use transport::{Action, HttpTaskApi, TaskApi};

/// Model key for Jimeng text-to-image 4.0.
pub const REQ_KEY: &str = "jimeng_t2i_v40";

/// Drives one generation end to end: submit, poll, extract.
#[derive(Clone)]
pub struct ImageClient {
    api: Arc<dyn TaskApi>,
    policy: PollPolicy,
}

impl ImageClient {
    pub fn new(api: Arc<dyn TaskApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn from_config(config: &VolcengineConfig) -> Result<Self> {
        let api = HttpTaskApi::new(config)?;
        Ok(Self::new(Arc::new(api), PollPolicy::from_config(config)))
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn submit(&self, params: &GenerationParams) -> Result<SubmittedTask> {
        submit_task(self.api.as_ref(), params).await
    }

    pub async fn wait_for(&self, task: &SubmittedTask) -> Result<GenerationResult> {
        let payload = TaskPoller::new(self.api.as_ref(), self.policy)
            .poll(&task.task_id)
            .await?;
        extract_result(payload)
    }

    pub async fn generate(&self, params: &GenerationParams) -> Result<GenerationResult> {
        let task = self.submit(params).await?;
        self.wait_for(&task).await
    }
}
