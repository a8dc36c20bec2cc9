use std::sync::Arc;
use std::time::Duration;

use stalkgen::{
    config::{GenerationLimits, NftMetadataConfig},
    test_utils::ScriptedApi,
    volcengine::{ImageClient, PollPolicy},
    MemeService,
};

/// A service wired to `provider` with a 1 ms poll interval.
pub fn service_with(provider: Arc<ScriptedApi>, max_attempts: u32) -> MemeService {
    MemeService::new(
        ImageClient::new(
            provider,
            PollPolicy::new(Duration::from_millis(1), max_attempts),
        ),
        GenerationLimits::default(),
        NftMetadataConfig::default(),
    )
}
