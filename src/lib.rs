//! Backend for the StalkGen meme NFT demo.
//!
//! A prompt comes in over HTTP, is validated, and is submitted to the
//! Volcengine text-to-image API as an asynchronous task. The task is polled
//! at a fixed interval until it succeeds, fails or runs out of attempts, and
//! the resulting image is returned together with NFT metadata for minting.

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod server;
pub mod service;
pub mod test_utils;
pub mod volcengine;

pub use config::{Config, Environment, GenerationLimits, NftMetadataConfig, VolcengineConfig};
pub use error::{Result, StalkgenError};
pub use models::{GenerationParams, GenerationRequest, GenerationResult, SubmittedTask, TaskStatus};
pub use service::{GeneratedMeme, MemeService};
pub use volcengine::{ImageClient, PollPolicy, TaskApi};
