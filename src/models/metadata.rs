use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Creator, NftMetadataConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: String,
}

/// Off-chain NFT metadata handed to the minting flow alongside the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<NftAttribute>,
    pub external_url: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
}

impl NftMetadata {
    pub fn build(
        config: &NftMetadataConfig,
        image_url: &str,
        prompt: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let timestamp = created_at.timestamp().to_string();

        Self {
            name: format!("{} #{}", config.name_prefix, timestamp),
            description: format!("A meme generated from prompt: {}", prompt),
            image: image_url.to_string(),
            attributes: vec![
                NftAttribute {
                    trait_type: "Meme Type".to_string(),
                    value: "Generated".to_string(),
                },
                NftAttribute {
                    trait_type: "Timestamp".to_string(),
                    value: timestamp,
                },
                NftAttribute {
                    trait_type: "Prompt".to_string(),
                    value: prompt.to_string(),
                },
            ],
            external_url: config.external_url.clone(),
            seller_fee_basis_points: config.seller_fee_basis_points,
            creators: config.creators.clone(),
        }
    }
}
