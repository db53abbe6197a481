//! Mirror node REST client, used to find the highest NFT serial that has
//! not been burned.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::ids::EntityId;
use crate::ledger::{LedgerError, SerialHistory};
use crate::network::Network;

const PAGE_SIZE: u32 = 25;
/// Pages followed before giving up on a collection whose newest NFTs are
/// all burned.
const MAX_PAGES: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorNft {
    pub serial_number: i64,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
struct NftPage {
    #[serde(default)]
    nfts: Vec<MirrorNft>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

pub struct MirrorNodeClient {
    client: Client,
    base_url: String,
}

impl MirrorNodeClient {
    /// Client for the public mirror node of `network`.
    pub fn new(network: Network) -> Self {
        Self::with_base_url(network.mirror_node_url())
    }

    /// Client for a custom mirror node (self-hosted, or a test server).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, path: &str) -> Result<NftPage, LedgerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "fetching NFT page from mirror node");

        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LedgerError::Network(format!("mirror node returned {status}")));
        }
        if !status.is_success() {
            return Err(LedgerError::rejected(format!("MIRROR_NODE_HTTP_{}", status.as_u16())));
        }

        response
            .json::<NftPage>()
            .await
            .map_err(|e| LedgerError::Sdk(format!("failed to parse mirror node response: {e}")))
    }
}

#[async_trait]
impl SerialHistory for MirrorNodeClient {
    async fn latest_serial(&self, token: EntityId) -> Result<Option<i64>, LedgerError> {
        let mut path = format!("/api/v1/tokens/{token}/nfts?order=desc&limit={PAGE_SIZE}");

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&path).await?;
            if let Some(nft) = page.nfts.iter().find(|nft| !nft.deleted) {
                debug!(token = %token, serial = nft.serial_number, "latest live serial");
                return Ok(Some(nft.serial_number));
            }
            match page.links.next {
                Some(next) => path = next,
                None => return Ok(None),
            }
        }

        Err(LedgerError::Sdk(format!(
            "no live NFT of {token} within the newest {} serials",
            MAX_PAGES * PAGE_SIZE as usize
        )))
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::TimedOut(err.to_string())
    } else {
        LedgerError::Network(err.to_string())
    }
}
