use async_trait::async_trait;
use cas_core::CrmConfig;

use crate::error::{CrmError, CrmResult};

/// Source of Zoho OAuth access tokens
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> CrmResult<String>;
}

/// Token taken from configuration (`ZOHO_ACCESS_TOKEN`)
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn from_config(config: &CrmConfig) -> Self {
        Self::new(config.access_token.clone())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> CrmResult<String> {
        self.token.clone().ok_or(CrmError::MissingToken)
    }
}
