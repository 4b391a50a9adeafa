#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use warden_auth::Role;
use warden_client::{Client, ClientConfig, InMemoryAuthority, MemoryTokenStore};
use warden_core::UserId;

pub const OWNER: &str = "root";
pub const OWNER_PASSWORD: &str = "rootpass1";

pub struct Harness {
    pub authority: Arc<InMemoryAuthority>,
    pub tokens: Arc<MemoryTokenStore>,
    pub client: Client,
    pub owner: UserId,
}

pub fn config() -> ClientConfig {
    ClientConfig::default()
        .with_request_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_secs(30))
}

impl Harness {
    /// Authority with one owner account, client with empty token storage.
    pub fn new() -> Self {
        let authority = Arc::new(InMemoryAuthority::new());
        let owner = authority.add_user(OWNER, OWNER_PASSWORD, Role::Privileged);
        Self::with_authority(authority, owner, Arc::new(MemoryTokenStore::new()))
    }

    pub fn with_authority(
        authority: Arc<InMemoryAuthority>,
        owner: UserId,
        tokens: Arc<MemoryTokenStore>,
    ) -> Self {
        let client = Client::new(config(), authority.clone(), tokens.clone());
        Self {
            authority,
            tokens,
            client,
            owner,
        }
    }

    /// A second client against the same authority, as another administrator.
    pub fn second_client(&self) -> Client {
        Client::new(
            config(),
            self.authority.clone(),
            Arc::new(MemoryTokenStore::new()),
        )
    }

    pub fn add_standard(&self, username: &str) -> UserId {
        self.authority.add_user(username, "password1", Role::Standard)
    }

    pub async fn login_owner(&self) {
        self.client
            .login(OWNER, OWNER_PASSWORD)
            .await
            .expect("owner login");
    }
}
