use crate::error::{AuthError, Result};
use crate::models::UserType;
use crate::repositories::{AccountRepository, PendingRepository};
use rand::Rng;
use std::sync::Arc;

/// Candidates re-sampled before giving up. The id space holds 10^8 ids per
/// type, so hitting this in practice means the space is saturated.
const MAX_ATTEMPTS: usize = 64;

/// Allocates collision-free public identifiers (`PAT########` /
/// `DOC########`). Uniqueness is checked across accounts *and* pending
/// registrations so an id is never handed to two concurrently-pending
/// registrations.
pub struct IdAllocator {
    accounts: Arc<dyn AccountRepository>,
    pending: Arc<dyn PendingRepository>,
}

impl IdAllocator {
    pub fn new(accounts: Arc<dyn AccountRepository>, pending: Arc<dyn PendingRepository>) -> Self {
        Self { accounts, pending }
    }

    pub async fn allocate(&self, user_type: UserType) -> Result<String> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = Self::candidate(user_type);

            if self.accounts.user_id_exists(&candidate).await? {
                continue;
            }
            if self.pending.user_id_exists(&candidate).await? {
                continue;
            }

            return Ok(candidate);
        }

        tracing::error!(user_type = %user_type, "identifier space saturated");
        Err(AuthError::ResourceExhausted("user identifiers"))
    }

    fn candidate(user_type: UserType) -> String {
        let digits: u32 = rand::thread_rng().gen_range(0..100_000_000);
        format!("{}{:08}", user_type.id_prefix(), digits)
    }
}
