use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, StaffTokensRepo};
use crate::domain::entities::StaffTokenRecord;

const TOKEN_PREFIX: &str = "st";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum StaffAuthError {
    #[error("missing staff token")]
    Missing,
    #[error("invalid staff token")]
    Invalid,
    #[error("revoked staff token")]
    Revoked,
}

#[derive(Debug, Error)]
pub enum StaffTokenError {
    #[error("token name is required")]
    EmptyName,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Authenticated staff member.
#[derive(Debug, Clone)]
pub struct StaffPrincipal {
    pub token_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StaffTokenIssued {
    pub record: StaffTokenRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct StaffService {
    repo: Arc<dyn StaffTokensRepo>,
}

impl StaffService {
    pub fn new(repo: Arc<dyn StaffTokensRepo>) -> Self {
        Self { repo }
    }

    /// Create a token. The plain token is only ever returned here.
    pub async fn issue(&self, name: &str) -> Result<StaffTokenIssued, StaffTokenError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StaffTokenError::EmptyName);
        }

        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");

        let record = StaffTokenRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            prefix,
            hashed_secret: hash_secret(&secret),
            revoked_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.repo.create_token(&record).await?;

        Ok(StaffTokenIssued { record, token })
    }

    pub async fn authenticate(&self, token: &str) -> Result<StaffPrincipal, StaffAuthError> {
        let parsed = parse_token(token).ok_or(StaffAuthError::Invalid)?;
        let record = self
            .repo
            .find_by_prefix(parsed.prefix)
            .await
            .map_err(|_| StaffAuthError::Invalid)?
            .ok_or(StaffAuthError::Invalid)?;

        if let Some(revoked_at) = record.revoked_at
            && revoked_at <= OffsetDateTime::now_utc()
        {
            return Err(StaffAuthError::Revoked);
        }

        let hashed_input = hash_secret(parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(StaffAuthError::Invalid);
        }

        Ok(StaffPrincipal {
            token_id: record.id,
            name: record.name,
        })
    }
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}

pub(crate) fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    hex::encode(&Uuid::new_v4().as_bytes()[..6])
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MemoryTokens {
        records: Mutex<Vec<StaffTokenRecord>>,
    }

    #[async_trait]
    impl StaffTokensRepo for MemoryTokens {
        async fn find_by_prefix(
            &self,
            prefix: &str,
        ) -> Result<Option<StaffTokenRecord>, RepoError> {
            Ok(self
                .records
                .lock()
                .expect("records")
                .iter()
                .find(|r| r.prefix == prefix)
                .cloned())
        }

        async fn create_token(&self, record: &StaffTokenRecord) -> Result<(), RepoError> {
            self.records.lock().expect("records").push(record.clone());
            Ok(())
        }
    }

    fn service() -> (Arc<MemoryTokens>, StaffService) {
        let repo = Arc::new(MemoryTokens::default());
        (repo.clone(), StaffService::new(repo))
    }

    #[tokio::test]
    async fn issued_token_authenticates() {
        let (_, service) = service();
        let issued = service.issue("night desk").await.expect("issue");
        assert!(issued.token.starts_with("st_"));

        let principal = service.authenticate(&issued.token).await.expect("auth");
        assert_eq!(principal.name, "night desk");
        assert_eq!(principal.token_id, issued.record.id);
    }

    #[tokio::test]
    async fn tampered_secret_is_rejected() {
        let (_, service) = service();
        let issued = service.issue("desk").await.expect("issue");
        let tampered = format!("{}x", issued.token);

        assert!(matches!(
            service.authenticate(&tampered).await,
            Err(StaffAuthError::Invalid)
        ));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let (repo, service) = service();
        let issued = service.issue("desk").await.expect("issue");
        repo.records.lock().expect("records")[0].revoked_at =
            Some(OffsetDateTime::now_utc() - time::Duration::minutes(1));

        assert!(matches!(
            service.authenticate(&issued.token).await,
            Err(StaffAuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn malformed_tokens_are_invalid() {
        let (_, service) = service();
        for token in ["", "st_abc", "sk_abc_0123456789abcdef0123456789abcdef", "st__short"] {
            assert!(matches!(
                service.authenticate(token).await,
                Err(StaffAuthError::Invalid)
            ));
        }
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (_, service) = service();
        assert!(matches!(
            service.issue("  ").await,
            Err(StaffTokenError::EmptyName)
        ));
    }
}
