use async_trait::async_trait;
use serde::Deserialize;

use crate::realtime::manager::Identity;
use crate::transport::ApiClient;
use crate::utils::error::Result;

/// Resolves which classes a user belongs to, so the manager can follow
/// their topics on connect. The lookup is made on behalf of `identity`.
#[async_trait]
pub trait ClassDirectory: Send + Sync {
    async fn class_ids(&self, identity: &Identity) -> Result<Vec<i64>>;
}

#[derive(Debug, Deserialize)]
struct ClassSummary {
    id: i64,
}

/// `GET /users/{id}/classes`
#[derive(Clone)]
pub struct HttpClassDirectory {
    client: ApiClient,
}

impl HttpClassDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClassDirectory for HttpClassDirectory {
    async fn class_ids(&self, identity: &Identity) -> Result<Vec<i64>> {
        let client = match &identity.token {
            Some(token) => self.client.with_token(token.as_str()),
            None => self.client.clone(),
        };
        let classes: Vec<ClassSummary> = client
            .get_json(&format!("users/{}/classes", identity.user_id), &[])
            .await?;
        Ok(classes.into_iter().map(|class| class.id).collect())
    }
}
