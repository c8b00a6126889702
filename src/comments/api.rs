use async_trait::async_trait;

use crate::comments::model::{Comment, NewComment, ParentKey, RemotePage};
use crate::transport::ApiClient;
use crate::utils::error::Result;

/// Remote side of the comment cache.
#[async_trait]
pub trait CommentApi: Send + Sync {
    async fn fetch_page(&self, parent: &ParentKey, offset: usize, limit: usize)
    -> Result<RemotePage>;

    async fn create(&self, parent: &ParentKey, comment: &NewComment) -> Result<Comment>;
}

/// `GET`/`POST` on the thread's collection path.
#[derive(Clone)]
pub struct HttpCommentApi {
    client: ApiClient,
}

impl HttpCommentApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommentApi for HttpCommentApi {
    async fn fetch_page(
        &self,
        parent: &ParentKey,
        offset: usize,
        limit: usize,
    ) -> Result<RemotePage> {
        self.client
            .get_json(
                &parent.collection_path(),
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
            )
            .await
    }

    async fn create(&self, parent: &ParentKey, comment: &NewComment) -> Result<Comment> {
        self.client
            .post_json(&parent.collection_path(), comment)
            .await
    }
}
