use async_trait::async_trait;
use shared::{
    domain::{CreatureDetail, CreatureId},
    protocol::{ListQuery, LookupQuery, ResultPage},
};

use crate::{dispatch::RequestDispatcher, error::CatalogError};

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<ResultPage, CatalogError>;
    /// `ids` is the comma-joined identifier list, e.g. `"1,4,007"`.
    async fn lookup_by_identifiers(&self, ids: &str) -> Result<ResultPage, CatalogError>;
    async fn get_by_identifier(&self, id: CreatureId) -> Result<CreatureDetail, CatalogError>;
}

pub struct HttpCatalog {
    dispatcher: RequestDispatcher,
}

impl HttpCatalog {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl RemoteCatalog for HttpCatalog {
    async fn list(&self, query: &ListQuery) -> Result<ResultPage, CatalogError> {
        Ok(self.dispatcher.get_json("creatures", query).await?)
    }

    async fn lookup_by_identifiers(&self, ids: &str) -> Result<ResultPage, CatalogError> {
        Ok(self
            .dispatcher
            .get_json(
                "creatures/lookup",
                &LookupQuery {
                    ids: ids.to_string(),
                },
            )
            .await?)
    }

    async fn get_by_identifier(&self, id: CreatureId) -> Result<CreatureDetail, CatalogError> {
        Ok(self
            .dispatcher
            .get_json(&format!("creatures/{}", id.0), &[] as &[(&str, &str)])
            .await?)
    }
}
