//! Full-text search

use super::{PaperlessService, Payload};
use crate::error::PaperlessError;

impl PaperlessService {
    /// GET `/api/search/`
    ///
    /// `db_only` is sent only when set: the server treats any present value
    /// as true.
    pub async fn search_documents(&self, query: &str, db_only: bool) -> Result<Payload, PaperlessError> {
        let mut params = vec![("query".to_string(), query.to_string())];
        if db_only {
            params.push(("db_only".to_string(), "true".to_string()));
        }
        self.get_json("/api/search/", &params).await
    }

    /// GET `/api/search/autocomplete/`; `limit` falls back to the configured default
    pub async fn get_search_autocomplete(
        &self,
        term: &str,
        limit: Option<u32>,
    ) -> Result<Payload, PaperlessError> {
        let limit = limit.unwrap_or(self.search.default_limit);
        let params = [
            ("term".to_string(), term.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        self.get_json("/api/search/autocomplete/", &params).await
    }
}
