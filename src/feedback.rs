//! Feedback event log (spec.md §3 names the `FeedbackEvent` entity
//! "for model analysis" but specifies no operations). This is the
//! minimal append-only CRUD surface over it, grounded in the
//! teacher's `vault::user_accounts` append-only ledger pattern
//! (deposits/trades are recorded, never mutated or deleted).

use crate::error::PipelineError;
use crate::store::models::FeedbackEventRow;
use crate::store::Store;

/// Append a feedback value (e.g. "approved", "rejected", a free-text
/// note from a reviewer) for a company. Never overwrites or deletes a
/// prior entry.
pub async fn record(store: &dyn Store, company_id: i64, value: &str) -> Result<i64, PipelineError> {
    store.record_feedback_event(company_id, value).await
}

/// List every feedback event recorded for a company, oldest first.
pub async fn list_for_company(store: &dyn Store, company_id: i64) -> Result<Vec<FeedbackEventRow>, PipelineError> {
    store.list_feedback_events(company_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::build_evidence;
    use crate::store::SqliteStore;

    #[tokio::test]
    async fn record_then_list_preserves_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let evidence = build_evidence(Some("Acme".into()), None, Some("https://acme.com".into()));
        let company_id = store.upsert_company(&evidence).await.unwrap();

        record(&store, company_id, "approved").await.unwrap();
        record(&store, company_id, "needs_review").await.unwrap();

        let events = list_for_company(&store, company_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value, "approved");
        assert_eq!(events[1].value, "needs_review");
    }
}
