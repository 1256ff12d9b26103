//! In-memory document store.
//!
//! Documents live for the lifetime of the process in insertion order. All
//! access goes through a `tokio::sync::RwLock`, so concurrent uploads and
//! deletes are serialised while reads proceed in parallel.

use crate::document::{Document, SummaryData};
use futures::future::join_all;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<Vec<Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document.
    pub async fn insert(&self, document: Document) {
        debug!("Storing document {}", document.id);
        self.documents.write().await.push(document);
    }

    /// Snapshot of every document, oldest first.
    pub async fn list(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Remove and return a document. Backing files are left to the caller.
    pub async fn remove(&self, id: &str) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let index = documents.iter().position(|d| d.id == id)?;
        Some(documents.remove(index))
    }

    /// Swap a document's summary, leaving everything else untouched.
    ///
    /// Returns the updated document, or `None` for an unknown id.
    pub async fn replace_summary(&self, id: &str, summary: SummaryData) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.iter_mut().find(|d| d.id == id)?;
        document.summary_data = summary;
        Some(document.clone())
    }

    /// Documents whose text contains `query`, ignoring case.
    ///
    /// A blank query matches nothing. Surrounding whitespace is part of the
    /// needle.
    pub async fn search(&self, query: &str) -> Vec<Document> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.documents
            .read()
            .await
            .iter()
            .filter(|d| d.searchable_text().contains(&needle))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

/// Best-effort removal of a document's original and processed images.
///
/// Missing files are expected (a previous delete or a manual cleanup) and
/// only logged.
pub async fn remove_backing_files(document: &Document) {
    let paths = [
        document.image_path.as_path(),
        document.processed_image_path.as_path(),
    ];
    join_all(paths.into_iter().map(remove_quietly)).await;
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Article, DocumentStatus, ExtractedData, HeadlineSummary};
    use chrono::Utc;
    use std::path::PathBuf;

    fn doc(id: &str, headline: &str) -> Document {
        Document {
            id: id.into(),
            filename: format!("{id}-page.jpg"),
            original_name: "page.jpg".into(),
            image_path: PathBuf::from(format!("/nonexistent/{id}-page.jpg")),
            processed_image_path: PathBuf::from(format!("/nonexistent/{id}-page-processed.jpg")),
            upload_date: Utc::now(),
            extracted_data: ExtractedData {
                headlines: vec![headline.into()],
                articles: vec![Article {
                    headline: headline.into(),
                    content: "Body Text".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            summary_data: SummaryData::default(),
            raw_extracted_text: String::new(),
            status: DocumentStatus::Processed,
            language: "bengali".into(),
        }
    }

    #[tokio::test]
    async fn insert_list_get_remove() {
        let store = DocumentStore::new();
        store.insert(doc("1", "প্রথম")).await;
        store.insert(doc("2", "দ্বিতীয়")).await;

        let ids: Vec<_> = store.list().await.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(store.get("2").await.unwrap().extracted_data.headlines, vec!["দ্বিতীয়"]);
        assert!(store.get("3").await.is_none());

        assert_eq!(store.remove("1").await.unwrap().id, "1");
        assert!(store.remove("1").await.is_none());
        assert!(store.get("1").await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn replace_summary_touches_only_the_summary() {
        let store = DocumentStore::new();
        let original = doc("7", "বাজেট");
        store.insert(original.clone()).await;

        let summary = SummaryData {
            overall_summary: "নতুন সারাংশ".into(),
            headline_summaries: vec![HeadlineSummary {
                headline: "বাজেট".into(),
                summary: "এক লাইন".into(),
            }],
            ..Default::default()
        };
        let updated = store.replace_summary("7", summary.clone()).await.unwrap();

        assert_eq!(updated.summary_data, summary);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.extracted_data, original.extracted_data);
        assert!(store.replace_summary("missing", summary).await.is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = DocumentStore::new();
        store.insert(doc("1", "Dhaka Budget")).await;
        store.insert(doc("2", "ক্রিকেট")).await;

        assert_eq!(store.search("budget").await.len(), 1);
        assert_eq!(store.search("BODY text").await.len(), 2);
        assert_eq!(store.search("ক্রিকেট").await[0].id, "2");
        assert!(store.search("football").await.is_empty());
        assert!(store.search("   ").await.is_empty());
    }

    #[tokio::test]
    async fn search_keeps_surrounding_whitespace() {
        let store = DocumentStore::new();
        store.insert(doc("2", "ক্রিকেট")).await;

        assert_eq!(store.search("ক্রিকেট body").await.len(), 1);
        assert!(store.search("ক্রিকেট   ").await.is_empty());
        assert!(store.search("\tক্রিকেট").await.is_empty());
    }

    #[tokio::test]
    async fn backing_file_removal_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc("9", "x");
        d.image_path = dir.path().join("9-page.jpg");
        std::fs::write(&d.image_path, b"img").unwrap();

        remove_backing_files(&d).await;
        assert!(!d.image_path.exists());
        remove_backing_files(&d).await;
    }
}
