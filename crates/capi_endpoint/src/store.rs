//! Content store interface.
//!
//! The endpoint never owns content. Handlers read and write through a
//! [`ContentStore`], which must support a single open transaction at a
//! time.

use crate::error::{StoreError, StoreResult};
use tracing::{debug, error};

/// Local article id.
pub type ArticleId = u64;

/// Local media (image attachment) id.
pub type MediaId = u64;

/// Article fields written by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    /// URL-safe name, unique among articles.
    pub slug: String,
    /// Title.
    pub title: String,
    /// Short summary.
    pub excerpt: String,
    /// Body markup.
    pub content: String,
    /// Publication date as sent by the client.
    pub published_at: String,
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Local id.
    pub id: ArticleId,
    /// External reference (the identifier of the payload that created it).
    pub reference: Option<String>,
    /// Current fields.
    pub draft: ArticleDraft,
    /// Featured image.
    pub featured_media: Option<MediaId>,
    /// Tag names.
    pub tags: Vec<String>,
    /// Local category ids.
    pub categories: Vec<u64>,
}

/// A stored image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Local id.
    pub id: MediaId,
    /// Article the image is attached to.
    pub parent: ArticleId,
    /// Source URL the image content was taken from.
    pub source: String,
}

/// Persistence operations needed by content handlers.
///
/// Writes are only valid between [`begin`](Self::begin) and
/// [`commit`](Self::commit) or [`rollback`](Self::rollback).
pub trait ContentStore: Send {
    /// Opens a transaction.
    fn begin(&mut self) -> StoreResult<()>;

    /// Makes the open transaction's writes permanent.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards the open transaction's writes.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Finds an article by id.
    fn article(&self, id: ArticleId) -> StoreResult<Option<ArticleRecord>>;

    /// Finds the article carrying an external reference.
    fn article_by_reference(&self, reference: &str) -> StoreResult<Option<ArticleRecord>>;

    /// Returns true if an article already uses the slug.
    fn slug_taken(&self, slug: &str) -> StoreResult<bool>;

    /// Inserts an article and returns its id.
    fn insert_article(&mut self, draft: &ArticleDraft) -> StoreResult<ArticleId>;

    /// Records the external reference of an article.
    fn set_reference(&mut self, article: ArticleId, reference: &str) -> StoreResult<()>;

    /// Replaces an article's fields. The slug is left unchanged.
    fn update_article(&mut self, article: ArticleId, draft: &ArticleDraft) -> StoreResult<()>;

    /// Deletes an article.
    fn delete_article(&mut self, article: ArticleId) -> StoreResult<()>;

    /// Finds an image by id.
    fn media(&self, id: MediaId) -> StoreResult<Option<MediaRecord>>;

    /// Fetches an image and attaches it to an article.
    fn attach_media(&mut self, article: ArticleId, source: &str) -> StoreResult<MediaId>;

    /// Overwrites an image's content from a new source.
    fn replace_media(&mut self, media: MediaId, source: &str) -> StoreResult<()>;

    /// Deletes an image.
    fn delete_media(&mut self, media: MediaId) -> StoreResult<()>;

    /// Marks an image as the article's featured image.
    fn set_featured(&mut self, article: ArticleId, media: MediaId) -> StoreResult<()>;

    /// Replaces an article's tags.
    fn set_tags(&mut self, article: ArticleId, tags: &[String]) -> StoreResult<()>;

    /// Replaces an article's categories.
    fn set_categories(&mut self, article: ArticleId, categories: &[u64]) -> StoreResult<()>;

    /// Returns the public URL of an article.
    fn permalink(&self, article: ArticleId) -> StoreResult<String>;
}

/// Runs `f` inside a store transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A
/// failed commit is rolled back too. Rollback failures are logged; the
/// error from `f` or the commit is what the caller sees.
pub fn transaction<S, T, E, F>(store: &mut S, f: F) -> Result<T, E>
where
    S: ContentStore + ?Sized,
    E: From<StoreError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    store.begin()?;

    match f(store) {
        Ok(value) => match store.commit() {
            Ok(()) => {
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                roll_back(store);
                Err(err.into())
            }
        },
        Err(err) => {
            roll_back(store);
            Err(err)
        }
    }
}

fn roll_back<S: ContentStore + ?Sized>(store: &mut S) {
    match store.rollback() {
        Ok(()) => debug!("transaction rolled back"),
        Err(err) => error!(error = %err, "rollback failed"),
    }
}
