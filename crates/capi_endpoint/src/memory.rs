//! In-memory content store.

use crate::error::{StoreError, StoreResult};
use crate::store::{ArticleDraft, ArticleId, ArticleRecord, ContentStore, MediaId, MediaRecord};
use std::collections::{BTreeMap, HashSet};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`ContentStore::begin`].
    Begin,
    /// [`ContentStore::commit`].
    Commit,
    /// [`ContentStore::insert_article`].
    InsertArticle,
    /// [`ContentStore::set_reference`].
    SetReference,
    /// [`ContentStore::update_article`].
    UpdateArticle,
    /// [`ContentStore::delete_article`].
    DeleteArticle,
    /// [`ContentStore::attach_media`].
    AttachMedia,
    /// [`ContentStore::replace_media`].
    ReplaceMedia,
    /// [`ContentStore::delete_media`].
    DeleteMedia,
    /// [`ContentStore::set_featured`].
    SetFeatured,
    /// [`ContentStore::set_tags`].
    SetTags,
    /// [`ContentStore::set_categories`].
    SetCategories,
}

impl StoreOp {
    /// Returns the operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Begin => "begin",
            StoreOp::Commit => "commit",
            StoreOp::InsertArticle => "insert_article",
            StoreOp::SetReference => "set_reference",
            StoreOp::UpdateArticle => "update_article",
            StoreOp::DeleteArticle => "delete_article",
            StoreOp::AttachMedia => "attach_media",
            StoreOp::ReplaceMedia => "replace_media",
            StoreOp::DeleteMedia => "delete_media",
            StoreOp::SetFeatured => "set_featured",
            StoreOp::SetTags => "set_tags",
            StoreOp::SetCategories => "set_categories",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    next_id: u64,
    articles: BTreeMap<ArticleId, ArticleRecord>,
    media: BTreeMap<MediaId, MediaRecord>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A content store held in memory.
///
/// Transactions snapshot the whole state on `begin` and restore it on
/// `rollback`. Articles and images share one id sequence starting at 1.
/// Any operation can be made to fail with [`fail_on`](Self::fail_on).
#[derive(Debug)]
pub struct MemoryStore {
    base_url: String,
    state: State,
    snapshot: Option<State>,
    failures: HashSet<StoreOp>,
    commits: usize,
    rollbacks: usize,
}

impl MemoryStore {
    /// Creates an empty store whose permalinks live under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: State::default(),
            snapshot: None,
            failures: HashSet::new(),
            commits: 0,
            rollbacks: 0,
        }
    }

    /// Makes every later call of `op` fail.
    pub fn fail_on(&mut self, op: StoreOp) {
        self.failures.insert(op);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Number of committed transactions.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Number of rolled back transactions.
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns all articles, ordered by id.
    pub fn articles(&self) -> Vec<ArticleRecord> {
        self.state.articles.values().cloned().collect()
    }

    /// Returns all images, ordered by id.
    pub fn media_records(&self) -> Vec<MediaRecord> {
        self.state.media.values().cloned().collect()
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        if self.failures.contains(&op) {
            return Err(StoreError::failed(op.as_str(), "injected failure"));
        }
        Ok(())
    }

    fn write(&mut self, op: StoreOp) -> StoreResult<&mut State> {
        self.check(op)?;
        if self.snapshot.is_none() {
            return Err(StoreError::NoTransaction);
        }
        Ok(&mut self.state)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("http://localhost")
    }
}

fn article_mut(state: &mut State, id: ArticleId) -> StoreResult<&mut ArticleRecord> {
    state
        .articles
        .get_mut(&id)
        .ok_or(StoreError::NotFound { kind: "article", id })
}

impl ContentStore for MemoryStore {
    fn begin(&mut self) -> StoreResult<()> {
        self.check(StoreOp::Begin)?;
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionActive);
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.check(StoreOp::Commit)?;
        if self.snapshot.take().is_none() {
            return Err(StoreError::NoTransaction);
        }
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.state = snapshot;
        self.rollbacks += 1;
        Ok(())
    }

    fn article(&self, id: ArticleId) -> StoreResult<Option<ArticleRecord>> {
        Ok(self.state.articles.get(&id).cloned())
    }

    fn article_by_reference(&self, reference: &str) -> StoreResult<Option<ArticleRecord>> {
        Ok(self
            .state
            .articles
            .values()
            .find(|article| article.reference.as_deref() == Some(reference))
            .cloned())
    }

    fn slug_taken(&self, slug: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .articles
            .values()
            .any(|article| article.draft.slug == slug))
    }

    fn insert_article(&mut self, draft: &ArticleDraft) -> StoreResult<ArticleId> {
        let state = self.write(StoreOp::InsertArticle)?;
        let id = state.allocate();
        state.articles.insert(
            id,
            ArticleRecord {
                id,
                reference: None,
                draft: draft.clone(),
                featured_media: None,
                tags: Vec::new(),
                categories: Vec::new(),
            },
        );
        Ok(id)
    }

    fn set_reference(&mut self, article: ArticleId, reference: &str) -> StoreResult<()> {
        let state = self.write(StoreOp::SetReference)?;
        article_mut(state, article)?.reference = Some(reference.to_string());
        Ok(())
    }

    fn update_article(&mut self, article: ArticleId, draft: &ArticleDraft) -> StoreResult<()> {
        let state = self.write(StoreOp::UpdateArticle)?;
        let record = article_mut(state, article)?;
        let slug = std::mem::take(&mut record.draft.slug);
        record.draft = ArticleDraft {
            slug,
            ..draft.clone()
        };
        Ok(())
    }

    fn delete_article(&mut self, article: ArticleId) -> StoreResult<()> {
        let state = self.write(StoreOp::DeleteArticle)?;
        state
            .articles
            .remove(&article)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                kind: "article",
                id: article,
            })
    }

    fn media(&self, id: MediaId) -> StoreResult<Option<MediaRecord>> {
        Ok(self.state.media.get(&id).cloned())
    }

    fn attach_media(&mut self, article: ArticleId, source: &str) -> StoreResult<MediaId> {
        let state = self.write(StoreOp::AttachMedia)?;
        article_mut(state, article)?;
        let id = state.allocate();
        state.media.insert(
            id,
            MediaRecord {
                id,
                parent: article,
                source: source.to_string(),
            },
        );
        Ok(id)
    }

    fn replace_media(&mut self, media: MediaId, source: &str) -> StoreResult<()> {
        let state = self.write(StoreOp::ReplaceMedia)?;
        let record = state.media.get_mut(&media).ok_or(StoreError::NotFound {
            kind: "media",
            id: media,
        })?;
        record.source = source.to_string();
        Ok(())
    }

    fn delete_media(&mut self, media: MediaId) -> StoreResult<()> {
        let state = self.write(StoreOp::DeleteMedia)?;
        state
            .media
            .remove(&media)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                kind: "media",
                id: media,
            })
    }

    fn set_featured(&mut self, article: ArticleId, media: MediaId) -> StoreResult<()> {
        let state = self.write(StoreOp::SetFeatured)?;
        if !state.media.contains_key(&media) {
            return Err(StoreError::NotFound {
                kind: "media",
                id: media,
            });
        }
        article_mut(state, article)?.featured_media = Some(media);
        Ok(())
    }

    fn set_tags(&mut self, article: ArticleId, tags: &[String]) -> StoreResult<()> {
        let state = self.write(StoreOp::SetTags)?;
        article_mut(state, article)?.tags = tags.to_vec();
        Ok(())
    }

    fn set_categories(&mut self, article: ArticleId, categories: &[u64]) -> StoreResult<()> {
        let state = self.write(StoreOp::SetCategories)?;
        article_mut(state, article)?.categories = categories.to_vec();
        Ok(())
    }

    fn permalink(&self, article: ArticleId) -> StoreResult<String> {
        let record = self.state.articles.get(&article).ok_or(StoreError::NotFound {
            kind: "article",
            id: article,
        })?;
        Ok(format!("{}/{}/", self.base_url, record.draft.slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(slug: &str) -> ArticleDraft {
        ArticleDraft {
            slug: slug.to_string(),
            title: "Title".to_string(),
            excerpt: "Summary".to_string(),
            content: "Body".to_string(),
            published_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn writes_require_transaction() {
        let mut store = MemoryStore::default();
        assert_eq!(
            store.insert_article(&draft("a")),
            Err(StoreError::NoTransaction)
        );
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut store = MemoryStore::default();
        store.begin().unwrap();
        assert_eq!(store.begin(), Err(StoreError::TransactionActive));
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut store = MemoryStore::default();
        store.begin().unwrap();
        let id = store.insert_article(&draft("kept")).unwrap();
        store.commit().unwrap();

        store.begin().unwrap();
        store.set_tags(id, &["x".to_string()]).unwrap();
        store.insert_article(&draft("dropped")).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.articles().len(), 1);
        assert!(store.article(id).unwrap().unwrap().tags.is_empty());
        assert!(!store.in_transaction());
        assert_eq!((store.commits(), store.rollbacks()), (1, 1));
    }

    #[test]
    fn ids_are_shared_between_articles_and_media() {
        let mut store = MemoryStore::default();
        store.begin().unwrap();
        let article = store.insert_article(&draft("a")).unwrap();
        let media = store.attach_media(article, "https://img/a.jpg").unwrap();
        store.set_featured(article, media).unwrap();
        store.commit().unwrap();

        assert_eq!((article, media), (1, 2));
        assert_eq!(store.media(media).unwrap().unwrap().parent, article);
        assert_eq!(store.article(article).unwrap().unwrap().featured_media, Some(media));
    }

    #[test]
    fn update_keeps_slug() {
        let mut store = MemoryStore::default();
        store.begin().unwrap();
        let id = store.insert_article(&draft("original")).unwrap();
        let mut changed = draft("ignored");
        changed.title = "New title".to_string();
        store.update_article(id, &changed).unwrap();
        store.commit().unwrap();

        let record = store.article(id).unwrap().unwrap();
        assert_eq!(record.draft.slug, "original");
        assert_eq!(record.draft.title, "New title");
    }

    #[test]
    fn injected_failure() {
        let mut store = MemoryStore::default();
        store.fail_on(StoreOp::AttachMedia);
        store.begin().unwrap();
        let id = store.insert_article(&draft("a")).unwrap();

        let err = store.attach_media(id, "src").unwrap_err();
        assert_eq!(err, StoreError::failed("attach_media", "injected failure"));

        store.clear_failures();
        assert!(store.attach_media(id, "src").is_ok());
    }

    #[test]
    fn missing_records() {
        let mut store = MemoryStore::default();
        store.begin().unwrap();
        assert_eq!(
            store.delete_media(9),
            Err(StoreError::NotFound { kind: "media", id: 9 })
        );
        assert!(store.permalink(9).is_err());
    }

    #[test]
    fn permalink_uses_base_url() {
        let mut store = MemoryStore::new("https://news.example.com/");
        store.begin().unwrap();
        let id = store.insert_article(&draft("hello-world")).unwrap();
        store.commit().unwrap();
        assert_eq!(
            store.permalink(id).unwrap(),
            "https://news.example.com/hello-world/"
        );
    }
}
