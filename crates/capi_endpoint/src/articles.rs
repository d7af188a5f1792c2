//! Article handler.
//!
//! This endpoint is always the master for articles: it assigns ids on
//! create and hands them back in `data.master`, and later updates and
//! deletes must quote them.
//!
//! The payload identifier is the article's external reference and is
//! stored with the article.

use crate::config::EndpointConfig;
use crate::error::StoreError;
use crate::handler::{answer, ContentHandler};
use crate::store::{
    transaction, ArticleDraft, ArticleId, ArticleRecord, ContentStore, MediaId, MediaRecord,
};
use capi_protocol::{codes, ErrorEntry, Message, Module, Payload};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Handles the `articles` module.
pub struct ArticleHandler {
    category_map: BTreeMap<String, u64>,
    clock: Clock,
}

impl ArticleHandler {
    /// Creates a handler with the given category mapping.
    pub fn new(category_map: BTreeMap<String, u64>) -> Self {
        Self {
            category_map,
            clock: Box::new(Utc::now),
        }
    }

    /// Creates a handler using the endpoint's category mapping.
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.category_map.clone())
    }

    /// Replaces the clock used for slug suffixes and `created_at`.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Picks a free slug for a new article.
    ///
    /// Returns `None` when both the plain slug and the dated variant are
    /// taken.
    fn unique_slug(
        &self,
        store: &dyn ContentStore,
        title: &str,
        fallback: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut slug = slugify(title);
        if slug.is_empty() {
            slug = slugify(fallback);
        }
        if !store.slug_taken(&slug)? {
            return Ok(Some(slug));
        }

        let dated = format!("{slug}-{}", (self.clock)().format("%b-%y")).to_lowercase();
        if !store.slug_taken(&dated)? {
            return Ok(Some(dated));
        }
        Ok(None)
    }

    /// Translates external category identifiers to local ids.
    fn map_categories(&self, external: &[String]) -> Vec<u64> {
        external
            .iter()
            .filter_map(|name| match self.category_map.get(name) {
                Some(id) => Some(*id),
                None => {
                    warn!(category = %name, "skipping unmapped category");
                    None
                }
            })
            .collect()
    }

    /// Checks that an update or delete targets a consistent article.
    ///
    /// Problems are added to `reply` with status 400; the target is only
    /// returned when there were none.
    fn validate(
        &self,
        payload: &Payload,
        store: &dyn ContentStore,
        reply: &mut Payload,
    ) -> Result<Option<Target>, StoreError> {
        let Some(master) = payload.get("master").and_then(Value::as_object) else {
            reply
                .add_error(ErrorEntry::new(
                    codes::MASTER_DATA_MISSING,
                    format!(
                        "Method was {} but master data was not passed",
                        payload.action().as_str()
                    ),
                ))
                .set_status(400);
            return Ok(None);
        };

        let article = match master.get("id").and_then(as_id) {
            Some(id) => {
                let article = store.article(id)?;
                match &article {
                    Some(found) => {
                        let reference = payload.identifier();
                        match store.article_by_reference(reference)? {
                            Some(by_reference) if by_reference.id != found.id => {
                                reply
                                    .add_error(ErrorEntry::new(
                                        codes::REFERENCE_MISMATCH,
                                        format!(
                                            "Article id ({id}) and reference {reference} ({}) did not match",
                                            by_reference.id
                                        ),
                                    ))
                                    .set_status(400);
                            }
                            Some(_) => {}
                            None => {
                                reply
                                    .add_error(ErrorEntry::new(
                                        codes::REFERENCE_NOT_FOUND,
                                        format!("Article with reference {reference} could not be found"),
                                    ))
                                    .set_status(400);
                            }
                        }
                    }
                    None => {
                        reply
                            .add_error(ErrorEntry::new(
                                codes::ARTICLE_NOT_FOUND,
                                format!("Article with id {id} could not be found"),
                            ))
                            .set_status(400);
                    }
                }
                article
            }
            None => {
                reply
                    .add_error(
                        ErrorEntry::new(
                            codes::MASTER_KEY_MISSING,
                            "A required master data key was missing",
                        )
                        .with_information("id"),
                    )
                    .set_status(400);
                None
            }
        };

        let media = match master.get("imageid").and_then(as_id) {
            Some(id) => {
                let media = store.media(id)?;
                if media.is_none() {
                    reply
                        .add_error(
                            ErrorEntry::new(
                                codes::MASTER_RECORD_NOT_FOUND,
                                "No data was found with a matching master key",
                            )
                            .with_information(format!("image with id {id}")),
                        )
                        .set_status(400);
                }
                media
            }
            None => {
                reply
                    .add_error(
                        ErrorEntry::new(
                            codes::MASTER_KEY_MISSING,
                            "A required master data key was missing",
                        )
                        .with_information("imageid"),
                    )
                    .set_status(400);
                None
            }
        };

        if let (Some(article), Some(media)) = (&article, &media) {
            if media.parent != article.id {
                reply
                    .add_error(
                        ErrorEntry::new(codes::SYNC_MISMATCH, "A synchronisation issue was detected")
                            .with_information(format!(
                                "Parent of image {} was {} and so did not match the article id ({})",
                                media.id, media.parent, article.id
                            )),
                    )
                    .set_status(400);
            }
        }

        if reply.has_errors() {
            return Ok(None);
        }
        Ok(article.zip(media).map(|(article, media)| Target { article, media }))
    }
}

impl Default for ArticleHandler {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl fmt::Debug for ArticleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleHandler")
            .field("category_map", &self.category_map)
            .finish_non_exhaustive()
    }
}

/// Records an update or delete applies to.
struct Target {
    article: ArticleRecord,
    media: MediaRecord,
}

/// What a successful create wrote.
struct Created {
    article: ArticleId,
    media: MediaId,
    permalink: String,
}

/// Article fields read from payload data.
struct ArticleFields {
    title: String,
    content: String,
    start_date: String,
    snippet: String,
    image_src: String,
    tags: Vec<String>,
    categories: Vec<String>,
}

impl ArticleFields {
    /// Reads the fields, adding one error per missing required field.
    fn read(payload: &Payload, reply: &mut Payload) -> Option<Self> {
        let image_src = payload
            .get("image")
            .and_then(|image| image.get("src"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let required = [
            ("title", text(payload, "title")),
            ("content", text(payload, "content")),
            ("start_date", text(payload, "start_date")),
            ("image.src", image_src),
        ];

        let mut missing = false;
        for (name, value) in &required {
            if value.is_none() {
                reply
                    .add_error(
                        ErrorEntry::new(
                            codes::DATA_FIELD_MISSING,
                            "A required data field was missing",
                        )
                        .with_information(*name),
                    )
                    .set_status(400);
                missing = true;
            }
        }
        if missing {
            return None;
        }

        let [title, content, start_date, image_src] = required.map(|(_, value)| value.unwrap_or_default());
        Some(Self {
            title,
            content,
            start_date,
            snippet: text(payload, "snippet").unwrap_or_default(),
            image_src,
            tags: tag_names(payload.get("tags")),
            categories: category_names(payload.get("categories")),
        })
    }

    fn draft(&self, slug: String) -> ArticleDraft {
        ArticleDraft {
            slug,
            title: self.title.clone(),
            excerpt: self.snippet.clone(),
            content: self.content.clone(),
            published_at: self.start_date.clone(),
        }
    }
}

fn text(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `[{"name": ...}]` or plain strings.
fn tag_names(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(tags)) = value else {
        return Vec::new();
    };
    tags.iter()
        .filter_map(|tag| match tag {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}

fn category_names(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(categories)) = value else {
        return Vec::new();
    };
    categories
        .iter()
        .filter_map(|category| match category {
            Value::String(name) => Some(name.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect()
}

/// Wraps a store failure in a payload error.
fn effect(code: u16, description: &str) -> impl FnOnce(StoreError) -> ErrorEntry + '_ {
    move |err| ErrorEntry::new(code, description).with_information(err.to_string())
}

fn internal(reply: &mut Payload, err: StoreError) {
    warn!(error = %err, "content store failure");
    reply.add_error(ErrorEntry::from(err)).set_status(500);
}

/// Turns a title into a URL-safe slug.
///
/// Lowercases ASCII letters and digits and joins everything else into
/// single hyphens. Non-ASCII characters are dropped.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c.is_ascii_punctuation()) && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

impl ContentHandler for ArticleHandler {
    fn module(&self) -> Module {
        Module::Articles
    }

    fn create(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message) {
        let mut reply = payload.make_response();
        let reference = payload.identifier();

        match store.article_by_reference(reference) {
            Ok(Some(_)) => {
                reply
                    .add_error(ErrorEntry::new(
                        codes::REFERENCE_EXISTS,
                        "Article reference already exists",
                    ))
                    .set_status(400);
            }
            Ok(None) => {}
            Err(err) => internal(&mut reply, err),
        }

        let fields = if reply.has_errors() {
            None
        } else {
            ArticleFields::read(payload, &mut reply)
        };

        let slug = match &fields {
            Some(fields) => match self.unique_slug(store, &fields.title, reference) {
                Ok(Some(slug)) => Some(slug),
                Ok(None) => {
                    reply
                        .add_error(ErrorEntry::new(
                            codes::SLUG_UNAVAILABLE,
                            "Could not assign a new unique slug to article",
                        ))
                        .set_status(500);
                    None
                }
                Err(err) => {
                    internal(&mut reply, err);
                    None
                }
            },
            None => None,
        };

        if slug.is_some() && payload.get("master").is_some() {
            reply
                .add_error(ErrorEntry::new(
                    codes::UNEXPECTED_MASTER_DATA,
                    "Endpoint is set as master locally, but master data was sent",
                ))
                .set_status(500);
        }

        if let (Some(fields), Some(slug), false) = (&fields, slug, reply.has_errors()) {
            let draft = fields.draft(slug);
            let categories = self.map_categories(&fields.categories);

            let written = transaction(store, |txn| {
                let article = txn
                    .insert_article(&draft)
                    .map_err(effect(codes::ARTICLE_CREATE_FAILED, "Could not add article"))?;
                txn.set_reference(article, reference).map_err(|_| {
                    ErrorEntry::new(codes::ARTICLE_CREATE_FAILED, "Could not add article")
                        .with_information("Reference meta data could not be added")
                })?;

                let media = txn.attach_media(article, &fields.image_src).map_err(effect(
                    codes::IMAGE_CREATE_FAILED,
                    "Could not insert image for article",
                ))?;
                txn.set_featured(article, media).map_err(|_| {
                    ErrorEntry::new(codes::IMAGE_ASSIGN_FAILED, "Could not assign image to article")
                        .with_information(json!({"articleid": article, "attachmentid": media}))
                })?;

                if !fields.tags.is_empty() {
                    txn.set_tags(article, &fields.tags)?;
                }
                if !categories.is_empty() {
                    txn.set_categories(article, &categories)?;
                }

                let permalink = txn.permalink(article)?;
                Ok::<_, ErrorEntry>(Created {
                    article,
                    media,
                    permalink,
                })
            });

            match written {
                Ok(created) => {
                    info!(
                        reference,
                        article = created.article,
                        media = created.media,
                        "article created"
                    );
                    reply
                        .add_data("url", created.permalink)
                        .add_data(
                            "master",
                            json!({
                                "id": created.article,
                                "imageid": created.media,
                                "created_at": (self.clock)().timestamp(),
                            }),
                        )
                        .set_status(201);
                }
                Err(err) => {
                    warn!(reference, code = err.code(), "article create rolled back");
                    reply.add_error(err).set_status(500);
                }
            }
        }

        answer(response, reply);
    }

    fn update(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message) {
        let mut reply = payload.make_response();

        let target = match self.validate(payload, store, &mut reply) {
            Ok(target) => target,
            Err(err) => {
                internal(&mut reply, err);
                None
            }
        };
        let fields = match target {
            Some(_) => ArticleFields::read(payload, &mut reply),
            None => None,
        };

        if let (Some(target), Some(fields)) = (target, fields) {
            let article = target.article.id;
            let media = target.media.id;
            let draft = fields.draft(target.article.draft.slug.clone());

            let written = transaction(store, |txn| {
                txn.update_article(article, &draft)
                    .map_err(effect(codes::ARTICLE_UPDATE_FAILED, "Could not update article"))?;
                txn.replace_media(media, &fields.image_src).map_err(|_| {
                    ErrorEntry::new(codes::IMAGE_UPDATE_FAILED, "Could not update image")
                        .with_information(format!(
                            "The existing file for image {media} could not be overwritten"
                        ))
                })?;
                txn.set_tags(article, &fields.tags)?;
                Ok::<_, ErrorEntry>(())
            });

            match written {
                Ok(()) => {
                    info!(reference = payload.identifier(), article, "article updated");
                    reply.set_status(200);
                }
                Err(err) => {
                    warn!(article, code = err.code(), "article update rolled back");
                    reply.add_error(err).set_status(500);
                }
            }
        }

        answer(response, reply);
    }

    fn delete(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message) {
        let mut reply = payload.make_response();

        let target = match self.validate(payload, store, &mut reply) {
            Ok(target) => target,
            Err(err) => {
                internal(&mut reply, err);
                None
            }
        };

        if let Some(target) = target {
            let article = target.article.id;
            let media = target.media.id;

            let written = transaction(store, |txn| {
                txn.delete_article(article)
                    .map_err(effect(codes::ARTICLE_DELETE_FAILED, "Could not delete article"))?;
                txn.delete_media(media).map_err(effect(
                    codes::IMAGE_DELETE_FAILED,
                    "Could not delete image for article",
                ))?;
                Ok::<_, ErrorEntry>(())
            });

            match written {
                Ok(()) => {
                    info!(reference = payload.identifier(), article, "article deleted");
                    reply.set_status(200);
                }
                Err(err) => {
                    warn!(article, code = err.code(), "article delete rolled back");
                    reply.add_error(err).set_status(500);
                }
            }
        }

        answer(response, reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOp};
    use capi_protocol::Action;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap()
    }

    fn handler() -> ArticleHandler {
        ArticleHandler::new(BTreeMap::from([("news".to_string(), 7)])).with_clock(fixed_clock)
    }

    fn create_payload(identifier: &str, title: &str) -> Payload {
        let mut payload = Payload::new(identifier, Module::Articles, Action::Create);
        payload
            .add_data("title", title)
            .add_data("content", "<p>Body</p>")
            .add_data("snippet", "Summary")
            .add_data("start_date", "2026-03-14 09:00:00")
            .add_data("image", json!({"src": "https://img.example.com/a.jpg"}))
            .add_data("tags", json!([{"name": "local"}, "politics"]))
            .add_data("categories", json!(["news", "unmapped"]));
        payload
    }

    fn create(handler: &ArticleHandler, store: &mut MemoryStore, payload: &Payload) -> Payload {
        let mut response = Message::respond();
        handler.create(payload, store, &mut response);
        response.payload(payload.identifier()).unwrap().clone()
    }

    fn master_payload(identifier: &str, action: Action, master: Value) -> Payload {
        let data = create_payload(identifier, "Changed title").data().clone();
        let mut payload = Payload::new(identifier, Module::Articles, action).with_data(data);
        payload.add_data("master", master);
        payload
    }

    #[test]
    fn slugify_titles() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rates rise 2%  "), "rates-rise-2");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn create_writes_article() {
        let handler = handler();
        let mut store = MemoryStore::new("https://news.example.com");

        let reply = create(&handler, &mut store, &create_payload("art-1", "Hello World"));

        assert_eq!(reply.status(), Some(201));
        assert!(reply.success());
        assert_eq!(reply.get("url"), Some(&json!("https://news.example.com/hello-world/")));
        let master = reply.get("master").unwrap();
        assert_eq!(master["id"], json!(1));
        assert_eq!(master["imageid"], json!(2));
        assert_eq!(master["created_at"], json!(fixed_clock().timestamp()));

        let article = store.article(1).unwrap().unwrap();
        assert_eq!(article.reference.as_deref(), Some("art-1"));
        assert_eq!(article.featured_media, Some(2));
        assert_eq!(article.tags, vec!["local", "politics"]);
        assert_eq!(article.categories, vec![7]);
        assert_eq!(article.draft.excerpt, "Summary");
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn resubmitted_reference_is_rejected() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let reply = create(&handler, &mut store, &create_payload("art-1", "Hello"));

        assert_eq!(reply.status(), Some(400));
        assert_eq!(reply.errors().len(), 1);
        assert_eq!(reply.errors()[0].code(), codes::REFERENCE_EXISTS);
        assert_eq!(store.articles().len(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn taken_slug_gets_date_suffix() {
        let handler = handler();
        let mut store = MemoryStore::new("https://news.example.com");
        create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let reply = create(&handler, &mut store, &create_payload("art-2", "Hello"));
        assert_eq!(
            reply.get("url"),
            Some(&json!("https://news.example.com/hello-mar-26/"))
        );

        let reply = create(&handler, &mut store, &create_payload("art-3", "Hello"));
        assert_eq!(reply.status(), Some(500));
        assert_eq!(reply.errors()[0].code(), codes::SLUG_UNAVAILABLE);
    }

    #[test]
    fn missing_fields_are_listed() {
        let handler = handler();
        let mut store = MemoryStore::default();
        let mut payload = Payload::new("art-1", Module::Articles, Action::Create);
        payload.add_data("title", "Only a title");

        let reply = create(&handler, &mut store, &payload);

        assert_eq!(reply.status(), Some(400));
        let missing: Vec<_> = reply
            .errors()
            .iter()
            .map(|e| e.information().and_then(Value::as_str).unwrap().to_string())
            .collect();
        assert_eq!(missing, vec!["content", "start_date", "image.src"]);
        assert_eq!(store.commits() + store.rollbacks(), 0);
    }

    #[test]
    fn master_data_on_create_is_rejected() {
        let handler = handler();
        let mut store = MemoryStore::default();
        let mut payload = create_payload("art-1", "Hello");
        payload.add_data("master", json!({"id": 1}));

        let reply = create(&handler, &mut store, &payload);

        assert_eq!(reply.status(), Some(500));
        assert_eq!(reply.errors()[0].code(), codes::UNEXPECTED_MASTER_DATA);
        assert!(store.articles().is_empty());
    }

    #[test]
    fn secondary_failure_rolls_back_create() {
        let handler = handler();
        let mut store = MemoryStore::default();
        store.fail_on(StoreOp::AttachMedia);

        let reply = create(&handler, &mut store, &create_payload("art-1", "Hello"));

        assert_eq!(reply.status(), Some(500));
        assert_eq!(reply.errors()[0].code(), codes::IMAGE_CREATE_FAILED);
        assert!(store.articles().is_empty());
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn featured_failure_reports_ids() {
        let handler = handler();
        let mut store = MemoryStore::default();
        store.fail_on(StoreOp::SetFeatured);

        let reply = create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let error = &reply.errors()[0];
        assert_eq!(error.code(), codes::IMAGE_ASSIGN_FAILED);
        assert_eq!(error.information(), Some(&json!({"articleid": 1, "attachmentid": 2})));
        assert!(store.media_records().is_empty());
    }

    #[test]
    fn reference_failure_has_detail() {
        let handler = handler();
        let mut store = MemoryStore::default();
        store.fail_on(StoreOp::SetReference);

        let reply = create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let error = &reply.errors()[0];
        assert_eq!(error.code(), codes::ARTICLE_CREATE_FAILED);
        assert_eq!(
            error.information(),
            Some(&json!("Reference meta data could not be added"))
        );
    }

    #[test]
    fn update_rewrites_article() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let mut payload =
            master_payload("art-1", Action::Update, json!({"id": 1, "imageid": 2}));
        payload
            .add_data("image", json!({"src": "https://img.example.com/b.jpg"}))
            .add_data("tags", json!([]));
        let mut response = Message::respond();
        handler.update(&payload, &mut store, &mut response);

        let reply = response.payload("art-1").unwrap();
        assert_eq!(reply.status(), Some(200));
        assert!(reply.success());

        let article = store.article(1).unwrap().unwrap();
        assert_eq!(article.draft.title, "Changed title");
        assert_eq!(article.draft.slug, "hello");
        assert!(article.tags.is_empty());
        assert_eq!(store.media(2).unwrap().unwrap().source, "https://img.example.com/b.jpg");
    }

    #[test]
    fn update_failure_rolls_back() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "Hello"));
        store.fail_on(StoreOp::ReplaceMedia);

        let payload = master_payload("art-1", Action::Update, json!({"id": 1, "imageid": 2}));
        let mut response = Message::respond();
        handler.update(&payload, &mut store, &mut response);

        let reply = response.payload("art-1").unwrap();
        assert_eq!(reply.status(), Some(500));
        assert_eq!(reply.errors()[0].code(), codes::IMAGE_UPDATE_FAILED);
        assert_eq!(store.article(1).unwrap().unwrap().draft.title, "Hello");
        assert_eq!(store.rollbacks(), 1);
    }

    #[test]
    fn delete_removes_article_and_image() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "Hello"));

        let payload = master_payload("art-1", Action::Delete, json!({"id": "1", "imageid": 2}));
        let mut response = Message::respond();
        handler.delete(&payload, &mut store, &mut response);

        assert_eq!(response.payload("art-1").unwrap().status(), Some(200));
        assert!(store.articles().is_empty());
        assert!(store.media_records().is_empty());
    }

    #[test]
    fn delete_image_failure_keeps_article() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "Hello"));
        store.fail_on(StoreOp::DeleteMedia);

        let payload = master_payload("art-1", Action::Delete, json!({"id": 1, "imageid": 2}));
        let mut response = Message::respond();
        handler.delete(&payload, &mut store, &mut response);

        let reply = response.payload("art-1").unwrap();
        assert_eq!(reply.errors()[0].code(), codes::IMAGE_DELETE_FAILED);
        assert_eq!(store.articles().len(), 1);
    }

    fn validation_codes(store: &MemoryStore, payload: &Payload) -> Vec<u16> {
        let mut reply = payload.make_response();
        let target = handler().validate(payload, store, &mut reply).unwrap();
        assert!(target.is_none());
        assert_eq!(reply.status(), Some(400));
        reply.errors().iter().map(ErrorEntry::code).collect()
    }

    #[test]
    fn validation_failures() {
        let handler = handler();
        let mut store = MemoryStore::default();
        create(&handler, &mut store, &create_payload("art-1", "First"));
        create(&handler, &mut store, &create_payload("art-2", "Second"));

        let no_master = Payload::new("art-1", Module::Articles, Action::Delete);
        assert_eq!(validation_codes(&store, &no_master), vec![codes::MASTER_DATA_MISSING]);

        let unknown_id = master_payload("art-1", Action::Delete, json!({"id": 99, "imageid": 2}));
        assert_eq!(validation_codes(&store, &unknown_id), vec![codes::ARTICLE_NOT_FOUND]);

        let unknown_ref = master_payload("art-9", Action::Delete, json!({"id": 1, "imageid": 2}));
        assert_eq!(validation_codes(&store, &unknown_ref), vec![codes::REFERENCE_NOT_FOUND]);

        let crossed = master_payload("art-2", Action::Delete, json!({"id": 1, "imageid": 2}));
        assert_eq!(validation_codes(&store, &crossed), vec![codes::REFERENCE_MISMATCH]);

        let no_image = master_payload("art-1", Action::Delete, json!({"id": 1}));
        assert_eq!(validation_codes(&store, &no_image), vec![codes::MASTER_KEY_MISSING]);

        let unknown_image = master_payload("art-1", Action::Delete, json!({"id": 1, "imageid": 50}));
        assert_eq!(
            validation_codes(&store, &unknown_image),
            vec![codes::MASTER_RECORD_NOT_FOUND]
        );

        // Image 4 belongs to article 3.
        let foreign_image = master_payload("art-1", Action::Delete, json!({"id": 1, "imageid": 4}));
        assert_eq!(validation_codes(&store, &foreign_image), vec![codes::SYNC_MISMATCH]);
    }

    #[test]
    fn validation_accumulates_errors() {
        let store = MemoryStore::default();
        let payload = master_payload("art-1", Action::Update, json!({"id": 5}));
        assert_eq!(
            validation_codes(&store, &payload),
            vec![codes::ARTICLE_NOT_FOUND, codes::MASTER_KEY_MISSING]
        );
    }

    #[test]
    fn retrieve_is_not_implemented() {
        let mut store = MemoryStore::default();
        let payload = Payload::new("art-1", Module::Articles, Action::Retrieve);
        let mut response = Message::respond();
        handler().handle(&payload, &mut store, &mut response);

        let reply = response.payload("art-1").unwrap();
        assert_eq!(reply.status(), Some(501));
        assert_eq!(reply.errors()[0].code(), codes::NOT_IMPLEMENTED);
    }
}
