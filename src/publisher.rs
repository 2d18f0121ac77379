// Publisher: authors, categories and posts on the publishing target.
//
// Lookups are exact, case-insensitive name matches. Anything not found is
// created. Resolved ids are cached for the rest of the run, so a name seen
// twice never produces two entities.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::unescape_html;
use crate::error::Result;
use crate::image::MediaAsset;

/// A named entity on the target (author or category).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publish,
    Draft,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostStatus::Publish => write!(f, "publish"),
            PostStatus::Draft => write!(f, "draft"),
        }
    }
}

/// Everything needed to create one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub featured_media: Option<u64>,
    pub authors: Vec<u64>,
    pub categories: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPost {
    pub id: u64,
    #[serde(default)]
    pub link: Option<String>,
}

/// The fields of a stored post that creation is expected to have set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostState {
    /// 0 when the post has no featured image.
    #[serde(default)]
    pub featured_media: u64,
    #[serde(default)]
    pub categories: Vec<u64>,
}

/// Whether a created post carries the image and categories it was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Mismatch(Vec<String>),
    Unavailable(String),
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Verified => write!(f, "verified"),
            Verification::Mismatch(problems) => write!(f, "verification failed: {}", problems.join("; ")),
            Verification::Unavailable(reason) => write!(f, "not verified: {}", reason),
        }
    }
}

/// The publishing target's REST surface.
pub trait PublishTarget {
    /// Authors whose name matches a search for `name` (loosely; callers filter).
    fn find_authors(&self, name: &str) -> Result<Vec<Entity>>;
    fn create_author(&self, name: &str) -> Result<Entity>;
    fn list_categories(&self) -> Result<Vec<Entity>>;
    fn create_category(&self, name: &str) -> Result<Entity>;
    /// Upload one media file, returning its id.
    fn upload_media(&self, asset: &MediaAsset) -> Result<u64>;
    fn create_post(&self, payload: &PostPayload) -> Result<CreatedPost>;
    fn fetch_post(&self, id: u64) -> Result<PostState>;
}

pub struct Publisher<'a> {
    target: &'a dyn PublishTarget,
    authors: RefCell<HashMap<String, u64>>,
    categories: RefCell<Option<Vec<Entity>>>,
}

impl<'a> Publisher<'a> {
    pub fn new(target: &'a dyn PublishTarget) -> Self {
        Self {
            target,
            authors: RefCell::new(HashMap::new()),
            categories: RefCell::new(None),
        }
    }

    pub fn target(&self) -> &'a dyn PublishTarget {
        self.target
    }

    pub fn resolve_or_create_author(&self, name: &str) -> Result<u64> {
        let name = name.trim();
        let key = name.to_lowercase();
        if let Some(id) = self.authors.borrow().get(&key) {
            return Ok(*id);
        }

        let existing = self
            .target
            .find_authors(name)?
            .into_iter()
            .find(|author| same_name(&author.name, &key));

        let id = match existing {
            Some(author) => {
                tracing::debug!(name, id = author.id, "Found author");
                author.id
            }
            None => {
                let created = self.target.create_author(name)?;
                tracing::info!(name, id = created.id, "Created author");
                created.id
            }
        };

        self.authors.borrow_mut().insert(key, id);
        Ok(id)
    }

    pub fn resolve_or_create_category(&self, name: &str) -> Result<u64> {
        let name = name.trim();
        let key = name.to_lowercase();

        if self.categories.borrow().is_none() {
            let listed = self.target.list_categories()?;
            tracing::debug!(count = listed.len(), "Loaded categories");
            *self.categories.borrow_mut() = Some(listed);
        }

        let found = self
            .categories
            .borrow()
            .iter()
            .flatten()
            .find(|c| same_name(&c.name, &key))
            .map(|c| c.id);
        if let Some(id) = found {
            return Ok(id);
        }

        let created = self.target.create_category(name)?;
        tracing::info!(name, id = created.id, "Created category");
        let id = created.id;
        if let Some(list) = self.categories.borrow_mut().as_mut() {
            list.push(created);
        }
        Ok(id)
    }

    /// Resolve a list of names, dropping duplicate ids while keeping order.
    pub fn resolve_authors(&self, names: &[String]) -> Result<Vec<u64>> {
        resolve_all(names, |n| self.resolve_or_create_author(n))
    }

    pub fn resolve_categories(&self, names: &[String]) -> Result<Vec<u64>> {
        resolve_all(names, |n| self.resolve_or_create_category(n))
    }

    pub fn create_post(&self, payload: &PostPayload) -> Result<CreatedPost> {
        let post = self.target.create_post(payload)?;
        tracing::info!(id = post.id, status = %payload.status, "Post created");
        Ok(post)
    }

    /// Re-read a created post and compare its featured image and categories
    /// with what was sent. Never fails: an unreadable post is `Unavailable`.
    pub fn verify_post(&self, post_id: u64, payload: &PostPayload) -> Verification {
        let state = match self.target.fetch_post(post_id) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "Post verification unavailable");
                return Verification::Unavailable(e.to_string());
            }
        };

        let mut problems = Vec::new();
        if let Some(media) = payload.featured_media {
            if state.featured_media != media {
                problems.push(format!("featured image {} not set (found {})", media, state.featured_media));
            }
        }
        if !payload.categories.is_empty() {
            let mut sent = payload.categories.clone();
            let mut stored = state.categories.clone();
            sent.sort_unstable();
            stored.sort_unstable();
            if sent != stored {
                problems.push(format!("categories {:?} stored as {:?}", payload.categories, state.categories));
            }
        }

        if problems.is_empty() {
            tracing::debug!(post_id, "Post verified");
            Verification::Verified
        } else {
            tracing::warn!(post_id, ?problems, "Post verification failed");
            Verification::Mismatch(problems)
        }
    }
}

/// WordPress returns names HTML-encoded (`Arts &amp; Culture`).
fn same_name(stored: &str, wanted_lower: &str) -> bool {
    unescape_html(stored).trim().to_lowercase() == wanted_lower
}

fn resolve_all<F>(names: &[String], mut resolve: F) -> Result<Vec<u64>>
where
    F: FnMut(&str) -> Result<u64>,
{
    let mut ids = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let id = resolve(name)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopydeskError;

    #[derive(Default)]
    struct FakeTarget {
        authors: RefCell<Vec<Entity>>,
        categories: RefCell<Vec<Entity>>,
        author_searches: RefCell<u32>,
        category_lists: RefCell<u32>,
        fail_create: bool,
        stored: RefCell<Option<PostState>>,
    }

    impl FakeTarget {
        fn with(authors: &[(u64, &str)], categories: &[(u64, &str)]) -> Self {
            let entities = |list: &[(u64, &str)]| {
                list.iter()
                    .map(|(id, name)| Entity {
                        id: *id,
                        name: name.to_string(),
                    })
                    .collect::<Vec<_>>()
            };
            Self {
                authors: RefCell::new(entities(authors)),
                categories: RefCell::new(entities(categories)),
                ..Default::default()
            }
        }

        fn next_id(&self) -> u64 {
            100 + (self.authors.borrow().len() + self.categories.borrow().len()) as u64
        }
    }

    impl PublishTarget for FakeTarget {
        fn find_authors(&self, name: &str) -> Result<Vec<Entity>> {
            *self.author_searches.borrow_mut() += 1;
            let needle = name.to_lowercase().split_whitespace().next().unwrap_or("").to_string();
            Ok(self
                .authors
                .borrow()
                .iter()
                .filter(|a| a.name.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        }

        fn create_author(&self, name: &str) -> Result<Entity> {
            if self.fail_create {
                return Err(CopydeskError::Publish {
                    status: Some(403),
                    message: "rest_cannot_create_user".into(),
                });
            }
            let entity = Entity {
                id: self.next_id(),
                name: name.into(),
            };
            self.authors.borrow_mut().push(entity.clone());
            Ok(entity)
        }

        fn list_categories(&self) -> Result<Vec<Entity>> {
            *self.category_lists.borrow_mut() += 1;
            Ok(self.categories.borrow().clone())
        }

        fn create_category(&self, name: &str) -> Result<Entity> {
            let entity = Entity {
                id: self.next_id(),
                name: name.into(),
            };
            self.categories.borrow_mut().push(entity.clone());
            Ok(entity)
        }

        fn upload_media(&self, _asset: &MediaAsset) -> Result<u64> {
            unimplemented!()
        }

        fn create_post(&self, _payload: &PostPayload) -> Result<CreatedPost> {
            Ok(CreatedPost {
                id: 1,
                link: Some("https://example.com/?p=1".into()),
            })
        }

        fn fetch_post(&self, id: u64) -> Result<PostState> {
            self.stored.borrow().clone().ok_or(CopydeskError::Publish {
                status: Some(404),
                message: format!("post {} not found", id),
            })
        }
    }

    fn payload(featured_media: Option<u64>, categories: Vec<u64>) -> PostPayload {
        PostPayload {
            title: "Title".into(),
            content: "<p>Body</p>".into(),
            status: PostStatus::Publish,
            featured_media,
            authors: vec![1],
            categories,
        }
    }

    #[test]
    fn test_existing_author_exact_match_case_insensitive() {
        let target = FakeTarget::with(&[(5, "Ana Diaz Jr"), (6, "ana diaz")], &[]);
        let publisher = Publisher::new(&target);
        assert_eq!(publisher.resolve_or_create_author("Ana Diaz").unwrap(), 6);
        assert_eq!(target.authors.borrow().len(), 2);
    }

    #[test]
    fn test_missing_author_created_once() {
        let target = FakeTarget::with(&[], &[]);
        let publisher = Publisher::new(&target);

        let first = publisher.resolve_or_create_author("Bo Li").unwrap();
        let second = publisher.resolve_or_create_author("bo li").unwrap();
        assert_eq!(first, second);
        assert_eq!(target.authors.borrow().len(), 1);
        assert_eq!(*target.author_searches.borrow(), 1);
    }

    #[test]
    fn test_category_resolves_to_same_id_without_duplicates() {
        let target = FakeTarget::with(&[], &[(3, "Sports"), (4, "News")]);
        let publisher = Publisher::new(&target);

        assert_eq!(publisher.resolve_or_create_category("sports").unwrap(), 3);
        assert_eq!(publisher.resolve_or_create_category("Sports").unwrap(), 3);
        assert_eq!(target.categories.borrow().len(), 2);
        assert_eq!(*target.category_lists.borrow(), 1);
    }

    #[test]
    fn test_new_category_created_then_reused() {
        let target = FakeTarget::with(&[], &[(3, "Sports")]);
        let publisher = Publisher::new(&target);

        let ids = publisher
            .resolve_categories(&["Opinion".into(), "opinion ".into(), "Sports".into()])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1], 3);
        assert_eq!(target.categories.borrow().len(), 2);
    }

    #[test]
    fn test_author_creation_failure_propagates() {
        let target = FakeTarget {
            fail_create: true,
            ..Default::default()
        };
        let publisher = Publisher::new(&target);
        let err = publisher.resolve_or_create_author("Cy Young").unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_post_status_wire_names() {
        assert_eq!(serde_json::to_value(PostStatus::Publish).unwrap(), "publish");
        assert_eq!(serde_json::to_value(PostStatus::Draft).unwrap(), "draft");
    }

    #[test]
    fn test_encoded_category_name_matches_without_creating() {
        let target = FakeTarget::with(&[], &[(12, "Arts &amp; Culture")]);
        let publisher = Publisher::new(&target);

        assert_eq!(publisher.resolve_or_create_category("Arts & Culture").unwrap(), 12);
        assert_eq!(target.categories.borrow().len(), 1);
    }

    #[test]
    fn test_encoded_author_name_matches() {
        let target = FakeTarget::with(&[(8, "Sean O&#039;Neil")], &[]);
        let publisher = Publisher::new(&target);
        assert_eq!(publisher.resolve_or_create_author("Sean O'Neil").unwrap(), 8);
    }

    #[test]
    fn test_verify_post_matches_sent_fields() {
        let target = FakeTarget::default();
        *target.stored.borrow_mut() = Some(PostState {
            featured_media: 501,
            categories: vec![4, 3],
        });
        let publisher = Publisher::new(&target);
        assert_eq!(publisher.verify_post(1, &payload(Some(501), vec![3, 4])), Verification::Verified);
    }

    #[test]
    fn test_verify_post_reports_dropped_image() {
        let target = FakeTarget::default();
        *target.stored.borrow_mut() = Some(PostState {
            featured_media: 0,
            categories: vec![3],
        });
        let publisher = Publisher::new(&target);

        let verification = publisher.verify_post(1, &payload(Some(501), vec![3]));
        assert!(matches!(&verification, Verification::Mismatch(p) if p.len() == 1));
        assert!(verification.to_string().starts_with("verification failed: featured image 501"));
    }

    #[test]
    fn test_verify_post_unreadable_is_unavailable() {
        let target = FakeTarget::default();
        let publisher = Publisher::new(&target);
        let verification = publisher.verify_post(1, &payload(None, vec![]));
        assert!(matches!(verification, Verification::Unavailable(_)));
    }
}
