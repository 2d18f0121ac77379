// WordPress client module: a small blocking HTTP client for the WordPress
// REST API. Every request carries a Basic Authorization header built from the
// username and an application password.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{CopydeskError, Result};
use crate::image::MediaAsset;
use crate::publisher::{CreatedPost, Entity, PostPayload, PostState, PublishTarget};

const PASSWORD_LEN: usize = 24;

/// WordPress REST client. `base_url` is the `wp-json` root.
#[derive(Clone)]
pub struct WordPressClient {
    client: Client,
    base_url: String,
    auth: HeaderValue,
    author_role: String,
    author_email_domain: String,
}

/// Body of `POST /wp/v2/users`.
#[derive(Serialize, Debug)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub password: String,
}

/// Body of `POST /wp/v2/posts`. WordPress takes a single author.
#[derive(Serialize, Debug)]
struct PostRequest<'a> {
    title: &'a str,
    content: &'a str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<u64>,
    #[serde(skip_serializing_if = "no_ids")]
    categories: &'a [u64],
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
}

fn no_ids(ids: &&[u64]) -> bool {
    ids.is_empty()
}

/// Error body WordPress returns when a category name is taken.
#[derive(Deserialize, Debug)]
struct TermExists {
    code: String,
    #[serde(default)]
    data: Option<TermExistsData>,
}

#[derive(Deserialize, Debug)]
struct TermExistsData {
    #[serde(default)]
    term_id: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct MediaResponse {
    id: u64,
    #[serde(default)]
    source_url: Option<String>,
}

impl WordPressClient {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{}:{}", config.wp_user, config.wp_password));
        let auth = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|e| CopydeskError::Configuration(format!("unusable WordPress credentials: {}", e)))?;

        Ok(WordPressClient {
            client,
            base_url: config.wp_url.clone(),
            auth,
            author_role: config.author_role.clone(),
            author_email_domain: config.author_email_domain.clone(),
        })
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}/wp/v2/{}", self.base_url, path)
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let res = req
            .headers(self.auth_headers())
            .send()
            .map_err(CopydeskError::publish_network)?;
        let res = check(res, what)?;
        // The request was accepted; an unreadable body must not be retried.
        let status = res.status().as_u16();
        res.json().map_err(|e| CopydeskError::Publish {
            status: Some(status),
            message: format!("{}: unreadable response: {}", what, e),
        })
    }

    /// Check the credentials against `/users/me`.
    pub fn verify_credentials(&self) -> Result<Entity> {
        let me: Entity = self.send(self.client.get(self.url("users/me")), "credential check")?;
        tracing::info!(id = me.id, name = %me.name, "Authenticated with WordPress");
        Ok(me)
    }

    pub fn new_user(&self, full_name: &str) -> NewUser {
        let mut parts = full_name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");

        let username = if last_name.is_empty() {
            first_name.to_lowercase()
        } else {
            format!("{}.{}", first_name.to_lowercase(), last_name.to_lowercase().replace(' ', ""))
        };
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LEN)
            .map(char::from)
            .collect();

        NewUser {
            email: format!("{}@{}", username, self.author_email_domain),
            username,
            name: full_name.trim().to_string(),
            first_name,
            last_name,
            roles: vec![self.author_role.clone()],
            password,
        }
    }
}

/// Turn a non-success response into a `Publish` error carrying the body.
fn check(res: Response, what: &str) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let txt = res.text().unwrap_or_else(|_| "".into());
    Err(CopydeskError::Publish {
        status: Some(status.as_u16()),
        message: format!("{} failed: {}", what, txt),
    })
}

impl PublishTarget for WordPressClient {
    fn find_authors(&self, name: &str) -> Result<Vec<Entity>> {
        let req = self
            .client
            .get(self.url("users"))
            .query(&[("search", name), ("per_page", "100"), ("context", "edit")]);
        self.send(req, "author search")
    }

    fn create_author(&self, name: &str) -> Result<Entity> {
        let user = self.new_user(name);
        if user.username.is_empty() {
            return Err(CopydeskError::Publish {
                status: None,
                message: format!("cannot derive a username from author name {:?}", name),
            });
        }
        let created: Entity = self.send(self.client.post(self.url("users")).json(&user), "author creation")?;
        tracing::info!(username = %user.username, email = %user.email, "Created WordPress user");
        Ok(created)
    }

    fn list_categories(&self) -> Result<Vec<Entity>> {
        let mut all = Vec::new();
        for page in 1.. {
            let page_str = page.to_string();
            let req = self
                .client
                .get(self.url("categories"))
                .query(&[("per_page", "100"), ("page", page_str.as_str())]);
            let batch: Vec<Entity> = self.send(req, "category listing")?;
            let done = batch.len() < 100;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }

    fn create_category(&self, name: &str) -> Result<Entity> {
        let body = serde_json::json!({ "name": name });
        match self.send(self.client.post(self.url("categories")).json(&body), "category creation") {
            Err(CopydeskError::Publish {
                status: Some(400),
                message,
            }) => match existing_term_id(&message) {
                Some(id) => {
                    tracing::info!(name, id, "Category already exists");
                    Ok(Entity {
                        id,
                        name: name.to_string(),
                    })
                }
                None => Err(CopydeskError::Publish {
                    status: Some(400),
                    message,
                }),
            },
            other => other,
        }
    }

    fn upload_media(&self, asset: &MediaAsset) -> Result<u64> {
        let filename = format!("{}_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"), asset.filename);
        let part = multipart::Part::bytes(asset.bytes.clone())
            .file_name(filename.clone())
            .mime_str(&asset.content_type)
            .map_err(|e| CopydeskError::Image(format!("bad content type {}: {}", asset.content_type, e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("title", filename)
            .text("caption", asset.caption.clone())
            .text("alt_text", asset.caption.clone());

        let media: MediaResponse = self.send(self.client.post(self.url("media")).multipart(form), "media upload")?;
        tracing::debug!(id = media.id, url = ?media.source_url, "Media stored");
        Ok(media.id)
    }

    fn create_post(&self, payload: &PostPayload) -> Result<CreatedPost> {
        let body = PostRequest {
            title: &payload.title,
            content: &payload.content,
            status: payload.status.to_string(),
            author: payload.authors.first().copied(),
            categories: &payload.categories,
            featured_media: payload.featured_media,
        };
        self.send(self.client.post(self.url("posts")).json(&body), "post creation")
    }

    fn fetch_post(&self, id: u64) -> Result<PostState> {
        let req = self
            .client
            .get(self.url(&format!("posts/{}", id)))
            .query(&[("context", "edit")]);
        self.send(req, "post verification")
    }
}

/// The `term_id` of a `term_exists` error, whose body `check` put into `message`.
fn existing_term_id(message: &str) -> Option<u64> {
    let body = &message[message.find('{')?..];
    let err: TermExists = serde_json::from_str(body).ok()?;
    if err.code != "term_exists" {
        return None;
    }
    err.data?.term_id
}
