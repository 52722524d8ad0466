//! Typed client for the quire platform's REST API.
//!
//! One method per backend capability. Every request attaches the stored
//! bearer token when one is present; the public-share calls work without
//! one. No call retries automatically.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, trace};
use quire_access::{
    comment_author, validate_comment_body, Comment, CommentAuthor, DocumentRef, Feed, ShareLink,
    User, UserShareGrant,
};
use serde_derive::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::inflight::{MutationGates, MutationKind};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Response to a login or registration call. Some server builds omit the
/// profile, in which case the session layer backfills it from `/auth/user/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// The issued bearer token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// The authenticated account, when the server includes it
    #[serde(default)]
    pub user: Option<User>,
}

/// A document upload, validated locally before any network traffic
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Path to the PDF on disk
    pub file: PathBuf,
    /// Required display title
    pub title: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Optional topic label
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShareCreateBody {
    feed_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in_days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UserShareBody<'a> {
    feed_id: i64,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserShareAck {
    #[allow(dead_code)]
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    feed_id: i64,
    comment_body: &'a str,
}

#[derive(Debug, Serialize)]
struct GuestCommentBody<'a> {
    commenter_name: &'a str,
    comment_body: &'a str,
}

/// Handle to the platform API. Cheap to clone; clones share the bearer slot
/// and the submission gates.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    size_limit_bytes: u64,
    bearer: Arc<RwLock<Option<String>>>,
    gates: MutationGates,
}

impl ApiClient {
    /// Build a client pointed at a server address such as
    /// `https://quire.example.com`.
    pub fn new(server_address: &str, size_limit_bytes: u64) -> Result<ApiClient, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(ApiClient {
            http,
            base: server_address.trim_end_matches('/').to_owned(),
            size_limit_bytes,
            bearer: Arc::new(RwLock::new(None)),
            gates: MutationGates::default(),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api{}", self.base, path)
    }

    /// Replace the bearer token attached to subsequent requests.
    pub async fn set_bearer(&self, token: Option<String>) {
        *self.bearer.write().await = token;
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer.read().await.as_ref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Exchange a username and password for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        trace!("logging in as `{}`", username);
        let resp = self
            .http
            .post(self.api("/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        check(resp).await?.json().await.map_err(ApiError::from)
    }

    /// Create a new account and log straight into it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        trace!("registering account `{}`", username);
        let resp = self
            .http
            .post(self.api("/auth/register"))
            .form(&[("username", username), ("email", email), ("password", password)])
            .send()
            .await?;
        check(resp).await?.json().await.map_err(ApiError::from)
    }

    /// Fetch the profile behind the attached bearer token.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let req = self.authorize(self.http.get(self.api("/auth/user/me"))).await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Documents visible to the caller: owned plus shared-with.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, ApiError> {
        let req = self.authorize(self.http.get(self.api("/feeds"))).await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Keyword search over titles, descriptions and topics of the caller's
    /// visible documents.
    pub async fn search_feeds(&self, query: &str) -> Result<Vec<Feed>, ApiError> {
        let req = self
            .authorize(self.http.get(self.api("/feeds/search")).query(&[("q", query)]))
            .await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Upload a new document. The request is validated locally first: the
    /// title must be non-blank and the file must exist, fit the configured
    /// size limit and carry the PDF magic. A failed check never reaches the
    /// network.
    pub async fn upload_feed(&self, upload: &UploadRequest) -> Result<Feed, ApiError> {
        let _gate = self.gates.begin(MutationKind::Upload)?;

        if upload.title.trim().is_empty() {
            return Err(ApiError::Validation("a title is required".into()));
        }
        if !upload.file.is_file() {
            return Err(ApiError::Validation(format!(
                "`{}` does not exist or is not a file",
                upload.file.to_string_lossy()
            )));
        }

        let size = tokio::fs::metadata(&upload.file).await?.len();
        if size > self.size_limit_bytes {
            return Err(ApiError::Validation(format!(
                "file is {} bytes, over the {} byte limit",
                size, self.size_limit_bytes
            )));
        }

        let bytes = tokio::fs::read(&upload.file).await?;
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(ApiError::Validation(
                "only PDF files can be uploaded".into(),
            ));
        }

        let file_name = upload
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("document.pdf"));

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;

        let mut form = reqwest::multipart::Form::new()
            .text("title", upload.title.clone())
            .part("file", file_part);
        if let Some(description) = &upload.description {
            form = form.text("description", description.clone());
        }
        if let Some(topic) = &upload.topic {
            form = form.text("topic_name", topic.clone());
        }

        debug!("uploading `{}` ({} bytes)", upload.title, size);
        let req = self
            .authorize(self.http.post(self.api("/feeds")).multipart(form))
            .await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Stream a document's bytes to disk, returning the number written.
    pub async fn download_feed(
        &self,
        feed_id: i64,
        dest: &std::path::Path,
    ) -> Result<u64, ApiError> {
        let req = self
            .authorize(
                self.http
                    .get(self.api(&format!("/feeds/{}/download", feed_id))),
            )
            .await;
        let resp = check(req.send().await?).await?;

        let mut stream = resp.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("downloaded feed {} ({} bytes)", feed_id, written);
        Ok(written)
    }

    /// Mint a public share link for an owned document.
    pub async fn create_public_share(
        &self,
        feed_id: i64,
        expires_in_days: Option<u32>,
    ) -> Result<ShareLink, ApiError> {
        let _gate = self.gates.begin(MutationKind::Share)?;
        let req = self
            .authorize(self.http.post(self.api("/share/public")).json(&ShareCreateBody {
                feed_id,
                expires_in_days,
            }))
            .await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Resolve a public share token to its document. Requires no session;
    /// expired and unknown tokens are indistinguishable to the caller.
    pub async fn resolve_public_share(&self, token: &str) -> Result<Feed, ApiError> {
        let resp = self
            .http
            .get(self.api(&format!("/share/public/{}", token)))
            .send()
            .await?;
        check(resp).await?.json().await.map_err(ApiError::from)
    }

    /// Grant a registered user access to an owned document by email.
    pub async fn create_user_share(&self, feed_id: i64, email: &str) -> Result<String, ApiError> {
        let _gate = self.gates.begin(MutationKind::Share)?;
        let req = self
            .authorize(
                self.http
                    .post(self.api("/share/user"))
                    .json(&UserShareBody { feed_id, email }),
            )
            .await;
        let ack: UserShareAck = check(req.send().await?).await?.json().await?;
        Ok(ack.message)
    }

    /// Documents shared with the calling account through active grants.
    pub async fn shared_with_me(&self) -> Result<Vec<Feed>, ApiError> {
        let req = self.authorize(self.http.get(self.api("/share/user"))).await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// The grant roster for an owned document.
    pub async fn feed_share_roster(&self, feed_id: i64) -> Result<Vec<UserShareGrant>, ApiError> {
        let req = self
            .authorize(
                self.http
                    .get(self.api(&format!("/share/user/feed/{}", feed_id))),
            )
            .await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Revoke a user share. Access disappears on the recipient's next fetch.
    pub async fn revoke_user_share(&self, share_id: i64) -> Result<(), ApiError> {
        let _gate = self.gates.begin(MutationKind::Share)?;
        let req = self
            .authorize(
                self.http
                    .delete(self.api(&format!("/share/user/{}", share_id))),
            )
            .await;
        check(req.send().await?).await?;
        Ok(())
    }

    /// Comments on a document, through whichever path the reference implies.
    pub async fn list_comments(&self, target: &DocumentRef) -> Result<Vec<Comment>, ApiError> {
        let req = match target {
            DocumentRef::Id(feed_id) => {
                self.authorize(
                    self.http
                        .get(self.api("/comments"))
                        .query(&[("feed_id", feed_id)]),
                )
                .await
            }
            DocumentRef::Token(token) => self
                .http
                .get(self.api(&format!("/share/public/{}/comments", token))),
        };
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }

    /// Post a comment on a document.
    ///
    /// `session_user` is the id of the account behind the attached bearer
    /// token, or `None` when no session is active. A live session always
    /// posts through the authenticated path (a token reference is first
    /// resolved to its document), so the comment is attributed to the
    /// account and any supplied guest name is ignored.
    /// Without a session, a token reference needs a guest name, and a direct
    /// id reference is refused before the network.
    pub async fn post_comment(
        &self,
        target: &DocumentRef,
        body: &str,
        guest_name: Option<&str>,
        session_user: Option<i64>,
    ) -> Result<Comment, ApiError> {
        let _gate = self.gates.begin(MutationKind::Comment)?;

        validate_comment_body(body)?;
        let author = comment_author(session_user, guest_name)?;

        match (target, author) {
            (DocumentRef::Id(feed_id), CommentAuthor::Account(_)) => {
                self.post_feed_comment(*feed_id, body).await
            }
            (DocumentRef::Id(_), CommentAuthor::Guest(_)) => Err(ApiError::Validation(
                "log in to comment on a document by id".into(),
            )),
            (DocumentRef::Token(token), CommentAuthor::Guest(name)) => {
                let resp = self
                    .http
                    .post(self.api(&format!("/share/public/{}/comments", token)))
                    .json(&GuestCommentBody {
                        commenter_name: &name,
                        comment_body: body,
                    })
                    .send()
                    .await?;
                check(resp).await?.json().await.map_err(ApiError::from)
            }
            (DocumentRef::Token(token), CommentAuthor::Account(_)) => {
                // the session identity wins over the share path: resolve the
                // token, then post through the authenticated endpoint
                let feed = self.resolve_public_share(token).await?;
                self.post_feed_comment(feed.id, body).await
            }
        }
    }

    async fn post_feed_comment(&self, feed_id: i64, body: &str) -> Result<Comment, ApiError> {
        let req = self
            .authorize(self.http.post(self.api("/comments")).json(&CommentBody {
                feed_id,
                comment_body: body,
            }))
            .await;
        check(req.send().await?).await?.json().await.map_err(ApiError::from)
    }
}

/// Map a non-success response onto the error taxonomy, surfacing the
/// server's `detail` message when one is present.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let detail = error_detail(resp).await;
    Err(match status.as_u16() {
        400 | 422 => ApiError::Validation(detail),
        401 => ApiError::Auth(detail),
        403 => ApiError::Authorization(detail),
        404 | 410 => ApiError::NotFound(detail),
        code => ApiError::Unexpected(code, detail),
    })
}

async fn error_detail(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => value
                .get("detail")
                .and_then(|d| d.as_str())
                .map(str::to_owned)
                .unwrap_or(text),
            Err(_) => text,
        },
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use warp::Filter;

    fn user_json() -> serde_json::Value {
        serde_json::json!({"id": 4, "username": "alice", "email": "alice@example.com"})
    }

    fn feed_json(id: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": "Q1 Report",
            "description": "quarterly numbers",
            "file_path": "app/media/uploads/alice_q1.pdf",
            "host_id": 4,
            "created_at": "2024-06-01T12:00:00Z",
            "updated_at": "2024-06-01T12:00:00Z",
            "comment_count": 0,
            "host": {"username": "alice", "email": "alice@example.com"},
            "comments": []
        })
    }

    fn comment_json(user_id: Option<i64>, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": 31,
            "comment_body": "nice",
            "created_at": "2024-06-01T12:30:00Z",
            "user_id": user_id,
            "commenter_name": name
        })
    }

    /// Serve some routes on a local port until the returned sender fires.
    fn spawn_server<F>(routes: F, port: u16) -> oneshot::Sender<()>
    where
        F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
        F::Extract: warp::Reply,
    {
        let (tx, rx) = oneshot::channel();
        let (_, server) = warp::serve(routes)
            .bind_with_graceful_shutdown(([127, 0, 0, 1], port), async {
                rx.await.ok();
            });
        tokio::task::spawn(server);
        tx
    }

    fn client(port: u16) -> ApiClient {
        ApiClient::new(&format!("http://127.0.0.1:{}", port), 1024 * 1024).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn login_maps_rejected_credentials_to_auth_error() {
        let routes = warp::post()
            .and(warp::path!("api" / "auth" / "login"))
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({"detail": "Incorrect username or password"})),
                    warp::http::StatusCode::UNAUTHORIZED,
                )
            });
        let shutdown = spawn_server(routes, 9401);

        let err = client(9401).login("alice", "wrong").await.unwrap_err();
        match err {
            ApiError::Auth(detail) => assert_eq!(detail, "Incorrect username or password"),
            other => panic!("expected auth error, got {}", other),
        }

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn login_returns_token_and_profile() {
        let routes = warp::post()
            .and(warp::path!("api" / "auth" / "login"))
            .and(warp::body::form())
            .map(|form: std::collections::HashMap<String, String>| {
                assert_eq!(form.get("username").map(String::as_str), Some("alice"));
                assert_eq!(form.get("password").map(String::as_str), Some("hunter2"));
                warp::reply::json(&serde_json::json!({
                    "access_token": "tok-1",
                    "token_type": "bearer",
                    "user": user_json(),
                }))
            });
        let shutdown = spawn_server(routes, 9402);

        let auth = client(9402).login("alice", "hunter2").await.unwrap();
        assert_eq!(auth.access_token, "tok-1");
        assert_eq!(auth.user.unwrap().username, "alice");

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bearer_token_is_attached_once_set() {
        let routes = warp::get()
            .and(warp::path!("api" / "feeds"))
            .and(warp::header::optional::<String>("authorization"))
            .map(|auth: Option<String>| match auth.as_deref() {
                Some("Bearer tok-1") => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!([feed_json(42)])),
                    warp::http::StatusCode::OK,
                ),
                _ => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({"detail": "Could not validate credentials"})),
                    warp::http::StatusCode::UNAUTHORIZED,
                ),
            });
        let shutdown = spawn_server(routes, 9403);

        let client = client(9403);
        assert!(matches!(
            client.list_feeds().await.unwrap_err(),
            ApiError::Auth(_)
        ));

        client.set_bearer(Some("tok-1".into())).await;
        let feeds = client.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, 42);
        assert_eq!(feeds[0].host_id, Some(4));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn public_share_resolves_without_a_session() {
        let routes = warp::get()
            .and(warp::path!("api" / "share" / "public" / String))
            .map(|token: String| {
                if token == "abc123" {
                    warp::reply::with_status(
                        warp::reply::json(&feed_json(7)),
                        warp::http::StatusCode::OK,
                    )
                } else {
                    warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({"detail": "Share link has expired"})),
                        warp::http::StatusCode::GONE,
                    )
                }
            });
        let shutdown = spawn_server(routes, 9404);

        let client = client(9404);
        let feed = client.resolve_public_share("abc123").await.unwrap();
        assert_eq!(feed.id, 7);

        // expired links surface exactly like unknown ones
        assert!(matches!(
            client.resolve_public_share("expired").await.unwrap_err(),
            ApiError::NotFound(_)
        ));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forbidden_and_invalid_map_onto_the_taxonomy() {
        let share = warp::post()
            .and(warp::path!("api" / "share" / "user"))
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({"detail": "Not authorized to share this feed"})),
                    warp::http::StatusCode::FORBIDDEN,
                )
            });
        let public = warp::post()
            .and(warp::path!("api" / "share" / "public"))
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({"detail": "Feed not found"})),
                    warp::http::StatusCode::NOT_FOUND,
                )
            });
        let shutdown = spawn_server(share.or(public), 9405);

        let client = client(9405);
        assert!(matches!(
            client.create_user_share(42, "bob@x.com").await.unwrap_err(),
            ApiError::Authorization(_)
        ));
        assert!(matches!(
            client.create_public_share(9999, None).await.unwrap_err(),
            ApiError::NotFound(_)
        ));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_rejects_bad_input_before_any_network_call() {
        // nothing is listening here, so reaching the network would fail with
        // a different error kind than the one asserted
        let client = ApiClient::new("http://127.0.0.1:1", 64).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let text_file = dir.path().join("notes.txt");
        std::fs::write(&text_file, b"plain text").unwrap();

        let not_pdf = UploadRequest {
            file: text_file.clone(),
            title: "x".into(),
            description: None,
            topic: None,
        };
        assert!(matches!(
            client.upload_feed(&not_pdf).await.unwrap_err(),
            ApiError::Validation(_)
        ));

        let blank_title = UploadRequest {
            file: text_file.clone(),
            title: "   ".into(),
            description: None,
            topic: None,
        };
        assert!(matches!(
            client.upload_feed(&blank_title).await.unwrap_err(),
            ApiError::Validation(_)
        ));

        let missing = UploadRequest {
            file: dir.path().join("nope.pdf"),
            title: "x".into(),
            description: None,
            topic: None,
        };
        assert!(matches!(
            client.upload_feed(&missing).await.unwrap_err(),
            ApiError::Validation(_)
        ));

        let big = dir.path().join("big.pdf");
        std::fs::write(&big, [b"%PDF-1.4 ".as_ref(), &[0u8; 128]].concat()).unwrap();
        let oversize = UploadRequest {
            file: big,
            title: "x".into(),
            description: None,
            topic: None,
        };
        assert!(matches!(
            client.upload_feed(&oversize).await.unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_sends_the_document() {
        let routes = warp::post()
            .and(warp::path!("api" / "feeds"))
            .map(|| warp::reply::json(&feed_json(99)));
        let shutdown = spawn_server(routes, 9406);

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 fake body").unwrap();

        let upload = UploadRequest {
            file: pdf,
            title: "Q1 Report".into(),
            description: Some("quarterly numbers".into()),
            topic: Some("finance".into()),
        };
        let feed = client(9406).upload_feed(&upload).await.unwrap();
        assert_eq!(feed.id, 99);

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_streams_bytes_to_disk() {
        let routes = warp::get()
            .and(warp::path!("api" / "feeds" / i64 / "download"))
            .map(|_id| "%PDF-1.4 fake body");
        let shutdown = spawn_server(routes, 9407);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        let written = client(9407).download_feed(5, &dest).await.unwrap();

        assert_eq!(written, 18);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 fake body");

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn guest_comment_posts_through_the_share_path() {
        let routes = warp::post()
            .and(warp::path!("api" / "share" / "public" / String / "comments"))
            .and(warp::body::json())
            .map(|token: String, body: serde_json::Value| {
                assert_eq!(token, "abc123");
                assert_eq!(body["commenter_name"], "Guest");
                assert_eq!(body["comment_body"], "nice");
                warp::reply::json(&comment_json(None, "Guest"))
            });
        let shutdown = spawn_server(routes, 9408);

        let comment = client(9408)
            .post_comment(&DocumentRef::Token("abc123".into()), "nice", Some("Guest"), None)
            .await
            .unwrap();
        assert_eq!(comment.commenter_name.as_deref(), Some("Guest"));
        assert_eq!(comment.user_id, None);

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn session_identity_wins_on_the_token_path() {
        // no guest route is mounted: a comment through the share path would 404
        let resolve = warp::get()
            .and(warp::path!("api" / "share" / "public" / String))
            .map(|_token: String| warp::reply::json(&feed_json(7)));
        let comments = warp::post()
            .and(warp::path!("api" / "comments"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                assert_eq!(body["feed_id"], 7);
                warp::reply::json(&comment_json(Some(4), "alice"))
            });
        let shutdown = spawn_server(resolve.or(comments), 9409);

        let client = client(9409);
        client.set_bearer(Some("tok-1".into())).await;

        let comment = client
            .post_comment(
                &DocumentRef::Token("abc123".into()),
                "nice",
                Some("SomeoneElse"),
                Some(4),
            )
            .await
            .unwrap();
        assert_eq!(comment.user_id, Some(4));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn comments_without_an_identity_never_leave_the_client() {
        let client = ApiClient::new("http://127.0.0.1:1", 64).unwrap();

        // no session, no name
        assert!(matches!(
            client
                .post_comment(&DocumentRef::Token("abc123".into()), "nice", None, None)
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));

        // a guest cannot address a document by id
        assert!(matches!(
            client
                .post_comment(&DocumentRef::Id(42), "nice", Some("Guest"), None)
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));

        // empty body
        assert!(matches!(
            client
                .post_comment(&DocumentRef::Id(42), "  ", None, Some(4))
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_comment_submissions_are_refused() {
        let routes = warp::post()
            .and(warp::path!("api" / "share" / "public" / String / "comments"))
            .and(warp::body::json())
            .and_then(|_token: String, _body: serde_json::Value| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<_, warp::Rejection>(warp::reply::json(&comment_json(None, "Guest")))
            });
        let shutdown = spawn_server(routes, 9410);

        let client = client(9410);
        let target = DocumentRef::Token("abc123".into());

        let (a, b) = tokio::join!(
            client.post_comment(&target, "first", Some("Guest"), None),
            client.post_comment(&target, "second", Some("Guest"), None),
        );

        let busy = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(ApiError::Busy(_))))
            .count();
        let ok = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!((ok, busy), (1, 1));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn share_roster_and_revocation() {
        let roster = warp::get()
            .and(warp::path!("api" / "share" / "user" / "feed" / i64))
            .map(|_feed: i64| {
                warp::reply::json(&serde_json::json!([{
                    "id": 11,
                    "feed_id": 42,
                    "shared_by": user_json(),
                    "shared_with": {"id": 5, "username": "bob", "email": "bob@x.com"},
                    "created_at": "2024-06-01T12:00:00Z",
                    "is_active": true
                }]))
            });
        let revoke = warp::delete()
            .and(warp::path!("api" / "share" / "user" / i64))
            .map(|_id: i64| {
                warp::reply::with_status(warp::reply(), warp::http::StatusCode::NO_CONTENT)
            });
        let shutdown = spawn_server(roster.or(revoke), 9411);

        let client = client(9411);
        let grants = client.feed_share_roster(42).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].shared_with.username, "bob");
        assert!(grants[0].is_active);

        client.revoke_user_share(11).await.unwrap();

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn public_share_round_trips_to_the_same_document() {
        let issued: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let issued_create = issued.clone();
        let create = warp::post()
            .and(warp::path!("api" / "share" / "public"))
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                let token = format!("t-{}", body["feed_id"]);
                *issued_create.lock().unwrap() = Some(token.clone());
                warp::reply::json(&serde_json::json!({
                    "share_token": token,
                    "share_url": format!("/view/shared/{}", token),
                    "expires_at": null,
                }))
            });

        let issued_resolve = issued.clone();
        let resolve = warp::get()
            .and(warp::path!("api" / "share" / "public" / String))
            .map(move |token: String| {
                if issued_resolve.lock().unwrap().as_deref() == Some(token.as_str()) {
                    warp::reply::with_status(
                        warp::reply::json(&feed_json(42)),
                        warp::http::StatusCode::OK,
                    )
                } else {
                    warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({"detail": "Share not found or inactive"})),
                        warp::http::StatusCode::NOT_FOUND,
                    )
                }
            });
        let shutdown = spawn_server(create.or(resolve), 9413);

        let client = client(9413);
        let link = client.create_public_share(42, Some(7)).await.unwrap();
        assert_eq!(link.share_token, "t-42");

        let feed = client.resolve_public_share(&link.share_token).await.unwrap();
        assert_eq!(feed.id, 42);

        assert!(matches!(
            client.resolve_public_share("bogus").await.unwrap_err(),
            ApiError::NotFound(_)
        ));

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn revoked_share_is_gone_on_the_next_fetch() {
        let active = Arc::new(AtomicBool::new(true));

        let active_list = active.clone();
        let list = warp::get()
            .and(warp::path!("api" / "share" / "user"))
            .map(move || {
                if active_list.load(Ordering::SeqCst) {
                    warp::reply::json(&serde_json::json!([feed_json(42)]))
                } else {
                    warp::reply::json(&serde_json::json!([]))
                }
            });

        let active_revoke = active.clone();
        let revoke = warp::delete()
            .and(warp::path!("api" / "share" / "user" / i64))
            .map(move |_id: i64| {
                active_revoke.store(false, Ordering::SeqCst);
                warp::reply::with_status(warp::reply(), warp::http::StatusCode::NO_CONTENT)
            });
        let shutdown = spawn_server(list.or(revoke), 9414);

        let client = client(9414);
        assert_eq!(client.shared_with_me().await.unwrap().len(), 1);

        client.revoke_user_share(11).await.unwrap();

        // nothing is cached client side, the next fetch reflects the revocation
        assert!(client.shared_with_me().await.unwrap().is_empty());

        let _ = shutdown.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_passes_the_query_through() {
        let routes = warp::get()
            .and(warp::path!("api" / "feeds" / "search"))
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .map(|q: std::collections::HashMap<String, String>| {
                assert_eq!(q.get("q").map(String::as_str), Some("quarterly"));
                warp::reply::json(&serde_json::json!([feed_json(42)]))
            });
        let shutdown = spawn_server(routes, 9412);

        let feeds = client(9412).search_feeds("quarterly").await.unwrap();
        assert_eq!(feeds.len(), 1);

        let _ = shutdown.send(());
    }
}
