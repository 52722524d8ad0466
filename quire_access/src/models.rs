//! Wire models for the quire platform API

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

use crate::access::CommentAuthor;

/// A registered account on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique ID identifying the account
    pub id: i64,
    /// Unique login name
    pub username: String,
    /// Unique contact address
    pub email: String,
}

/// Denormalized owner block attached to a feed for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Login name of the owning account
    pub username: String,
    /// Contact address of the owning account, when the server expands it
    #[serde(default)]
    pub email: Option<String>,
}

/// Optional label attached to a feed at upload time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Unique ID identifying the topic
    pub id: i64,
    /// The label itself
    pub topic: String,
}

/// A single uploaded PDF and its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// Unique ID identifying the document
    pub id: i64,
    /// Required display title
    pub title: String,
    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Server-resolved location of the uploaded file
    pub file_path: String,
    /// ID of the owning account; absent when the owner was deleted
    #[serde(default)]
    pub host_id: Option<i64>,
    /// The time the document was uploaded
    pub created_at: DateTime<Utc>,
    /// The time the document was last modified
    pub updated_at: DateTime<Utc>,
    /// Denormalized count of comments attached to the document
    #[serde(default)]
    pub comment_count: i64,
    /// Denormalized owner block, when the server expands it
    #[serde(default)]
    pub host: Option<Host>,
    /// Optional topic label
    #[serde(default)]
    pub topic: Option<Topic>,
    /// Attached comments, when the server expands them
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A comment attached to exactly one feed.
///
/// Authorship is a union: a comment belongs either to a registered account
/// (`user_id`) or to an anonymous visitor who supplied a display name
/// (`commenter_name`). The authenticated path also denormalizes the account's
/// username into `commenter_name`, so when both fields arrive the account id
/// is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique ID identifying the comment
    pub id: i64,
    /// The comment text
    pub comment_body: String,
    /// The time the comment was posted
    pub created_at: DateTime<Utc>,
    /// The time the comment was last modified; the public path omits this
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// ID of the authoring account, when posted while authenticated
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Free-text display name, when posted through a share link
    #[serde(default)]
    pub commenter_name: Option<String>,
}

impl Comment {
    /// Resolve the authorship union. Returns `None` for a malformed record
    /// that carries neither an account id nor a usable display name.
    pub fn author(&self) -> Option<CommentAuthor> {
        if let Some(id) = self.user_id {
            return Some(CommentAuthor::Account(id));
        }
        match &self.commenter_name {
            Some(name) if !name.trim().is_empty() => {
                Some(CommentAuthor::Guest(name.trim().to_owned()))
            }
            _ => None,
        }
    }

    /// Display name for listings: the denormalized username for account
    /// comments, the supplied name for guest comments.
    pub fn display_name(&self) -> &str {
        match &self.commenter_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => "anonymous",
        }
    }
}

/// Response to creating a public share: the capability token and where to
/// point a browser at it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    /// The opaque, unguessable capability token
    pub share_token: String,
    /// Server-relative URL unlocking the document
    pub share_url: String,
    /// When the link stops working; `None` for no expiry
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareLink {
    /// Join the server-relative share URL onto a server address to produce a
    /// link that can be handed to another person.
    pub fn absolute_url(&self, server_address: &str) -> String {
        format!(
            "{}/{}",
            server_address.trim_end_matches('/'),
            self.share_url.trim_start_matches('/')
        )
    }
}

/// A grant of access to one document for one registered recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserShareGrant {
    /// Unique ID identifying the grant
    pub id: i64,
    /// The document the grant unlocks
    pub feed_id: i64,
    /// The account that issued the grant
    pub shared_by: User,
    /// The account the document was shared with
    pub shared_with: User,
    /// The time the grant was issued
    pub created_at: DateTime<Utc>,
    /// Whether the grant still confers access; revocation flips this off
    pub is_active: bool,
}

/// The credential pair persisted by the client between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// The opaque bearer token issued at login
    pub token: String,
    /// The profile of the authenticated account
    pub user: User,
}
