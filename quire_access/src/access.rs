//! Resolution of who may read and comment on a document.
//!
//! A document is reachable through exactly three disjoint paths: its owner,
//! the recipient of an active user share, or anyone holding a live public
//! share token. Resolution is a pure function over plain fact records so the
//! same rules can be evaluated anywhere, with the clock supplied by the
//! caller.

use chrono::{DateTime, Utc};

/// A reference to a document: either a direct id, or a public capability
/// token standing in for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// Direct reference by document id
    Id(i64),
    /// Reference through a public share token
    Token(String),
}

/// A public share token bound to a document
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// The opaque capability token
    pub token: String,
    /// When the token stops working; `None` for no expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the token has been deactivated
    pub is_active: bool,
}

impl TokenRecord {
    /// A token confers access while it is active and unexpired. Expiry is
    /// evaluated against the supplied clock at resolution time, never cached.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// A user-to-user grant record, reduced to what resolution needs
#[derive(Debug, Clone, Copy)]
pub struct GrantRecord {
    /// The account the document was shared with
    pub shared_with_id: i64,
    /// Whether the grant still confers access
    pub is_active: bool,
}

/// Everything resolution needs to know about one document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// The document id
    pub feed_id: i64,
    /// The owning account; absent when the owner was deleted
    pub host_id: Option<i64>,
    /// Public share tokens bound to this document
    pub tokens: Vec<TokenRecord>,
    /// User-to-user grants for this document
    pub grants: Vec<GrantRecord>,
}

/// The path under which access was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// The session user owns the document
    Owner,
    /// The session user holds an active user share
    SharedUser,
    /// The caller presented a live public share token
    PublicToken,
}

/// A successful resolution. Every path in the permission matrix grants both
/// read and comment, so holding an `Access` is sufficient for either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// The document the access applies to
    pub feed_id: i64,
    /// Which rule matched
    pub path: AccessPath,
}

/// Denied resolution.
///
/// Unknown ids, unknown tokens, expired or revoked tokens, missing sessions
/// and third-party callers all collapse into the same variant: a caller with
/// no access path must not be able to learn whether the document exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// No access path matched the request
    NotFound,
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessError::NotFound => write!(f, "document not found"),
        }
    }
}

impl std::error::Error for AccessError {}

/// Resolve an access request against the known facts.
///
/// Paths are tried in a fixed priority order:
///
/// 1. a presented token is resolved on its own, with any session ignored;
///    token access never requires a login;
/// 2. a direct id requires a session, and ownership is checked first;
/// 3. failing that, an active user share naming the session's account.
///
/// The first matching path wins.
pub fn resolve_access(
    documents: &[DocumentRecord],
    reference: &DocumentRef,
    session_user: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Access, AccessError> {
    match reference {
        DocumentRef::Token(token) => documents
            .iter()
            .find(|doc| {
                doc.tokens
                    .iter()
                    .any(|t| t.token == *token && t.is_live(now))
            })
            .map(|doc| Access {
                feed_id: doc.feed_id,
                path: AccessPath::PublicToken,
            })
            .ok_or(AccessError::NotFound),
        DocumentRef::Id(id) => {
            let session_user = session_user.ok_or(AccessError::NotFound)?;
            let doc = documents
                .iter()
                .find(|d| d.feed_id == *id)
                .ok_or(AccessError::NotFound)?;

            if doc.host_id == Some(session_user) {
                return Ok(Access {
                    feed_id: doc.feed_id,
                    path: AccessPath::Owner,
                });
            }

            if doc
                .grants
                .iter()
                .any(|g| g.is_active && g.shared_with_id == session_user)
            {
                return Ok(Access {
                    feed_id: doc.feed_id,
                    path: AccessPath::SharedUser,
                });
            }

            Err(AccessError::NotFound)
        }
    }
}

/// The resolved identity a new comment will carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAuthor {
    /// Attributed to a registered account
    Account(i64),
    /// Attributed to a free-text display name
    Guest(String),
}

/// A comment submission rejected before it reaches the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentError {
    /// No session and no display name was supplied
    MissingName,
    /// The comment text is empty
    EmptyBody,
}

impl std::fmt::Display for CommentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentError::MissingName => {
                write!(f, "a display name is required to comment without logging in")
            }
            CommentError::EmptyBody => write!(f, "comment text must not be empty"),
        }
    }
}

impl std::error::Error for CommentError {}

/// Decide the identity a new comment is created under.
///
/// An active session always wins: the comment is attributed to the account
/// even when a display name was also supplied. Without a session a non-blank
/// display name is required.
pub fn comment_author(
    session_user: Option<i64>,
    supplied_name: Option<&str>,
) -> Result<CommentAuthor, CommentError> {
    if let Some(id) = session_user {
        return Ok(CommentAuthor::Account(id));
    }

    match supplied_name {
        Some(name) if !name.trim().is_empty() => Ok(CommentAuthor::Guest(name.trim().to_owned())),
        _ => Err(CommentError::MissingName),
    }
}

/// Reject empty comment text before any network call
pub fn validate_comment_body(body: &str) -> Result<(), CommentError> {
    if body.trim().is_empty() {
        return Err(CommentError::EmptyBody);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const ALICE: i64 = 1;
    const BOB: i64 = 2;
    const EVE: i64 = 3;

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Document 42, owned by alice, shared with bob, with one live and one
    /// expired public token.
    fn world() -> Vec<DocumentRecord> {
        vec![DocumentRecord {
            feed_id: 42,
            host_id: Some(ALICE),
            tokens: vec![
                TokenRecord {
                    token: "live-token".into(),
                    expires_at: Some(clock() + Duration::days(7)),
                    is_active: true,
                },
                TokenRecord {
                    token: "stale-token".into(),
                    expires_at: Some(clock() - Duration::days(1)),
                    is_active: true,
                },
                TokenRecord {
                    token: "revoked-token".into(),
                    expires_at: None,
                    is_active: false,
                },
            ],
            grants: vec![
                GrantRecord {
                    shared_with_id: BOB,
                    is_active: true,
                },
                GrantRecord {
                    shared_with_id: EVE,
                    is_active: false,
                },
            ],
        }]
    }

    #[test]
    fn owner_reads_by_id() {
        let access =
            resolve_access(&world(), &DocumentRef::Id(42), Some(ALICE), clock()).unwrap();
        assert_eq!(access.path, AccessPath::Owner);
        assert_eq!(access.feed_id, 42);
    }

    #[test]
    fn active_grant_reads_by_id() {
        let access = resolve_access(&world(), &DocumentRef::Id(42), Some(BOB), clock()).unwrap();
        assert_eq!(access.path, AccessPath::SharedUser);
    }

    #[test]
    fn revoked_grant_is_denied() {
        let err = resolve_access(&world(), &DocumentRef::Id(42), Some(EVE), clock()).unwrap_err();
        assert_eq!(err, AccessError::NotFound);
    }

    #[test]
    fn third_party_is_denied() {
        let err = resolve_access(&world(), &DocumentRef::Id(42), Some(99), clock()).unwrap_err();
        assert_eq!(err, AccessError::NotFound);
    }

    #[test]
    fn id_path_requires_a_session() {
        let err = resolve_access(&world(), &DocumentRef::Id(42), None, clock()).unwrap_err();
        assert_eq!(err, AccessError::NotFound);
    }

    #[test]
    fn live_token_needs_no_session() {
        let access = resolve_access(
            &world(),
            &DocumentRef::Token("live-token".into()),
            None,
            clock(),
        )
        .unwrap();
        assert_eq!(access.path, AccessPath::PublicToken);
        assert_eq!(access.feed_id, 42);
    }

    #[test]
    fn live_token_ignores_any_session() {
        // resolution through the token path is self contained, whoever holds it
        for session in [None, Some(ALICE), Some(EVE)] {
            let access = resolve_access(
                &world(),
                &DocumentRef::Token("live-token".into()),
                session,
                clock(),
            )
            .unwrap();
            assert_eq!(access.path, AccessPath::PublicToken);
        }
    }

    #[test]
    fn expired_token_is_denied_even_to_the_owner() {
        let err = resolve_access(
            &world(),
            &DocumentRef::Token("stale-token".into()),
            Some(ALICE),
            clock(),
        )
        .unwrap_err();
        assert_eq!(err, AccessError::NotFound);
    }

    #[test]
    fn deactivated_token_is_denied() {
        let err = resolve_access(
            &world(),
            &DocumentRef::Token("revoked-token".into()),
            None,
            clock(),
        )
        .unwrap_err();
        assert_eq!(err, AccessError::NotFound);
    }

    #[test]
    fn denials_are_indistinguishable() {
        // a miss on an unknown document and a miss on a real-but-forbidden
        // document must produce the same error shape
        let unknown =
            resolve_access(&world(), &DocumentRef::Id(9999), Some(EVE), clock()).unwrap_err();
        let forbidden =
            resolve_access(&world(), &DocumentRef::Id(42), Some(99), clock()).unwrap_err();
        assert_eq!(unknown, forbidden);

        let unknown_token = resolve_access(
            &world(),
            &DocumentRef::Token("no-such-token".into()),
            None,
            clock(),
        )
        .unwrap_err();
        assert_eq!(unknown_token, forbidden);
    }

    #[test]
    fn token_without_expiry_stays_live() {
        let token = TokenRecord {
            token: "t".into(),
            expires_at: None,
            is_active: true,
        };
        assert!(token.is_live(clock() + Duration::days(10_000)));
    }

    #[test]
    fn session_identity_wins_over_supplied_name() {
        let author = comment_author(Some(ALICE), Some("Guest")).unwrap();
        assert_eq!(author, CommentAuthor::Account(ALICE));
    }

    #[test]
    fn guest_comment_requires_a_name() {
        assert_eq!(comment_author(None, None), Err(CommentError::MissingName));
        assert_eq!(
            comment_author(None, Some("  ")),
            Err(CommentError::MissingName)
        );
        assert_eq!(
            comment_author(None, Some("Guest")),
            Ok(CommentAuthor::Guest("Guest".into()))
        );
    }

    #[test]
    fn empty_comment_bodies_are_rejected() {
        assert_eq!(validate_comment_body("  \n"), Err(CommentError::EmptyBody));
        assert!(validate_comment_body("nice").is_ok());
    }
}
