//! Domain models and access resolution for the quire client-side application

#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    deprecated
)]

pub mod access;
pub mod models;

pub use crate::access::{
    comment_author, resolve_access, validate_comment_body, Access, AccessError, AccessPath,
    CommentAuthor, CommentError, DocumentRecord, DocumentRef, GrantRecord, TokenRecord,
};
pub use crate::models::{
    Comment, Feed, Host, ShareLink, StoredCredentials, Topic, User, UserShareGrant,
};
