//! Command line client for the quire PDF sharing platform.
//!
//! Upload PDF documents, search them, share them with other users or through
//! public links, and read or post comments, all against a quire server
//! configured on first run.
//!
//! Expected syntax: `quire upload ./report.pdf --title "Q1 Report"`

#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    deprecated
)]

mod cli;

use chrono::{DateTime, Utc};
use clap::ArgMatches;
use human_panic::setup_panic;
use lazy_static::lazy_static;
use log::{error, info, trace, warn};
use quire_access::{DocumentRef, Feed};
use quire_api::{ApiClient, ApiError, Session, SessionState, UploadRequest};
use quire_config::{Config, CredentialStore};
use std::path::PathBuf;

lazy_static! {
    /// The config file for quire
    pub static ref CONFIG: Config = Config::load_config().unwrap_or_else(|e| {
        error!("Failed to load config: {}", e);
        panic!("Failed to load config: {}", e);
    });
}

/// Read one trimmed line from stdin
fn read_line() -> String {
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .expect("Failed to read line");
    input.trim().to_owned()
}

/// format a time to a human readable string, e.g. 10 seconds ago, 2 hours
fn format_time_relative_to_now(time: DateTime<Utc>) -> String {
    let diff = time.signed_duration_since(Utc::now()).num_seconds();

    if diff < 0 {
        //format in terms of seconds, minutes, hours, or days ago
        let diff = diff.abs();
        if diff < 60 {
            format!("{} seconds ago", diff)
        } else if diff < 60 * 60 {
            format!("{} minutes ago", diff / 60)
        } else if diff < 60 * 60 * 24 {
            format!("{} hours ago", diff / (60 * 60))
        } else {
            format!("{} days ago", diff / (60 * 60 * 24))
        }
    } else {
        //format in terms of seconds, minutes, hours, or days in the future
        if diff < 60 {
            format!("{} seconds", diff)
        } else if diff < 60 * 60 {
            format!("{} minutes", diff / 60)
        } else if diff < 60 * 60 * 24 {
            format!("{} hours", diff / (60 * 60))
        } else {
            format!("{} days", diff / (60 * 60 * 24))
        }
    }
}

/// format a bytes to a human readable string
fn format_bytes_to_readable_string(bytes: u64) -> String {
    let mut bytes = bytes as f64;
    let mut suffix = "B";
    if bytes > 1024.0 {
        bytes /= 1024.0;
        suffix = "KB";
    }
    if bytes > 1024.0 {
        bytes /= 1024.0;
        suffix = "MB";
    }
    if bytes > 1024.0 {
        bytes /= 1024.0;
        suffix = "GB";
    }
    format!("{:.2} {}", bytes, suffix)
}

/// Listing fetches degrade to an empty listing rather than failing the
/// command; rejected credentials still propagate so the session can heal.
fn or_empty<T>(result: Result<Vec<T>, ApiError>) -> Result<Vec<T>, ApiError> {
    match result {
        Ok(items) => Ok(items),
        Err(e @ ApiError::Auth(_)) => Err(e),
        Err(e) => {
            warn!("failed to fetch listing: {}", e);
            Ok(Vec::new())
        }
    }
}

fn print_feed_table(feeds: &[Feed]) {
    println!(
        "{0: <6} | {1: <30} | {2: <12} | {3: <8} | {4: <20}",
        "ID", "Title", "Owner", "Comments", "Uploaded"
    );
    println!(
        "{:-<6}-+-{:-<30}-+-{:-<12}-+-{:-<8}-+-{:-<20}",
        "", "", "", "", ""
    );

    for feed in feeds {
        let owner = feed
            .host
            .as_ref()
            .map(|h| h.username.as_str())
            .unwrap_or("unknown");
        println!(
            "{0: <6} | {1: <30} | {2: <12} | {3: <8} | {4: <20}",
            feed.id,
            &feed.title[..(30.min(feed.title.len()))],
            &owner[..(12.min(owner.len()))],
            feed.comment_count,
            format_time_relative_to_now(feed.created_at),
        );
    }
}

/// Pull the comment target out of a `comments` or `comment` invocation
fn comment_target(matches: &ArgMatches) -> Result<DocumentRef, ApiError> {
    if let Some(feed) = matches.get_one::<i64>("feed") {
        return Ok(DocumentRef::Id(*feed));
    }
    if let Some(token) = matches.get_one::<String>("token") {
        return Ok(DocumentRef::Token(token.clone()));
    }
    Err(ApiError::Validation(
        "provide a document id, or --token for a share link".into(),
    ))
}

fn first_run_setup() {
    info!("Starting first time setup, would you like to configure your installation [y/N]");

    if read_line().to_lowercase() != "y" {
        error!("Exiting");
        std::process::exit(1);
    }

    // ask user for hostname
    info!("Please enter the hostname of the server you want to connect to:");

    let hostname;
    loop {
        let input = read_line();

        // check if hostname is valid
        // should not contain a scheme
        if input.contains("http") {
            error!("Hostname should not contain http");
            continue;
        }

        // hostname should not contain slashes
        if input.contains('/') {
            error!("Hostname should not contain slashes");
            continue;
        }

        // hostname should not contain spaces
        if input.contains(' ') {
            error!("Hostname should not contain spaces");
            continue;
        }

        hostname = input;
        break;
    }

    // ask the user if this host is using TLS or not
    info!("Is the server using TLS? [y/n]");
    let tls;
    loop {
        let input = read_line().to_lowercase();
        if input == "y" {
            tls = true;
            break;
        } else if input == "n" {
            tls = false;
            break;
        } else {
            error!("Please enter y or n");
        }
    }

    // reset config, dropping any stored credentials with it
    if let Err(e) = Config::reset_config() {
        error!("Failed to reset config: {}", e);
        std::process::exit(1);
    }

    // set host details
    if let Err(e) = Config::set_hostname(&hostname, tls) {
        error!("Failed to set hostname: {}", e);
        std::process::exit(1);
    }
}

async fn handle_login(session: &Session, matches: &ArgMatches) -> Result<(), ApiError> {
    let username = matches
        .get_one::<String>("username")
        .expect("username is required");

    println!("Password for {}:", username);
    let password = read_line();

    let user = session.login(username, &password).await?;
    println!("Logged in as {} <{}>.", user.username, user.email);
    Ok(())
}

async fn handle_register(session: &Session, matches: &ArgMatches) -> Result<(), ApiError> {
    let username = matches
        .get_one::<String>("username")
        .expect("username is required");
    let email = matches.get_one::<String>("email").expect("email is required");

    println!("Password for {}:", username);
    let password = read_line();
    println!("Confirm password:");
    let confirmation = read_line();

    if password != confirmation {
        return Err(ApiError::Validation("passwords do not match".into()));
    }

    let user = session.register(username, email, &password).await?;
    println!("Registered and logged in as {} <{}>.", user.username, user.email);
    Ok(())
}

async fn handle_logout(session: &Session) -> Result<(), ApiError> {
    session.logout().await?;
    println!("Logged out.");
    Ok(())
}

async fn handle_whoami(client: &ApiClient, session: &Session) -> Result<(), ApiError> {
    match session.state() {
        SessionState::Anonymous => println!("Not logged in."),
        SessionState::Authenticated(_) => {
            // confirm the restored token against the server rather than
            // trusting the stored profile
            let user = client.current_user().await?;
            println!("Logged in as {} <{}> (id {}).", user.username, user.email, user.id);
        }
    }
    Ok(())
}

async fn handle_list(client: &ApiClient) -> Result<(), ApiError> {
    let feeds = or_empty(client.list_feeds().await)?;
    print_feed_table(&feeds);
    Ok(())
}

async fn handle_shared(client: &ApiClient) -> Result<(), ApiError> {
    let feeds = or_empty(client.shared_with_me().await)?;
    print_feed_table(&feeds);
    Ok(())
}

async fn handle_search(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let query = matches.get_one::<String>("query").expect("query is required");
    let feeds = or_empty(client.search_feeds(query).await)?;
    print_feed_table(&feeds);
    Ok(())
}

async fn handle_upload(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let upload = UploadRequest {
        file: matches
            .get_one::<PathBuf>("file")
            .cloned()
            .expect("file is required"),
        title: matches
            .get_one::<String>("title")
            .cloned()
            .expect("title is required"),
        description: matches.get_one::<String>("description").cloned(),
        topic: matches.get_one::<String>("topic").cloned(),
    };

    let feed = client.upload_feed(&upload).await?;
    println!("Uploaded `{}` as document {}.", feed.title, feed.id);
    Ok(())
}

async fn handle_download(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let feed_id = *matches.get_one::<i64>("feed").expect("feed is required");
    let dest = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("feed_{}.pdf", feed_id)));

    let written = client.download_feed(feed_id, &dest).await?;
    println!(
        "Wrote {} to `{}`.",
        format_bytes_to_readable_string(written),
        dest.to_string_lossy()
    );
    Ok(())
}

async fn handle_share(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let feed_id = *matches.get_one::<i64>("feed").expect("feed is required");
    let days = matches.get_one::<u32>("days").copied();

    let link = client.create_public_share(feed_id, days).await?;
    let url = link.absolute_url(CONFIG.server_address());

    println!("The document has been shared!");
    println!("The link to your document is {}", url);
    match link.expires_at {
        Some(expiry) => println!("The link expires in {}.", format_time_relative_to_now(expiry)),
        None => println!("The link does not expire."),
    }
    Ok(())
}

async fn handle_share_user(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let feed_id = *matches.get_one::<i64>("feed").expect("feed is required");
    let email = matches.get_one::<String>("email").expect("email is required");

    let message = client.create_user_share(feed_id, email).await?;
    println!("{}", message);
    Ok(())
}

async fn handle_shares(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let feed_id = *matches.get_one::<i64>("feed").expect("feed is required");
    let grants = client.feed_share_roster(feed_id).await?;

    println!(
        "{0: <6} | {1: <16} | {2: <28} | {3: <8} | {4: <20}",
        "ID", "Shared with", "Email", "Status", "Created"
    );
    println!(
        "{:-<6}-+-{:-<16}-+-{:-<28}-+-{:-<8}-+-{:-<20}",
        "", "", "", "", ""
    );

    for grant in grants {
        println!(
            "{0: <6} | {1: <16} | {2: <28} | {3: <8} | {4: <20}",
            grant.id,
            &grant.shared_with.username[..(16.min(grant.shared_with.username.len()))],
            &grant.shared_with.email[..(28.min(grant.shared_with.email.len()))],
            if grant.is_active { "active" } else { "revoked" },
            format_time_relative_to_now(grant.created_at),
        );
    }
    Ok(())
}

async fn handle_unshare(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let share_id = *matches.get_one::<i64>("share").expect("share is required");
    client.revoke_user_share(share_id).await?;
    println!("Share revoked.");
    Ok(())
}

async fn handle_view(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let token = matches.get_one::<String>("token").expect("token is required");

    let feed = client.resolve_public_share(token).await?;
    println!("{} (document {})", feed.title, feed.id);
    if let Some(host) = &feed.host {
        println!("Uploaded by {}", host.username);
    }
    if let Some(description) = &feed.description {
        println!("{}", description);
    }
    println!(
        "{} comment(s). Use `quire comments --token {}` to read them.",
        feed.comment_count, token
    );
    Ok(())
}

async fn handle_comments(client: &ApiClient, matches: &ArgMatches) -> Result<(), ApiError> {
    let target = comment_target(matches)?;
    let comments = or_empty(client.list_comments(&target).await)?;

    if comments.is_empty() {
        println!("No comments.");
        return Ok(());
    }

    for comment in comments {
        println!(
            "[{}] {}: {}",
            format_time_relative_to_now(comment.created_at),
            comment.display_name(),
            comment.comment_body,
        );
    }
    Ok(())
}

async fn handle_comment(
    client: &ApiClient,
    session: &Session,
    matches: &ArgMatches,
) -> Result<(), ApiError> {
    let target = comment_target(matches)?;
    let body = matches
        .get_one::<String>("message")
        .expect("message is required");
    let name = matches.get_one::<String>("name").map(String::as_str);

    let comment = client
        .post_comment(&target, body, name, session.user_id())
        .await?;
    println!("Comment posted as {}.", comment.display_name());
    Ok(())
}

#[doc(hidden)]
#[tokio::main]
async fn main() {
    setup_panic!();
    pretty_env_logger::init();

    trace!("loading cli arguments");
    let matches = cli::build_cli().get_matches();

    if !Config::exists() || matches.contains_id("reconfigure") {
        first_run_setup();
    }

    let client = match ApiClient::new(CONFIG.server_address(), *CONFIG.size_limit_bytes()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build api client: {}", e);
            std::process::exit(1);
        }
    };

    let session = match Session::initialise(client.clone(), CredentialStore::open()).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to initialise session: {}", e);
            std::process::exit(1);
        }
    };

    let result = match matches.subcommand() {
        Some(("login", sub)) => handle_login(&session, sub).await,
        Some(("register", sub)) => handle_register(&session, sub).await,
        Some(("logout", _)) => handle_logout(&session).await,
        Some(("whoami", _)) => handle_whoami(&client, &session).await,
        Some(("list", _)) => handle_list(&client).await,
        Some(("shared", _)) => handle_shared(&client).await,
        Some(("search", sub)) => handle_search(&client, sub).await,
        Some(("upload", sub)) => handle_upload(&client, sub).await,
        Some(("download", sub)) => handle_download(&client, sub).await,
        Some(("share", sub)) => handle_share(&client, sub).await,
        Some(("share-user", sub)) => handle_share_user(&client, sub).await,
        Some(("shares", sub)) => handle_shares(&client, sub).await,
        Some(("unshare", sub)) => handle_unshare(&client, sub).await,
        Some(("view", sub)) => handle_view(&client, sub).await,
        Some(("comments", sub)) => handle_comments(&client, sub).await,
        Some(("comment", sub)) => handle_comment(&client, &session, sub).await,
        _ => {
            let _ = cli::build_cli().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        if session.absorb_failure(&e).await {
            eprintln!("Your session has expired. Please log in again with `quire login <username>`.");
        }
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
