use clap::{Arg, Command};

pub fn build_cli() -> Command<'static> {
    Command::new("Quire")
        .name("quire")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload, search, share and discuss PDF documents from the terminal.")
        .arg(
            Arg::new("reconfigure")
                .help("Run the first-time setup again, pointing the client at a new server")
                .long("reconfigure")
                .takes_value(false),
        )
        .subcommand(
            Command::new("login").about("Log in to the platform").arg(
                Arg::new("username")
                    .help("Account name to log in as; the password is prompted for")
                    .required(true)
                    .index(1),
            ),
        )
        .subcommand(
            Command::new("register")
                .about("Create a new account and log into it")
                .arg(
                    Arg::new("username")
                        .help("Account name to register")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("email")
                        .help("Contact address for the account")
                        .required(true)
                        .index(2),
                ),
        )
        .subcommand(Command::new("logout").about("Log out and forget the stored session"))
        .subcommand(Command::new("whoami").about("Show the account behind the current session"))
        .subcommand(Command::new("list").about("List your documents"))
        .subcommand(Command::new("shared").about("List documents other users have shared with you"))
        .subcommand(
            Command::new("search")
                .about("Search your documents by title, description or topic")
                .arg(
                    Arg::new("query")
                        .help("Keywords to search for")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload a PDF document")
                .arg(
                    Arg::new("file")
                        .help("Path to the PDF to upload")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    Arg::new("title")
                        .help("Display title for the document")
                        .long("title")
                        .required(true)
                        .takes_value(true)
                        .forbid_empty_values(true),
                )
                .arg(
                    Arg::new("description")
                        .help("Free-text description")
                        .long("description")
                        .takes_value(true),
                )
                .arg(
                    Arg::new("topic")
                        .help("Topic label to file the document under")
                        .long("topic")
                        .takes_value(true),
                ),
        )
        .subcommand(
            Command::new("download")
                .about("Download a document's PDF bytes")
                .arg(
                    Arg::new("feed")
                        .help("ID of the document to download")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    Arg::new("output")
                        .help("Where to write the file; defaults to feed_<id>.pdf")
                        .short('o')
                        .long("output")
                        .takes_value(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            Command::new("share")
                .about("Create a public link anyone can open, no account needed")
                .arg(
                    Arg::new("feed")
                        .help("ID of the document to share")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    Arg::new("days")
                        .help("Days until the link expires; omit for no expiry")
                        .short('d')
                        .long("days")
                        .takes_value(true)
                        .value_parser(clap::value_parser!(u32).range(1..3651)),
                ),
        )
        .subcommand(
            Command::new("share-user")
                .about("Share a document with a registered user by email")
                .arg(
                    Arg::new("feed")
                        .help("ID of the document to share")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    Arg::new("email")
                        .help("Email address of the recipient")
                        .required(true)
                        .index(2),
                ),
        )
        .subcommand(
            Command::new("shares")
                .about("List the users one of your documents is shared with")
                .arg(
                    Arg::new("feed")
                        .help("ID of the document")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("unshare")
                .about("Revoke a user share; access disappears on their next fetch")
                .arg(
                    Arg::new("share")
                        .help("ID of the share to revoke, as shown by `quire shares`")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("view")
                .about("Open a public share link's document")
                .arg(
                    Arg::new("token")
                        .help("The share token from the link")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("comments")
                .about("List the comments on a document")
                .arg(
                    Arg::new("feed")
                        .help("ID of one of your documents")
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    Arg::new("token")
                        .help("A public share token, for documents reached through a link")
                        .long("token")
                        .takes_value(true)
                        .conflicts_with("feed"),
                ),
        )
        .subcommand(
            Command::new("comment")
                .about("Post a comment on a document")
                .arg(
                    Arg::new("feed")
                        .help("ID of one of your documents")
                        .index(1)
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    Arg::new("token")
                        .help("A public share token, for documents reached through a link")
                        .long("token")
                        .takes_value(true)
                        .conflicts_with("feed"),
                )
                .arg(
                    Arg::new("name")
                        .help("Display name to comment under when not logged in")
                        .long("name")
                        .takes_value(true),
                )
                .arg(
                    Arg::new("message")
                        .help("The comment text")
                        .short('m')
                        .long("message")
                        .required(true)
                        .takes_value(true)
                        .forbid_empty_values(true),
                ),
        )
}

#[test]
fn verify_cmd() {
    build_cli().debug_assert();
}
