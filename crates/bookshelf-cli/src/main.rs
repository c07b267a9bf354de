//! Command-line client for the bookshelf book catalog API.
//!
//! Thin presentation layer over `bookshelf-core`: every subcommand maps
//! onto one session or book-client operation. Run with no arguments for
//! usage.

use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookshelf_core::{
    BookClient, BookDraft, Config, CredentialStore, FileCredentialStore,
    KeyringCredentialStore, NewUser, SessionManager,
};

/// Keychain service name for stored credentials
const KEYRING_SERVICE: &str = "bookshelf";

/// Set this environment variable to store credentials in a plain file
/// instead of the OS keychain (headless machines, CI).
const NO_KEYRING_ENV: &str = "BOOKSHELF_NO_KEYRING";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG to control the log level (e.g. RUST_LOG=debug).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn credential_store() -> Box<dyn CredentialStore> {
    if std::env::var_os(NO_KEYRING_ENV).is_some() {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(KEYRING_SERVICE);
        Box::new(FileCredentialStore::new(dir))
    } else {
        Box::new(KeyringCredentialStore::new(KEYRING_SERVICE))
    }
}

fn print_usage() {
    eprintln!("bookshelf - book catalog client");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  bookshelf login [email]");
    eprintln!("  bookshelf register <email> [username]");
    eprintln!("  bookshelf logout");
    eprintln!("  bookshelf whoami");
    eprintln!("  bookshelf list [--search <text>] [--page <n>] [--all]");
    eprintln!("  bookshelf add --title <t> --author <a> --genre <g> [--description <d>] [--price <p>] [--year <y>] [--unavailable]");
    eprintln!("  bookshelf edit <id> --title <t> --author <a> --genre <g> [...]");
    eprintln!("  bookshelf rm <id>");
    eprintln!("  bookshelf genres");
}

/// Split trailing arguments into `--flag value` pairs and bare flags.
fn parse_flags(args: &[String]) -> (HashMap<String, String>, Vec<String>) {
    let mut flags = HashMap::new();
    let mut bare = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if let Some(name) = arg.strip_prefix("--") {
            if i + 1 < args.len() && !args[i + 1].starts_with("--") {
                flags.insert(name.to_string(), args[i + 1].clone());
                i += 2;
            } else {
                flags.insert(name.to_string(), String::new());
                i += 1;
            }
        } else {
            bare.push(arg.clone());
            i += 1;
        }
    }
    (flags, bare)
}

fn draft_from_flags(flags: &HashMap<String, String>) -> BookDraft {
    BookDraft {
        title: flags.get("title").cloned().unwrap_or_default(),
        author: flags.get("author").cloned().unwrap_or_default(),
        genre: flags.get("genre").cloned().unwrap_or_default(),
        description: flags.get("description").cloned().unwrap_or_default(),
        price: flags.get("price").cloned(),
        year: flags.get("year").cloned(),
        available: !flags.contains_key("unavailable"),
    }
}

fn print_book(book: &bookshelf_core::Book) {
    let availability = if book.available { "available" } else { "not available" };
    println!(
        "{}  {} - {} [{}] ${:.2} {} ({})",
        book.id,
        book.title,
        book.author,
        book.genre,
        book.price,
        book.year.map(|y| y.to_string()).unwrap_or_default(),
        availability,
    );
    if !book.description.is_empty() {
        println!("    {}", book.description);
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().cloned() else {
        print_usage();
        return Ok(());
    };
    let rest = &args[1..];

    let mut config = Config::load()?;
    let mut session = SessionManager::new(&config.base_url, credential_store())?;
    session.restore();
    let mut client = BookClient::new(&config);

    match command.as_str() {
        "login" => {
            let email = match rest.first() {
                Some(email) => email.clone(),
                None => match config.last_email.clone() {
                    Some(email) => email,
                    None => prompt_line("Email: ")?,
                },
            };
            let password = rpassword::prompt_password("Password: ")?;
            match session.login(&email, &password).await {
                Ok(message) => {
                    config.last_email = Some(email);
                    config.save()?;
                    info!("Login succeeded");
                    println!("{}", message.unwrap_or_else(|| "Logged in".to_string()));
                }
                Err(e) => {
                    eprintln!("Login failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        "register" => {
            let Some(email) = rest.first().cloned() else {
                eprintln!("Usage: bookshelf register <email> [username]");
                std::process::exit(2);
            };
            let username = rest.get(1).cloned();
            let password = rpassword::prompt_password("Password: ")?;
            let new_user = NewUser { username, email: email.clone(), password };
            match session.register(&new_user).await {
                Ok(message) => {
                    config.last_email = Some(email);
                    config.save()?;
                    println!("{}", message.unwrap_or_else(|| "Account created".to_string()));
                }
                Err(e) => {
                    eprintln!("Registration failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        "logout" => {
            session.logout();
            println!("Logged out");
        }
        "whoami" => match session.user() {
            Some(user) => println!("{}", user.display_name()),
            None => println!("Not logged in"),
        },
        "list" => {
            let (flags, _) = parse_flags(rest);
            let search = flags.get("search").cloned().unwrap_or_default();
            let page: u32 = flags
                .get("page")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);

            client.list(&mut session, &search, page).await?;
            if flags.contains_key("all") {
                while client.load_more(&mut session, &search).await? {}
            }
            for book in client.books() {
                print_book(book);
            }
            let cursor = client.cursor();
            if cursor.total_pages > 1 {
                println!(
                    "Page {} of {} - {} books{}",
                    cursor.page,
                    cursor.total_pages,
                    client.books().len(),
                    if cursor.has_next { " (more available)" } else { "" },
                );
            }
        }
        "add" => {
            let (flags, _) = parse_flags(rest);
            let saved = client.create(&mut session, &draft_from_flags(&flags)).await?;
            println!("Created:");
            print_book(&saved);
        }
        "edit" => {
            let (flags, bare) = parse_flags(rest);
            let Some(id) = bare.first() else {
                eprintln!("Usage: bookshelf edit <id> --title <t> --author <a> --genre <g>");
                std::process::exit(2);
            };
            let saved = client
                .update(&mut session, id, &draft_from_flags(&flags))
                .await?;
            println!("Updated:");
            print_book(&saved);
        }
        "rm" => {
            let Some(id) = rest.first() else {
                eprintln!("Usage: bookshelf rm <id>");
                std::process::exit(2);
            };
            client.remove(&mut session, id).await?;
            println!("Deleted {}", id);
        }
        "genres" => {
            for genre in client.genres(&mut session).await? {
                println!("{}", genre);
            }
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}
