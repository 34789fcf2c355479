//! Storefront CLI - a terminal client for the storefront.
//!
//! Logs in with the account's email and password, then browses the catalog,
//! shows the cart and order/warranty history. Expired sessions are renewed
//! by the core client; when renewal fails the user is told to log in again.

mod auth;
mod utils;

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use storefront_core::api::ProductQuery;
use storefront_core::auth::{RemoteSession, SessionService};
use storefront_core::{AuthenticatedClient, Config, SessionEvent, StorefrontApi};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use auth::CredentialStore;
use utils::{format_date, format_optional, truncate_string};

/// Width of the product name column in listings
const NAME_COLUMN_WIDTH: usize = 40;

const ENV_EMAIL: &str = "STOREFRONT_EMAIL";
const ENV_PASSWORD: &str = "STOREFRONT_PASSWORD";

const USAGE: &str = "Usage: storefront <command>

Commands:
  login [email]        Log in and remember the account
  logout               End the session and forget the stored password
  products [keyword]   Browse the catalog
  cart                 Show the shopping cart
  orders               Show order history
  warranties           Show warranties
  get <path>           Issue an authenticated GET and print the JSON";

#[derive(Debug, PartialEq)]
enum Command {
    Login(Option<String>),
    Logout,
    Products(Option<String>),
    Cart,
    Orders,
    Warranties,
    Get(String),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let name = args.first().map(String::as_str);
        let arg = args.get(1).cloned();
        match name {
            Some("login") => Ok(Command::Login(arg)),
            Some("logout") => Ok(Command::Logout),
            Some("products") => Ok(Command::Products(arg)),
            Some("cart") => Ok(Command::Cart),
            Some("orders") => Ok(Command::Orders),
            Some("warranties") => Ok(Command::Warranties),
            Some("get") => match arg {
                Some(path) => Ok(Command::Get(path)),
                None => bail!("get needs a path\n\n{}", USAGE),
            },
            Some(other) => bail!("unknown command '{}'\n\n{}", other, USAGE),
            None => bail!("{}", USAGE),
        }
    }

    /// Catalog browsing and logout work without signing in first.
    fn needs_login(&self) -> bool {
        !matches!(self, Command::Products(_) | Command::Logout)
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let mut config = Config::load()?;
    config.apply_env()?;
    debug!(base_url = %config.base_url, "Loaded configuration");

    let client = AuthenticatedClient::new(config.clone()).context("Failed to create API client")?;
    let watcher = watch_session(&client);
    let session = RemoteSession::new(client.http().clone(), &config);

    if command.needs_login() {
        let email = match command {
            Command::Login(Some(ref email)) => email.clone(),
            _ => account_email(&config)?,
        };
        login(&session, &mut config, &email).await?;
    }

    let api = StorefrontApi::new(client);
    let result = run(command, &api, &session, &config).await;

    // Dropping the last client closes the event channel, so the watcher
    // finishes once every event from this run has been reported.
    drop(api);
    if let Err(e) = watcher.await {
        warn!(error = %e, "Session watcher stopped unexpectedly");
    }
    result
}

/// Report session events as they happen. The task ends when the client is dropped.
fn watch_session(client: &AuthenticatedClient) -> JoinHandle<()> {
    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Terminated(reason)) => {
                    eprintln!(
                        "Session ended ({}). Run `storefront login` to sign in again.",
                        reason.description()
                    );
                }
                Ok(SessionEvent::Refreshed) => debug!("Session refreshed"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn account_email(config: &Config) -> Result<String> {
    if let Ok(email) = std::env::var(ENV_EMAIL) {
        return Ok(email);
    }
    if let Some(ref email) = config.last_email {
        return Ok(email.clone());
    }
    prompt("Email: ")
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();
    if input.is_empty() {
        bail!("no input given");
    }
    Ok(input)
}

async fn login(session: &RemoteSession, config: &mut Config, email: &str) -> Result<()> {
    let (password, from_prompt) = match std::env::var(ENV_PASSWORD) {
        Ok(password) => (password, false),
        Err(_) => match CredentialStore::get_password(email) {
            Some(password) => (password, false),
            None => (rpassword::prompt_password("Password: ")?, true),
        },
    };

    let profile = session
        .login(email, &password)
        .await
        .with_context(|| format!("Login failed for {}", email))?;
    info!(email, "Logged in");

    if from_prompt {
        if let Err(e) = CredentialStore::store(email, &password) {
            warn!(error = %e, "Could not save password to keychain");
        }
    }
    if config.last_email.as_deref() != Some(email) {
        config.last_email = Some(email.to_string());
        if let Err(e) = config.save() {
            warn!(error = %e, "Could not save config");
        }
    }

    eprintln!("Signed in as {} <{}>", profile.name, profile.email);
    Ok(())
}

async fn run(command: Command, api: &StorefrontApi, session: &RemoteSession, config: &Config) -> Result<()> {
    match command {
        Command::Login(_) => {}
        Command::Logout => {
            // The server may already consider the session gone
            if let Err(e) = session.logout().await {
                warn!(error = %e, "Server logout failed");
            }
            if let Some(ref email) = config.last_email {
                if let Err(e) = CredentialStore::delete(email) {
                    debug!(error = %e, "No stored password to remove");
                }
            }
            eprintln!("Signed out");
        }
        Command::Products(keyword) => {
            let query = ProductQuery {
                keyword,
                ..ProductQuery::default()
            };
            let page = api.fetch_products(&query).await?;
            for product in &page.products {
                let stock = if product.in_stock() { "" } else { "  (out of stock)" };
                println!(
                    "{:<width$}  {:>10.2}  {}{}",
                    truncate_string(&product.name, NAME_COLUMN_WIDTH),
                    product.price,
                    format_optional(&product.brand, "-"),
                    stock,
                    width = NAME_COLUMN_WIDTH
                );
            }
            println!("page {} of {} ({} products)", page.page, page.pages, page.total);
        }
        Command::Cart => {
            let cart = api.fetch_cart().await?;
            if cart.is_empty() {
                println!("Your cart is empty");
            }
            for item in &cart.items {
                println!(
                    "{:>3} x {:<width$}  {:>10.2}",
                    item.quantity,
                    truncate_string(&item.name, NAME_COLUMN_WIDTH),
                    item.line_total(),
                    width = NAME_COLUMN_WIDTH
                );
            }
            println!("{} items, subtotal {:.2}", cart.item_count(), cart.subtotal());
        }
        Command::Orders => {
            // Order and warranty history load side by side
            let (orders, warranties) = futures::join!(api.fetch_orders(), api.fetch_warranties());
            let warranties = warranties.unwrap_or_else(|e| {
                warn!(error = %e, "Could not load warranties");
                Vec::new()
            });
            for order in orders? {
                let covered = warranties.iter().filter(|w| w.order_id == order.id && w.is_active()).count();
                println!(
                    "{}  {}  {:<10}  {:>10.2}  {} active warranties",
                    order.id,
                    format_date(&order.created_at),
                    order.status.display_name(),
                    order.total_price,
                    covered
                );
            }
        }
        Command::Warranties => {
            for warranty in api.fetch_warranties().await? {
                let state = if warranty.is_active() { "active" } else { "expired" };
                println!(
                    "{:<width$}  until {}  ({})",
                    truncate_string(&warranty.product_name, NAME_COLUMN_WIDTH),
                    format_date(&warranty.expires_at),
                    state,
                    width = NAME_COLUMN_WIDTH
                );
            }
        }
        Command::Get(path) => {
            let value: serde_json::Value = api.client().get(&path, None).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
