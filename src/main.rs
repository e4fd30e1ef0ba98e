#![deny(dead_code)]
use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{debug, error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

mod utils;

use dashchat::chat::filter::{ContactCategory, SortKey, SortOrder, StatusFilter};
use dashchat::chat::ChatContext;
use dashchat::config::{self, ClientConfig};
use dashchat::credentials::{self, load_credentials, save_credentials, Credentials};
use dashchat::{
    ChatDataSource, Contact, CurrentUser, FallbackSource, GraphQlClient, Message, MessageDraft, MessageKind,
    RestClient,
};

/// Command line arguments for dashchat
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dashchat: browse contacts and conversations of the dashboard chat from the terminal."
)]
struct Args {
    /// Configuration file to use instead of <config_dir>/dashchat/config.json
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Write the log here instead of <config_dir>/dashchat/dashchat.log
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the API token used for every request
    Login {
        username: String,
        user_id: i64,
        token: String,
    },
    /// List contacts with filtering, sorting and paging
    Contacts(ContactsArgs),
    /// Show the messages of a conversation
    Messages {
        conversation: i64,
        /// Only show messages containing this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Send a text message
    Send {
        conversation: i64,
        text: String,
        /// Id of the message being replied to
        #[arg(long, value_name = "MESSAGE_ID")]
        reply_to: Option<i64>,
    },
    /// Toggle the favorite flag of a contact
    Favorite { contact: i64 },
    /// Toggle the blocked flag of a contact
    Block { contact: i64 },
    /// Move a conversation to the archive
    Archive { contact: i64 },
    /// Bring a conversation back from the archive
    Unarchive { contact: i64 },
}

#[derive(ClapArgs, Debug)]
struct ContactsArgs {
    #[arg(long, default_value = "")]
    search: String,
    /// all, direct, groups, favorites, blocked or archived
    #[arg(long, default_value = "all")]
    category: ContactCategory,
    /// all, online, away, offline or group
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    unread_only: bool,
    #[arg(long)]
    favorites_only: bool,
    /// name, status, last-message or unread-count
    #[arg(long, default_value = "name")]
    sort_by: SortKey,
    /// asc or desc
    #[arg(long, default_value = "asc")]
    sort_order: SortOrder,
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Height of the list in pixels, used to size the page
    #[arg(long)]
    height: Option<u32>,
}

fn log_file_path(args: &Args) -> Option<PathBuf> {
    if let Some(path) = &args.log_file {
        return Some(path.clone());
    }
    match config::config_dir() {
        Ok(dir) => Some(dir.join("dashchat.log")),
        Err(e) => {
            eprintln!("Warning: {}. Logging to stderr.", e);
            None
        }
    }
}

fn build_source(config: &ClientConfig, token: Option<String>) -> Result<Arc<dyn ChatDataSource>> {
    let graphql = GraphQlClient::new(&config.graphql_url, config.request_timeout(), token.clone())?;
    let rest = RestClient::new(&config.rest_base_url, config.request_timeout(), token)?;
    Ok(Arc::new(FallbackSource::new(Arc::new(graphql), Arc::new(rest))))
}

fn current_user() -> Result<CurrentUser> {
    match load_credentials()? {
        Some(creds) => Ok(CurrentUser {
            id: creds.user_id,
            name: creds.username,
        }),
        None => Ok(CurrentUser {
            id: 0,
            name: "me".to_string(),
        }),
    }
}

fn format_contact(contact: &Contact) -> String {
    let mut line = format!("{:>5}  {:<24} {:<8}", contact.id, contact.name, contact.status.as_str());
    if !contact.title.is_empty() {
        line.push_str(&format!(" {}", contact.title));
    }
    if contact.unread_count > 0 {
        line.push_str(&format!(" ({} unread)", contact.unread_count));
    }
    if contact.is_favorite {
        line.push_str(" *");
    }
    line
}

fn format_message(message: &Message) -> String {
    let body = match &message.kind {
        MessageKind::Text => message.content.clone(),
        other => format!("[{}] {}", other.label(), message.content),
    };
    let mut line = format!("{:>6} {} {}: {}", message.id, message.timestamp, message.sender_name, body);
    if let Some(status) = message.status {
        line.push_str(&format!(" ({})", status.as_str()));
    }
    if message.forwarded {
        line.push_str(" [forwarded]");
    }
    if let Some(reply) = &message.reply_to {
        line.push_str(&format!("\n         > {}: {}", reply.sender_name, reply.content));
    }
    line
}

fn print_notices(ctx: &ChatContext) {
    for notice in ctx.notices() {
        eprintln!("{:?}: {}", notice.level, notice.text);
    }
}

async fn list_contacts(ctx: &mut ChatContext, args: ContactsArgs) -> Result<()> {
    if !ctx.refresh_contacts().await {
        print_notices(ctx);
        return Err(anyhow!("Could not load contacts"));
    }

    ctx.set_contact_search(&args.search);
    ctx.set_category(args.category);
    ctx.set_status_filter(args.status);
    ctx.set_department(args.department);
    ctx.set_unread_only(args.unread_only);
    ctx.set_favorites_only(args.favorites_only);
    ctx.set_sort(args.sort_by, args.sort_order);
    if let Some(height) = args.height {
        ctx.resize(height);
    }
    ctx.set_page(args.page);

    let outcome = ctx.visible_contacts();
    if outcome.reset {
        println!("Page {} does not exist, showing page 1", args.page);
    }
    let page = outcome.page;
    for contact in &page.items {
        println!("{}", format_contact(contact));
    }
    let (first, last) = page.record_range(ctx.paginator().records_per_page());
    println!(
        "Page {} of {} ({}-{} of {})",
        page.current_page, page.total_pages, first, last, page.total_records
    );
    if ctx.dropped_contacts() > 0 {
        println!("{} malformed contact records were skipped", ctx.dropped_contacts());
    }
    Ok(())
}

/// Load contacts and the conversation's messages concurrently
async fn open_conversation(ctx: &mut ChatContext, conversation: i64) -> bool {
    let source = ctx.source();
    let ticket = ctx.switch_to(conversation);
    let (contacts, messages) = futures::join!(source.fetch_contacts(), source.fetch_messages(conversation));
    ctx.apply_contacts(contacts);
    ctx.apply_loaded(ticket, messages)
}

async fn show_messages(ctx: &mut ChatContext, conversation: i64, search: Option<String>) -> Result<()> {
    let loaded = open_conversation(ctx, conversation).await;
    if let Some(contact) = ctx.active_contact() {
        println!("== {} ({}) ==", contact.name, contact.status.as_str());
    }
    if !loaded {
        print_notices(ctx);
        return Err(anyhow!("Could not load conversation {}", conversation));
    }

    if let Some(query) = search {
        ctx.conversation_mut().set_search_query(&query);
    }
    let shown = ctx.message_search_results();
    for message in &shown {
        println!("{}", format_message(message));
    }
    if shown.is_empty() {
        println!("No messages");
    }
    Ok(())
}

async fn send(ctx: &mut ChatContext, conversation: i64, text: &str, reply_to: Option<i64>) -> Result<()> {
    open_conversation(ctx, conversation).await;

    if let Some(reply_id) = reply_to {
        let target = ctx
            .messages()
            .iter()
            .find(|m| m.id == reply_id)
            .cloned()
            .ok_or_else(|| anyhow!("Message {} not found in conversation {}", reply_id, conversation))?;
        ctx.conversation_mut().set_reply_to(&target);
    }

    match ctx.send_message(MessageDraft::text(text)).await {
        Ok(id) => {
            println!("Sent message {}", id);
            Ok(())
        }
        Err(e) => {
            print_notices(ctx);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let log_path = log_file_path(&args);
    utils::setup_logging(log_path.as_deref().and_then(|p| p.to_str()), level)?;
    info!("dashchat starting up");
    if let Some(path) = &log_path {
        debug!("Logging to file: {}", path.display());
    }

    let config = ClientConfig::load(args.config.as_deref())?;

    if let Command::Login { username, user_id, token } = &args.command {
        save_credentials(&Credentials::new(username, *user_id, token))?;
        println!("Saved credentials for {}", username);
        return Ok(());
    }

    let token = credentials::resolve_token()?;
    if token.is_none() {
        info!("No API token configured, requests are sent unauthenticated");
    }
    let source = build_source(&config, token)?;
    let mut ctx = ChatContext::new(source, current_user()?)
        .with_auto_sizer(config.layout.auto_sizer())
        .with_typing_timeout(config.typing_timeout());

    let result = match args.command {
        Command::Login { .. } => Ok(()),
        Command::Contacts(contact_args) => list_contacts(&mut ctx, contact_args).await,
        Command::Messages { conversation, search } => show_messages(&mut ctx, conversation, search).await,
        Command::Send {
            conversation,
            text,
            reply_to,
        } => send(&mut ctx, conversation, &text, reply_to).await,
        Command::Favorite { contact } => ctx.toggle_favorite(contact).await.map_err(Into::into),
        Command::Block { contact } => ctx.toggle_block(contact).await.map_err(Into::into),
        Command::Archive { contact } => ctx.set_archived(contact, true).await.map_err(Into::into),
        Command::Unarchive { contact } => ctx.set_archived(contact, false).await.map_err(Into::into),
    };

    if let Err(e) = &result {
        error!("Command failed: {}", e);
    }
    result
}
