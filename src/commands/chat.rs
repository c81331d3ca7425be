use crate::commands::settings::remember_username;
use crate::models::channel::KickChannel;
use crate::models::chat::ChatMessage;
use crate::models::links::{GroupedLink, LinkSort, LinkStat};
use crate::models::settings::AppState;
use crate::services::chat_session::ChatSession;
use crate::services::data_dir_service::links_dir;
use crate::services::emote_service::render_plain;
use crate::services::kick_api_service::{ChannelLookup, KickApiService};
use crate::services::link_storage_service::LinkStorageService;
use crate::services::pusher_service::PusherService;
use crate::services::storage_backend::FileStore;
use crate::services::url_canonicalizer::canonicalize_url;
use crate::utils::time::format_time_ago;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq)]
pub enum WatchCommand {
    Join(String),
    Links(LinkSort),
    Groups(LinkSort),
    Remove(String),
    Clear,
    ClearLinks,
    Stats,
    Quit,
    Help,
}

/// Parse one line typed into the watch prompt. Blank lines are `None`.
pub fn parse_watch_command(line: &str) -> Option<Result<WatchCommand, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    let sort = || {
        if arg.is_empty() {
            Ok(LinkSort::default())
        } else {
            arg.parse::<LinkSort>()
        }
    };

    let command = match name {
        "/join" if !arg.is_empty() => Ok(WatchCommand::Join(arg.to_string())),
        "/join" => Err("Usage: /join <username>".to_string()),
        "/links" => sort().map(WatchCommand::Links),
        "/groups" => sort().map(WatchCommand::Groups),
        "/remove" if !arg.is_empty() => Ok(WatchCommand::Remove(arg.to_string())),
        "/remove" => Err("Usage: /remove <url>".to_string()),
        "/clear" => Ok(WatchCommand::Clear),
        "/clearlinks" => Ok(WatchCommand::ClearLinks),
        "/stats" => Ok(WatchCommand::Stats),
        "/quit" | "/exit" => Ok(WatchCommand::Quit),
        "/help" => Ok(WatchCommand::Help),
        other => Err(format!("Unknown command {} (try /help)", other)),
    };
    Some(command)
}

pub fn format_chat_line(message: &ChatMessage) -> String {
    format!(
        "{}: {}",
        message.username,
        render_plain(&message.message, &message.emotes)
    )
}

pub fn format_join_line(channel: &KickChannel, restored_links: usize) -> String {
    let status = match &channel.livestream {
        Some(stream) if channel.is_live() => format!("live, {} viewers", stream.viewer_count),
        _ => "offline".to_string(),
    };
    format!(
        "Joined {} ({}, {} followers, {} stored links)",
        channel.slug, status, channel.followers_count, restored_links
    )
}

pub fn format_link_line(link: &LinkStat, now: DateTime<Utc>) -> String {
    let ago = format_time_ago(&link.last_at, now);
    if ago.is_empty() {
        format!("{:>4}x  {}  ({})", link.count, link.url, link.last_sender)
    } else {
        format!(
            "{:>4}x  {}  ({}, {} ago)",
            link.count, link.url, link.last_sender, ago
        )
    }
}

pub fn print_links(links: &[LinkStat]) {
    if links.is_empty() {
        println!("No links yet.");
        return;
    }
    let now = Utc::now();
    for link in links {
        println!("{}", format_link_line(link, now));
    }
}

pub fn print_groups(groups: &[GroupedLink]) {
    if groups.is_empty() {
        println!("No links yet.");
        return;
    }
    let now = Utc::now();
    for group in groups {
        println!("{} ({} shares)", group.hostname, group.total_count);
        for link in &group.links {
            println!("  {}", format_link_line(link, now));
        }
    }
}

const HELP: &str = "/join <user>  /links [recent|popular]  /groups [recent|popular]  /remove <url>  /clear  /clearlinks  /stats  /quit";

/// Interactive session: live chat from Pusher, commands from stdin
pub async fn watch(state: &AppState, username: Option<String>, persist: bool) -> Result<(), String> {
    let settings = state.settings_snapshot();
    let api = Arc::new(KickApiService::new(&settings.kick.api_base_url));

    let storage = if persist && settings.persistence_enabled {
        let store = FileStore::new(links_dir(&state.data_dir))
            .map_err(|e| format!("Failed to open link storage: {:#}", e))?;
        Some(LinkStorageService::new(store))
    } else {
        None
    };

    let (transport, mut events) = PusherService::spawn(&settings.kick);
    let mut session = ChatSession::new(transport.clone(), storage);
    let mut lookup = ChannelLookup::new();

    let start_lookup = |lookup: &mut ChannelLookup, username: &str| {
        let api = Arc::clone(&api);
        let name = username.to_string();
        lookup.start(username, async move { api.fetch_channel(&name).await });
        println!("Looking up {}...", username);
    };

    match username.or(settings.last_username) {
        Some(username) => start_lookup(&mut lookup, &username),
        None => println!("{}", HELP),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Some(message) = session.handle_event(&event) {
                    println!("{}", format_chat_line(message));
                }
            }

            (username, result) = lookup.finished() => match result {
                Ok(channel) => {
                    session.switch_channel(Some(&channel));
                    println!("{}", format_join_line(&channel, session.links().len()));
                    if let Err(e) = remember_username(&username, state) {
                        warn!("[Watch] Could not remember {}: {}", username, e);
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => println!("Could not join {}: {}", username, e),
            },

            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_watch_command(&line) {
                    None => {}
                    Some(Err(usage)) => println!("{}", usage),
                    Some(Ok(WatchCommand::Quit)) => break,
                    Some(Ok(WatchCommand::Join(username))) => start_lookup(&mut lookup, &username),
                    Some(Ok(WatchCommand::Links(sort))) => print_links(&session.sorted_links(sort)),
                    Some(Ok(WatchCommand::Groups(sort))) => print_groups(&session.grouped_links(sort)),
                    Some(Ok(WatchCommand::Remove(url))) => {
                        let key = canonicalize_url(&url).unwrap_or(url);
                        if session.remove_link(&key) {
                            println!("Removed {}", key);
                        } else {
                            println!("No link {}", key);
                        }
                    }
                    Some(Ok(WatchCommand::Clear)) => {
                        session.clear_data();
                        println!("Cleared messages, {} links kept", session.links().len());
                    }
                    Some(Ok(WatchCommand::ClearLinks)) => session.clear_all_links(),
                    Some(Ok(WatchCommand::Stats)) => {
                        let stats = session.link_stats();
                        println!(
                            "{}: {} messages, {} links, {} shares, {} hosts",
                            session.active_slug().unwrap_or("no channel"),
                            session.messages().len(),
                            stats.unique_links,
                            stats.total_shares,
                            stats.hostnames
                        );
                        if session.persistence_enabled() {
                            println!("{} links stored for this channel", session.stored_count());
                        } else {
                            println!("Link storage is off");
                        }
                    }
                    Some(Ok(WatchCommand::Help)) => println!("{}", HELP),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("[Watch] Failed to read input: {}", e);
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    lookup.cancel();
    session.disconnect();
    transport.shutdown();
    info!("[Watch] Stopped");
    Ok(())
}
