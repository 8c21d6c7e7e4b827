mod client;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spotlink_proto::platform;
use spotlink_proto::protocol::{Broadcast, Command, DaemonStatus, Message, PROTOCOL_VERSION};
use spotlink_proto::query::{extract, TrackQuery};

use client::DaemonConnection;

#[derive(Parser)]
#[command(
    name = "spotlink",
    about = "Resolve video titles to Spotify tracks via the spotlink daemon"
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Resolve a title through the daemon and open the result in a browser.
    Resolve {
        /// Raw video title, as displayed by the watch page.
        title: String,
        /// Channel name, used as a weak artist hint.
        #[arg(long)]
        channel: Option<String>,
        /// Print the URL instead of opening a browser tab.
        #[arg(long)]
        no_open: bool,
    },
    /// Run the extraction heuristics offline and print the structured guess.
    Extract {
        title: String,
        #[arg(long)]
        channel: Option<String>,
        /// Emit the guess as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the daemon's status snapshot.
    Status,
    /// Kick off the interactive authorization flow.
    Authorize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Cmd::Resolve {
            title,
            channel,
            no_open,
        } => resolve(&title, channel.as_deref(), no_open).await,
        Cmd::Extract {
            title,
            channel,
            json,
        } => extract_offline(&title, channel.as_deref(), json),
        Cmd::Status => status().await,
        Cmd::Authorize => authorize().await,
    }
}

async fn connect() -> anyhow::Result<(DaemonConnection, DaemonStatus)> {
    let mut conn = DaemonConnection::connect(&platform::daemon_address())
        .await
        .context("daemon not reachable; is spotlink-daemon running?")?;

    match conn.receive().await? {
        Message::Broadcast(Broadcast::Hello {
            protocol_version,
            status,
            ..
        }) => {
            if protocol_version != PROTOCOL_VERSION {
                anyhow::bail!(
                    "protocol mismatch: daemon speaks v{}, this client speaks v{}",
                    protocol_version,
                    PROTOCOL_VERSION
                );
            }
            Ok((conn, status))
        }
        other => anyhow::bail!("expected Hello from daemon, got {:?}", other),
    }
}

async fn resolve(title: &str, channel: Option<&str>, no_open: bool) -> anyhow::Result<()> {
    let query = extract(title, channel);
    if query.raw_query.is_none() {
        anyhow::bail!("nothing extractable from that title");
    }

    let (mut conn, _) = connect().await?;
    conn.send_command(Command::OpenSpotifyForTitle { payload: query })
        .await?;

    loop {
        match conn.receive().await? {
            Message::Broadcast(Broadcast::Resolved { url, fallback }) => {
                if fallback {
                    println!("No exact match; search page: {}", url);
                } else {
                    println!("{}", url);
                }
                if !no_open {
                    webbrowser::open(&url).context("failed to open browser")?;
                }
                return Ok(());
            }
            Message::Broadcast(Broadcast::Log { message }) => eprintln!("{}", message),
            _ => {}
        }
    }
}

fn extract_offline(title: &str, channel: Option<&str>, json: bool) -> anyhow::Result<()> {
    let query: TrackQuery = extract(title, channel);
    if json {
        println!("{}", serde_json::to_string_pretty(&query)?);
    } else {
        println!("track:  {}", query.track.as_deref().unwrap_or("-"));
        println!("artist: {}", query.artist.as_deref().unwrap_or("-"));
        println!("query:  {}", query.raw_query.as_deref().unwrap_or("-"));
    }
    Ok(())
}

async fn status() -> anyhow::Result<()> {
    let (_conn, status) = connect().await?;
    println!("authorized:       {}", status.authorized);
    if let Some(exp) = status.token_expires_at {
        println!("token expires at: {}", exp);
    }
    println!("resolved:         {}", status.resolved_count);
    println!("fallbacks:        {}", status.fallback_count);
    if let Some(url) = &status.last_url {
        println!("last url:         {}", url);
    }
    Ok(())
}

async fn authorize() -> anyhow::Result<()> {
    let (mut conn, _) = connect().await?;
    conn.send_command(Command::Authorize).await?;
    println!("Authorization started; complete the grant in your browser.");

    loop {
        match conn.receive().await? {
            Message::Broadcast(Broadcast::AuthState {
                authorized,
                message,
            }) => {
                if authorized {
                    println!("Authorized.");
                } else {
                    println!(
                        "Not authorized: {}",
                        message.unwrap_or_else(|| "unknown reason".into())
                    );
                }
                return Ok(());
            }
            Message::Broadcast(Broadcast::Log { message }) => eprintln!("{}", message),
            _ => {}
        }
    }
}
