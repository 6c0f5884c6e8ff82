use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use session_api::{board, listing, poker, ApiContext};
use shared::domain::{RoomId, UserId};
use storage::SqliteStore;
use tracing_subscriber::EnvFilter;

/// Seeds and inspects a session database without going through the server.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/sessions.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateBoard {
        creator: String,
        title: String,
    },
    CreateRoom {
        owner: String,
        name: String,
    },
    ListBoards {
        user: String,
    },
    ListRooms {
        user: String,
    },
    /// Prints the vote summary; empty until the room is revealed.
    Summary {
        room_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::new(&cli.database_url).await?;
    let ctx = ApiContext::new(Arc::new(store));

    match cli.command {
        Command::CreateBoard { creator, title } => {
            let board_id = board::create_board(&ctx, &UserId::from(creator), &title).await?;
            println!("created board_id={board_id}");
        }
        Command::CreateRoom { owner, name } => {
            let room_id = poker::create_room(&ctx, &UserId::from(owner), &name).await?;
            println!("created room_id={room_id}");
        }
        Command::ListBoards { user } => {
            for summary in listing::list_user_boards(&ctx, &UserId::from(user)).await? {
                println!(
                    "{}\t{}\t{}\tmembers={}",
                    summary.board_id,
                    summary.created_at.to_rfc3339(),
                    summary.title,
                    summary.member_count
                );
            }
        }
        Command::ListRooms { user } => {
            for summary in listing::list_user_rooms(&ctx, &UserId::from(user)).await? {
                println!(
                    "{}\t{}\tplayers={}\trevealed={}",
                    summary.room_id,
                    summary.created_at.to_rfc3339(),
                    summary.player_count,
                    summary.revealed
                );
            }
        }
        Command::Summary { room_id } => {
            let summary = poker::vote_summary(&ctx, &RoomId::from(room_id)).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
