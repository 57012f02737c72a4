use std::error::Error;

use clap::{Parser, Subcommand};
use log::info;
use serverlink::{GameType, QueryClient, QueryClientFactory, RconClient, RconClientFactory};

/// Query or administer a game server from the command line.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Game type of the server, e.g. cod4 or insurgency
    #[clap(short, long)]
    game: GameType,
    /// Server host name or IP address
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Query or rcon port of the server
    #[clap(short, long)]
    port: u16,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server status
    Query,
    /// Run an rcon operation
    Rcon {
        /// Rcon password of the server
        #[clap(long, env = "RCON_PASSWORD")]
        password: String,
        #[clap(subcommand)]
        operation: Operation,
    },
}

#[derive(Subcommand, Debug)]
enum Operation {
    Players,
    CurrentMap,
    Maps,
    Say { message: String },
    Restart,
    RestartMap,
    FastRestartMap,
    NextMap,
    Kick { client_id: u32 },
    KickByName { name: String },
    KickAll,
    Ban { client_id: u32 },
    BanByName { name: String },
    TempBan { client_id: u32 },
    TempBanByName { name: String },
    Unban { name: String },
    Tell { client_id: u32, message: String },
    ChangeMap { map_name: String },
    ServerInfo,
    SystemInfo,
    CommandList,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Query => {
            let client = QueryClientFactory::new().create_instance(args.game, &args.host, args.port)?;
            let status = client.get_server_status().await?;

            println!("{} on {} ({})", status.server_name, status.map, status.mod_name);
            println!("{}/{} players", status.player_count(), status.max_players);
            for player in &status.players {
                println!("{:>6} {:>4} {}", player.score, player.ping, player.name);
            }
        }
        Command::Rcon {
            password,
            operation,
        } => {
            let mut client = RconClientFactory::new().create_instance(
                args.game,
                &args.host,
                &args.host,
                args.port,
                &password,
            )?;
            run(&mut client, operation).await?;
        }
    }

    info!("bye");
    Ok(())
}

async fn run(client: &mut impl RconClient, operation: Operation) -> serverlink::Result<()> {
    let output = match operation {
        Operation::Players => {
            for player in client.get_players().await? {
                println!(
                    "{:>3} {:<32} {:>4} {} {}",
                    player.num,
                    player.name.unwrap_or_default(),
                    player.ping,
                    player.guid.unwrap_or_default(),
                    player.ip_address.unwrap_or_default()
                );
            }
            return Ok(());
        }
        Operation::Maps => {
            for map in client.get_maps().await? {
                println!("{:<12} {}", map.game_type, map.map_name);
            }
            return Ok(());
        }
        Operation::Say { message } => {
            client.say(&message).await?;
            return Ok(());
        }
        Operation::CurrentMap => client.get_current_map().await,
        Operation::Restart => client.restart().await?,
        Operation::RestartMap => client.restart_map().await?,
        Operation::FastRestartMap => client.fast_restart_map().await?,
        Operation::NextMap => client.next_map().await?,
        Operation::Kick { client_id } => client.kick_player(client_id).await?,
        Operation::KickByName { name } => client.kick_player_by_name(&name).await?,
        Operation::KickAll => client.kick_all_players().await?,
        Operation::Ban { client_id } => client.ban_player(client_id).await?,
        Operation::BanByName { name } => client.ban_player_by_name(&name).await?,
        Operation::TempBan { client_id } => client.temp_ban_player(client_id).await?,
        Operation::TempBanByName { name } => client.temp_ban_player_by_name(&name).await?,
        Operation::Unban { name } => client.unban_player(&name).await?,
        Operation::Tell { client_id, message } => client.tell_player(client_id, &message).await?,
        Operation::ChangeMap { map_name } => client.change_map(&map_name).await?,
        Operation::ServerInfo => client.get_server_info().await?,
        Operation::SystemInfo => client.get_system_info().await?,
        Operation::CommandList => client.get_command_list().await?,
    };

    println!("{}", output);
    Ok(())
}
