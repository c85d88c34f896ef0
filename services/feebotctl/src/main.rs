use anyhow::{bail, Result};
use bot_ipc::{send_request, BotRequest, BotResponse, DEFAULT_SOCKET_PATH};
use clap::{Parser, Subcommand};
use presenter::render_grid;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "BOT_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: String,

    /// Print the raw JSON response instead of the rendered table.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bitcoin network fees.
    Btc,
    /// Ethereum gas prices.
    Eth,
    /// Send a chat message and print the bot's answer.
    Say { message: Vec<String> },
    /// Run both collectors now.
    Collect,
    Status,
}

fn request_for(command: Command) -> BotRequest {
    match command {
        Command::Btc => BotRequest::BitcoinFees,
        Command::Eth => BotRequest::EthereumFees,
        Command::Say { message } => BotRequest::Text(message.join(" ")),
        Command::Collect => BotRequest::Collect,
        Command::Status => BotRequest::Status,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let req = request_for(cli.command);

    let resp = send_request(&cli.socket, &req).await?;
    if cli.json {
        println!("{}", serde_json::to_string(&resp)?);
        return Ok(());
    }

    match resp {
        BotResponse::Reply(reply) => println!("{}", render_grid(&reply)),
        BotResponse::Status(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        BotResponse::Ack => println!("ok"),
        BotResponse::Error(message) => bail!("feebotd: {message}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_joins_words_into_one_message() {
        let cli = Cli::parse_from(["feebotctl", "say", "/btc", "now"]);
        assert_eq!(request_for(cli.command), BotRequest::Text("/btc now".into()));
    }

    #[test]
    fn subcommands_map_to_requests() {
        let cli = Cli::parse_from(["feebotctl", "--socket", "/tmp/x.sock", "eth"]);
        assert_eq!(cli.socket, "/tmp/x.sock");
        assert_eq!(request_for(cli.command), BotRequest::EthereumFees);
        let cli = Cli::parse_from(["feebotctl", "collect"]);
        assert_eq!(request_for(cli.command), BotRequest::Collect);
    }
}
