use clap::Parser;
use tracing::debug;

use redlink::{Command, Config, Connection, Error};

/// Run one Redis command and print the reply.
#[derive(Parser, Debug)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379", env = "REDLINK_ADDR")]
    address: String,

    /// Password for AUTH, sent while dialing
    #[arg(short, long, env = "REDLINK_PASSWORD")]
    password: Option<String>,

    /// The command verb followed by its arguments, e.g. `SET key value`
    #[arg(required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let args = Args::parse();

    let config = Config {
        password: args.password,
        ..Config::default()
    };

    let mut conn = Connection::dial(args.address.as_str(), config, None).await?;

    let mut words = args.command.iter();
    // clap enforces at least one word.
    let mut cmd = Command::new(words.next().cloned().unwrap_or_default());
    for word in words {
        cmd = cmd.arg(word.as_str());
    }

    match conn.call(cmd).await {
        Ok(reply) => println!("{}", reply),
        Err(Error::Server(message)) => println!("(error) {}", message),
        Err(err) => return Err(err),
    }

    conn.close().await;
    Ok(())
}
