//! RelayKV CLI Client
//!
//! Command-line interface for interacting with RelayKV.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use relaykv::protocol::Response;
use relaykv::{Client, Result};

/// RelayKV CLI
#[derive(Parser, Debug)]
#[command(name = "relaykv-cli")]
#[command(about = "CLI for the RelayKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    server: String,

    /// Response timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Shut the server down
    Bye,

    /// Run the end-to-end check against the server, then shut it down
    Check,
}

const LONG_KEY: &str = "an expert from lorem ipsum";
const LONG_VALUE: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
    Sed elementum mi et faucibus sollicitudin. Mauris ac ex sapien. \
    Vivamus lacinia posuere sem vitae venenatis. Aliquam erat volutpat. \
    Aliquam erat volutpat. In imperdiet velit sit amet sem lacinia \
    eleifend. Curabitur ac ex ut magna vehicula mollis sit amet sed \
    massa. Nullam auctor nunc elit, a consequat quam tristique non. \
    Fusce ut imperdiet dolor. Duis posuere luctus efficitur. Sed \
    facilisis massa sit amet leo dignissim consectetur. Aenean vehicula \
    est.";

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn connect(args: &Args) -> Result<Client> {
    let client = Client::connect(&args.server)?;
    client.set_timeout(Some(Duration::from_millis(args.timeout_ms)))?;
    Ok(client)
}

fn run(args: &Args) -> Result<bool> {
    let mut client = connect(args)?;

    match &args.command {
        Commands::Get { key } => match client.get(key)? {
            Some(value) => println!("{value}"),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            client.put(key, value)?;
            println!("OK");
        }
        Commands::Del { key } => {
            client.delete(key)?;
            println!("OK");
        }
        Commands::Bye => client.bye()?,
        Commands::Check => return check(args, client),
    }

    Ok(true)
}

/// Raw frames and the exact response each must produce
fn scenario() -> Vec<(String, Response)> {
    let value_len = LONG_VALUE.len();
    vec![
        ("put11k11v".to_string(), Response::Ack),
        ("get11k".to_string(), Response::Value("v".to_string())),
        ("get11v".to_string(), Response::Nil),
        ("get21v".to_string(), Response::Error),
        ("del11k".to_string(), Response::Ack),
        ("get11k".to_string(), Response::Nil),
        ("del11v".to_string(), Response::Ack),
        (
            format!(
                "put2{}{}{}{}{}",
                LONG_KEY.len(),
                LONG_KEY,
                value_len.to_string().len(),
                value_len,
                LONG_VALUE
            ),
            Response::Ack,
        ),
        (
            format!("get2{}{}", LONG_KEY.len(), LONG_KEY),
            Response::Value(LONG_VALUE.to_string()),
        ),
        (format!("del2{}{}", LONG_KEY.len(), LONG_KEY), Response::Ack),
    ]
}

fn check(args: &Args, mut client: Client) -> Result<bool> {
    let mut passed = true;

    for (frame, expected) in scenario() {
        print!("{} ... ", &frame[..3]);
        let actual = client.send_raw(frame.as_bytes())?;
        if actual == expected {
            println!("PASS");
        } else {
            println!("FAIL (got {actual:?}, want {expected:?})");
            passed = false;
        }
    }

    // A fresh connection issues the shutdown
    drop(client);
    connect(args)?.bye()?;
    println!("DONE");

    Ok(passed)
}
