//! Aggregation CLI Client
//!
//! Sends a single GET or PUT to an aggregation server and prints the raw
//! response.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use weather_aggregator::protocol::{read_response, write_request, Request, Response};

/// Aggregation server CLI
#[derive(Parser, Debug)]
#[command(name = "aggregation-cli")]
#[command(about = "CLI for the weather aggregation server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4567")]
    server: String,

    /// Lamport clock value to send
    #[arg(short, long, default_value = "0")]
    clock: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch all stations, or one station
    Get {
        /// Station id to fetch
        station: Option<String>,
    },

    /// Upload one station update
    Put {
        /// JSON object with an "id" field
        body: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let request = match &args.command {
        Commands::Get { station: Some(id) } => Request::get(format!("/weather.json/{}", id)),
        Commands::Get { station: None } => Request::get("/weather.json"),
        Commands::Put { body } => Request::put("/weather.json", body.clone().into_bytes()),
    }
    .with_lamport_clock(args.clock);

    match send(&args.server, &request) {
        Ok(response) => {
            println!("{} {}", response.status.code(), response.status.reason());
            for (name, value) in response.headers.iter() {
                println!("{}: {}", name, value);
            }
            if !response.body.is_empty() {
                println!();
                println!("{}", String::from_utf8_lossy(&response.body));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Request to {} failed: {}", args.server, e);
            ExitCode::FAILURE
        }
    }
}

fn send(server: &str, request: &Request) -> weather_aggregator::Result<Response> {
    let stream = TcpStream::connect(server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_request(&mut writer, request)?;
    read_response(&mut reader)
}
