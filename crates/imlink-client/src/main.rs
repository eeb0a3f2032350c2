//! imlink-chat: terminal front end for the imlink client.
//!
//! Usage: `imlink-chat <username> <password> [conversation]`
//! - Config from `$IMLINK_CONFIG` (default `imlink.yaml`; built-in defaults when absent)
//! - Logs in, then sends every stdin line to the conversation
//! - `/probe` prints connectivity, `/quit` closes the connection and exits
//!   (immediately when there is no open connection to close)

use std::path::Path;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use imlink_client::transport::ConnectionState;
use imlink_client::{config, Client, ClientEvent};

const DEFAULT_CONFIG: &str = "imlink.yaml";
const DEFAULT_CONVERSATION: &str = "lobby";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: imlink-chat <username> <password> [conversation]");
        return ExitCode::from(2);
    };
    let conversation = args.next().unwrap_or_else(|| DEFAULT_CONVERSATION.to_owned());

    let path = std::env::var("IMLINK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_owned());
    let cfg = if Path::new(&path).exists() {
        match config::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        config::ClientConfig::default()
    };

    tracing::info!(url = %cfg.server.url(), "imlink-chat starting");
    let mut client = Client::new(cfg);
    if let Err(e) = client.login(&username, &password) {
        eprintln!("login: {e}");
        return ExitCode::FAILURE;
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut logged_in = false;

    loop {
        tokio::select! {
            line = stdin.next_line(), if logged_in => {
                let Ok(Some(line)) = line else { break; };
                match line.trim() {
                    "/quit" => {
                        client.close();
                        if client.state() != ConnectionState::Closing {
                            break;
                        }
                        continue;
                    }
                    "/probe" => {
                        let (_, status) = client.probe();
                        println!("{status}");
                        continue;
                    }
                    _ => {}
                }
                if let Err(e) = client.send_message(&conversation, &line) {
                    println!("send failed: {e}");
                }
            }

            ev = client.next_event() => {
                let Some(ev) = ev else { break; };
                match ev {
                    ClientEvent::LoginSuccess(user) => {
                        println!("logged in as {user}");
                        logged_in = true;
                    }
                    ClientEvent::LoginFailure(reason) => {
                        println!("login failed: {reason}");
                        return ExitCode::FAILURE;
                    }
                    ClientEvent::MessageDisplay(line) => println!("{line}"),
                    ClientEvent::ErrorOccurred(reason) => println!("connection error: {reason}"),
                    ClientEvent::Connected => println!("connected"),
                    ClientEvent::Disconnected => {
                        println!("disconnected");
                        break;
                    }
                    ClientEvent::StateChanged(state) => {
                        tracing::debug!(state = state.as_str(), "state changed")
                    }
                }
            }
        }
    }

    ExitCode::SUCCESS
}
