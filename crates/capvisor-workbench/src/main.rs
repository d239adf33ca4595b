#![forbid(unsafe_code)]

use capvisor_model::{FaceShape, Gender, HatType, TargetingParameters, TopicCard};
use capvisor_workbench::{ApiClient, FileTokenStore, Session, DEFAULT_SERVER_URL};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "capvisor")]
#[command(about = "CapVisor content ideation client")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, env = "CAPVISOR_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,
    #[arg(long, global = true, env = "CAPVISOR_TOKEN_FILE")]
    token_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is up.
    Health,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CAPVISOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Print the parameter deck and knowledge base.
    Catalog,
    Topics {
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Expand a topic title into an asset stream.
    Skeleton {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    Translate {
        visual_logic: String,
    },
    Logs,
}

#[derive(clap::Args)]
struct ParamArgs {
    #[arg(long, default_value = "square-round")]
    face_shape: FaceShape,
    #[arg(long, default_value = "fisherman")]
    hat_type: HatType,
    #[arg(long, default_value = "female")]
    gender: Gender,
    #[arg(long = "origin")]
    origin: Vec<String>,
    #[arg(long = "scene")]
    scene: Vec<String>,
    #[arg(long, default_value_t = 10)]
    volume: u32,
    #[arg(long, default_value_t = 1)]
    depth: u8,
}

impl ParamArgs {
    fn into_params(self) -> TargetingParameters {
        let defaults = TargetingParameters::default();
        TargetingParameters {
            origin: if self.origin.is_empty() {
                defaults.origin
            } else {
                self.origin
            },
            scene: if self.scene.is_empty() {
                defaults.scene
            } else {
                self.scene
            },
            face_shape: self.face_shape,
            gender: self.gender,
            hat_type: self.hat_type,
            volume: self.volume,
            depth: self.depth,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CAPVISOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("CAPVISOR_LOG_JSON").is_ok_and(|v| matches!(v.as_str(), "1" | "true"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("encode output: {e}"))?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let token_file = cli
        .token_file
        .or_else(FileTokenStore::default_path)
        .ok_or_else(|| "cannot locate a token file; pass --token-file".to_string())?;
    let session = Session::init_from_storage(Box::new(FileTokenStore::new(token_file)))
        .map_err(|e| e.to_string())?;
    let mut client = ApiClient::new(&cli.server, session).map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Health => print_json(&client.health().await.map_err(|e| e.to_string())?),
        Commands::Login { email, password } => {
            let resp = client
                .login(&email, &password)
                .await
                .map_err(|e| e.to_string())?;
            print_json(&resp.user)
        }
        Commands::Logout => client.logout().map_err(|e| e.to_string()),
        Commands::Catalog => print_json(&client.catalog().await.map_err(|e| e.to_string())?),
        Commands::Topics { params } => {
            let topics = client
                .topics(&params.into_params())
                .await
                .map_err(|e| e.to_string())?;
            print_json(&topics)
        }
        Commands::Skeleton {
            title,
            summary,
            params,
        } => {
            let topic = TopicCard {
                id: "topic-1".to_string(),
                title,
                heat: 60.0,
                summary,
            };
            let stream = client
                .skeleton(&topic, &params.into_params())
                .await
                .map_err(|e| e.to_string())?;
            print_json(&stream)
        }
        Commands::Translate { visual_logic } => {
            let prompt = client
                .translate(&visual_logic)
                .await
                .map_err(|e| e.to_string())?;
            println!("{prompt}");
            Ok(())
        }
        Commands::Logs => print_json(&client.logs().await.map_err(|e| e.to_string())?),
    }
}
