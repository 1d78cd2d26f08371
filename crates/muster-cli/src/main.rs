//! muster — operator CLI for the attendance daemon.
//!
//! Thin D-Bus client over musterd. The acting identity travels with each
//! call; this tool runs on a trusted bus, so authentication sits in front
//! of the daemon, not here.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.muster.Attendance1",
    default_service = "org.muster.Attendance1",
    default_path = "/org/muster/Attendance1"
)]
trait Attendance {
    async fn capture(
        &self,
        image: String,
        station_id: i64,
        kind: &str,
        identity: &str,
    ) -> zbus::Result<String>;
    async fn create_manual(
        &self,
        personnel_id: i64,
        kind: &str,
        captured_at: &str,
        identity: &str,
    ) -> zbus::Result<String>;
    async fn list_events(&self, query: &str, identity: &str) -> zbus::Result<String>;
    async fn get_event(&self, id: i64, identity: &str) -> zbus::Result<String>;
    async fn edit_event(&self, id: i64, patch: &str, identity: &str) -> zbus::Result<String>;
    async fn delete_event(&self, id: i64, identity: &str) -> zbus::Result<()>;
    async fn list_pending(&self, identity: &str) -> zbus::Result<String>;
    async fn pending_count(&self, identity: &str) -> zbus::Result<u64>;
    async fn approve_pending(&self, id: i64, identity: &str) -> zbus::Result<String>;
    async fn reject_pending(&self, id: i64, identity: &str) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "muster", about = "Attendance workflow CLI")]
struct Cli {
    /// Acting user id
    #[arg(long, global = true, default_value_t = 0)]
    actor: i64,
    /// Acting role: admin, station_user, or kiosk
    #[arg(long, global = true, default_value = "admin")]
    role: String,
    /// Station binding of the acting user
    #[arg(long, global = true)]
    station: Option<i64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture attendance from an image file (JPEG or PNG)
    Capture {
        /// Image file to submit
        #[arg(short, long)]
        image: PathBuf,
        /// Recognition scope override (admins only)
        #[arg(long)]
        scope: Option<i64>,
        /// Expected kind (time_in or time_out); omit to let the sequence decide
        #[arg(long)]
        kind: Option<String>,
    },
    /// Record a manual attendance entry
    Manual {
        /// Personnel id
        personnel: i64,
        /// time_in or time_out
        kind: String,
        /// RFC 3339 timestamp; must not be in the future
        at: String,
    },
    /// List attendance events
    List {
        #[arg(long)]
        personnel: Option<i64>,
        /// Station filter (overridden for station-bound roles)
        #[arg(long)]
        filter_station: Option<i64>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one attendance event
    Show { id: i64 },
    /// Edit an attendance event
    Edit {
        id: i64,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        personnel: Option<i64>,
    },
    /// Delete an attendance event (admin only)
    Delete { id: i64 },
    /// List captures waiting for review (admin only)
    Pending {
        /// Print only the count
        #[arg(long)]
        count: bool,
    },
    /// Approve a pending capture (admin only)
    Approve { id: i64 },
    /// Reject a pending capture (admin only)
    Reject { id: i64 },
    /// Show daemon status
    Status,
}

/// Guess the data-URI prefix from the file extension.
fn data_uri_prefix(path: &PathBuf) -> Result<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => Ok("data:image/jpeg;base64,"),
        Some("png") => Ok("data:image/png;base64,"),
        other => bail!("unsupported image extension {other:?}; use .jpg or .png"),
    }
}

fn identity_json(cli: &Cli) -> String {
    serde_json::json!({
        "actor_id": cli.actor,
        "role": cli.role,
        "station_id": cli.station,
    })
    .to_string()
}

/// Pretty-print a JSON reply, passing it through verbatim if it does not
/// parse (the daemon is the source of truth for the schema).
fn print_reply(raw: &str) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
        Err(_) => println!("{raw}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let identity = identity_json(&cli);

    let conn = zbus::connection::Builder::system()?
        .build()
        .await
        .context("connecting to the system bus")?;
    let proxy = AttendanceProxy::new(&conn)
        .await
        .context("creating attendance proxy")?;

    match &cli.command {
        Commands::Capture { image, scope, kind } => {
            let bytes = std::fs::read(image)
                .with_context(|| format!("reading {}", image.display()))?;
            let payload = format!("{}{}", data_uri_prefix(image)?, BASE64.encode(&bytes));
            let reply = proxy
                .capture(
                    payload,
                    scope.unwrap_or(0),
                    kind.as_deref().unwrap_or(""),
                    &identity,
                )
                .await?;
            print_reply(&reply);
        }
        Commands::Manual {
            personnel,
            kind,
            at,
        } => {
            let reply = proxy
                .create_manual(*personnel, kind, at, &identity)
                .await?;
            print_reply(&reply);
        }
        Commands::List {
            personnel,
            filter_station,
            kind,
            page,
            limit,
        } => {
            let query = serde_json::json!({
                "personnel_id": personnel,
                "station_id": filter_station,
                "kind": kind,
                "page": page,
                "limit": limit,
            })
            .to_string();
            let reply = proxy.list_events(&query, &identity).await?;
            print_reply(&reply);
        }
        Commands::Show { id } => {
            let reply = proxy.get_event(*id, &identity).await?;
            print_reply(&reply);
        }
        Commands::Edit {
            id,
            kind,
            personnel,
        } => {
            let patch = serde_json::json!({
                "kind": kind,
                "personnel_id": personnel,
            })
            .to_string();
            let reply = proxy.edit_event(*id, &patch, &identity).await?;
            print_reply(&reply);
        }
        Commands::Delete { id } => {
            proxy.delete_event(*id, &identity).await?;
            println!("deleted event #{id}");
        }
        Commands::Pending { count } => {
            if *count {
                let n = proxy.pending_count(&identity).await?;
                println!("{n}");
            } else {
                let reply = proxy.list_pending(&identity).await?;
                print_reply(&reply);
            }
        }
        Commands::Approve { id } => {
            let reply = proxy.approve_pending(*id, &identity).await?;
            print_reply(&reply);
        }
        Commands::Reject { id } => {
            let reply = proxy.reject_pending(*id, &identity).await?;
            print_reply(&reply);
        }
        Commands::Status => {
            let reply = proxy.status().await?;
            print_reply(&reply);
        }
    }

    Ok(())
}
