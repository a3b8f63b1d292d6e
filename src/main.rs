use clap::{Parser, Subcommand};
#[cfg(unix)]
use daemonize::Daemonize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use sysinfo::{Pid, System};

use yt_dlp_gateway::config::load_config;
use yt_dlp_gateway::{router, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP gateway around a yt-dlp compatible downloader.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manages the gateway server process.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServerAction {
    /// Launch the server as a detached background process.
    Start,
    /// Terminate the background server.
    Stop,
    /// Stop the background server and launch it again.
    Restart,
    /// Serve in the foreground on HOST:PORT.
    Run,
    /// Report whether the background server is alive.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::Server { action } => match action {
            ServerAction::Start => spawn_daemon()?,
            ServerAction::Stop => stop_daemon()?,
            ServerAction::Restart => {
                stop_daemon()?;
                std::thread::sleep(std::time::Duration::from_secs(1));
                spawn_daemon()?;
            }
            ServerAction::Run => serve_foreground().await?,
            ServerAction::Status => report_status()?,
        },
    }

    Ok(())
}

/// Foreground server; `server start` re-executes the binary into this path.
async fn serve_foreground() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT").unwrap_or_else(|_| "2096".to_string()).parse()?;

    // Refuse to start at all while something else holds the port.
    if port_in_use(&host, port) {
        tracing::error!("Address http://{}:{} already in use", host, port);
        std::process::exit(0);
    }

    let config = load_config().await?;
    let state = AppState {
        config: Arc::new(config),
    };

    let addr = format!("{}:{}", host, port);
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Bind probe for the configured address. Only `AddrInUse` counts as busy;
/// any other failure is left for the real bind to report.
fn port_in_use(host: &str, port: u16) -> bool {
    match std::net::TcpListener::bind((host, port)) {
        Ok(_) => false,
        Err(e) => e.kind() == std::io::ErrorKind::AddrInUse,
    }
}

fn spawn_daemon() -> anyhow::Result<()> {
    if let Some(pid) = daemon_pid()? {
        println!("Already running (PID {}).", pid);
        return Ok(());
    }

    let pid_file = pid_file_path()?;
    let myself = env::current_exe()?;
    println!("Launching background server...");

    #[cfg(unix)]
    {
        // Forking after the tokio runtime starts is not an option, so the
        // detached process re-executes itself with `server run` and records
        // the child's PID.
        match Daemonize::new().pid_file(&pid_file).start() {
            Ok(_) => {
                let child = Command::new(&myself).arg("server").arg("run").spawn()?;
                fs::write(&pid_file, child.id().to_string())?;
            }
            Err(e) => eprintln!("Could not daemonize: {}", e),
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;

        let child = Command::new(&myself)
            .arg("server")
            .arg("run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;
        fs::write(&pid_file, child.id().to_string())?;
    }

    println!("Started. PID file: {}", pid_file.display());
    Ok(())
}

fn stop_daemon() -> anyhow::Result<()> {
    let pid_file = pid_file_path()?;
    let Some(pid) = daemon_pid()? else {
        println!("Not running.");
        if pid_file.exists() {
            fs::remove_file(&pid_file)?;
        }
        return Ok(());
    };

    println!("Stopping PID {}...", pid);
    let system = System::new_all();
    if let Some(process) = system.process(Pid::from_u32(pid)) {
        process.kill();
    }
    fs::remove_file(&pid_file)?;
    println!("Stopped.");
    Ok(())
}

fn report_status() -> anyhow::Result<()> {
    match daemon_pid()? {
        Some(pid) => println!("Running (PID {}).", pid),
        None => println!("Not running."),
    }
    Ok(())
}

/// PID file under the platform data directory.
fn pid_file_path() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "YourOrg", "YT-DLP-Gateway")
        .ok_or_else(|| anyhow::anyhow!("No usable home directory for the PID file"))?;
    let data_dir = dirs.data_local_dir();
    fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("server.pid"))
}

/// The recorded PID, provided the file exists and the process is alive.
fn daemon_pid() -> anyhow::Result<Option<u32>> {
    let pid_file = pid_file_path()?;
    if !pid_file.exists() {
        return Ok(None);
    }
    let pid: u32 = fs::read_to_string(pid_file)?.trim().parse()?;
    let system = System::new_all();
    Ok(system.process(Pid::from_u32(pid)).is_some().then_some(pid))
}
