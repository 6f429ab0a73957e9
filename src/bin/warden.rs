//! Service control entry point.
//!
//! One subcommand word per invocation: `install`, `uninstall`, `start`,
//! `stop`, `restart`, `status`, `run`, `version`. Configuration comes
//! from the `WARDEN_*` environment variables; there is deliberately no
//! flag parsing.
//!
//! `run` is invoked by the host service manager, not by an operator; it
//! logs to rolling files under the working directory so output survives
//! detached execution. Operator subcommands log to stderr.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use warden::ServiceConfig;
use warden::service::Supervisor;

fn print_usage() {
    eprintln!(
        "usage: warden <command>\n\
         \n\
         commands:\n\
         \x20 install     register the service with the host service manager\n\
         \x20 uninstall   remove the registration\n\
         \x20 start       start the registered service\n\
         \x20 stop        stop the registered service\n\
         \x20 restart     restart via the host's restart primitive\n\
         \x20 status      print running | stopped | unknown\n\
         \x20 run         service entry point (invoked by the service manager)\n\
         \x20 version     print the build version"
    );
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .init();
}

fn init_file_logging(config: &ServiceConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "warden.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(env_filter())
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = std::env::args().nth(1).unwrap_or_default();
    let config = ServiceConfig::from_env();

    match command.as_str() {
        "version" => {
            println!("warden {}", warden::build_version());
            return Ok(());
        }
        "" | "help" | "--help" => {
            print_usage();
            return Ok(());
        }
        _ => {}
    }

    // Keep the non-blocking writer alive for the process lifetime.
    let _log_guard: Option<WorkerGuard> = if command == "run" {
        Some(init_file_logging(&config)?)
    } else {
        init_stderr_logging();
        None
    };

    let supervisor = Supervisor::new(config).context("cannot initialise service manager")?;

    match command.as_str() {
        "install" => {
            supervisor.install()?;
            println!("service installed");
        }
        "uninstall" => {
            supervisor.uninstall()?;
            println!("service uninstalled");
        }
        "start" => {
            supervisor.start()?;
            println!("service started");
        }
        "stop" => {
            supervisor.stop()?;
            println!("service stopped");
        }
        "restart" => {
            supervisor.restart()?;
            println!("service restarted");
        }
        "status" => {
            println!("{}", supervisor.status()?);
        }
        "run" => {
            supervisor.run().await?;
        }
        other => {
            eprintln!("unknown command: {other}\n");
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}
