use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about = "svcbridge heartbeat daemon")]
pub struct Args {
    /// Name the service is registered and reported under
    #[arg(long, default_value = "svcbridge")]
    pub service_name: String,

    /// Register the service and its event source, then exit
    #[arg(long)]
    pub register_service: bool,

    /// Remove the service and its event source, then exit
    #[arg(long)]
    pub unregister_service: bool,

    /// Run under the host service manager (set by registration)
    #[arg(long, hide = true)]
    pub run_service: bool,

    /// Path to configuration file
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Maximum level forwarded to the log
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}
