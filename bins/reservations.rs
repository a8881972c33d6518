use dotenvy::dotenv;
use tracing::{error, info};
use uuid::Uuid;

use service::{ReservationStore, StoreOptions};

fn init_logging(format: &str) {
    common::utils::logging::init_logging_named(format);
    info!(service = "reservations", event = "logger_init", format, "tracing subscriber initialized");
}

/// Open the store the same way a serving process would and print the
/// availability of every spot as JSON.
async fn run(cfg: configs::AppConfig) -> anyhow::Result<()> {
    service::runtime::ensure_env(&cfg.storage).await?;
    let store = ReservationStore::open(StoreOptions::from(&cfg.storage)).await?;

    let availability = store.availability();
    let free = availability.iter().filter(|s| s.is_free()).count();
    info!(
        service = "reservations",
        event = "summary",
        spots = availability.len(),
        free,
        reserved = availability.len() - free,
        "store loaded"
    );
    println!("{}", serde_json::to_string_pretty(&availability)?);
    Ok(())
}

fn main() -> std::process::ExitCode {
    dotenv().ok();

    let cfg = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(service = "reservations", event = "config_invalid", error = %e, "invalid configuration");
            return std::process::ExitCode::FAILURE;
        }
    };
    init_logging(cfg.logging.format.as_str());

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "reservations", event = "panic", %run_id, pid, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "reservations", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "reservations",
        event = "start",
        %run_id,
        pid,
        version,
        data_file = %cfg.storage.data_file.display(),
        "reservation inspection starting"
    );

    rt.block_on(async move {
        match run(cfg).await {
            Ok(()) => {
                info!(service = "reservations", event = "stop", %run_id, "done");
                std::process::ExitCode::SUCCESS
            }
            Err(e) => {
                error!(service = "reservations", event = "run_failed", %run_id, error = %e, "inspection failed");
                std::process::ExitCode::FAILURE
            }
        }
    })
}
