use gesture_logger::archive::ArchiveTransport;
use gesture_logger::config::Config;
use gesture_logger::context::XrContext;
use gesture_logger::demo_session::{record_demonstration, view_demonstration};
use gesture_logger::frame_loop::FrameDriver;
use gesture_logger::launch::{LaunchMode, LaunchParams};
use gesture_logger::simulation::{autopilot, SimulatedHands, SimulatedStage};
use gesture_logger::transport::HttpBackend;
use gesture_logger::trial_manager::TrialManager;
use std::error::Error;
use std::process::ExitCode;
use std::rc::Rc;
use tokio::task::LocalSet;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(launch_url) = std::env::args().nth(1) else {
        eprintln!("Usage: gesture-logger <launch-url>");
        return ExitCode::from(2);
    };

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Using default configuration: {}", e);
        Config::default()
    });

    let params = match LaunchParams::from_url(&launch_url) {
        Ok(params) => params,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match LocalSet::new().block_on(&runtime, run(config, params)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, params: LaunchParams) -> Result<(), Box<dyn Error>> {
    let backend = HttpBackend::new(params.backend_url(&config)?)?;
    log::info!("Collection server: {}", backend.base_url());
    let archive = config.archive_dir.clone().map(ArchiveTransport::new);
    if let Some(archive) = &archive {
        log::info!("Capture data is archived under {}", archive.root().display());
    }

    let hands = Rc::new(SimulatedHands::new());
    let stage = Rc::new(SimulatedStage::new());
    let context = XrContext::new(hands.clone(), stage.clone(), config);
    autopilot(&context, hands, stage)?;
    let _driver = FrameDriver::spawn(context.scheduler.clone(), context.config.frame_interval());

    match params.mode {
        LaunchMode::Trial(participant) => {
            let completion = match &archive {
                Some(archive) => TrialManager::new(&context, archive, &backend, participant).run().await?,
                None => TrialManager::new(&context, &backend, &backend, participant).run().await?,
            };
            log::info!("Trial {} complete", completion.trial_id);
        }
        LaunchMode::RecordDemonstration(request) => {
            let attempts = match &archive {
                Some(archive) => record_demonstration(&context, archive, &backend, &request).await?,
                None => record_demonstration(&context, &backend, &backend, &request).await?,
            };
            log::info!("Demonstration recorded in {} attempt(s)", attempts);
        }
        LaunchMode::ViewDemonstration(class) => {
            if let Some(_playback) = view_demonstration(&context, &backend, &class).await? {
                log::info!("Playing demonstration, press Ctrl-C to stop");
                tokio::signal::ctrl_c().await?;
            }
        }
    }
    Ok(())
}
