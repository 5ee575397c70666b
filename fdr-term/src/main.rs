use clap::Parser;
use fdr::{ManagerConfig, SimConnectManager};
use simconnect::SimConnector;

mod console;

use console::{ConsoleSink, Options};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();

    let mut config = ManagerConfig::default();
    if let Some(app_name) = options.app_name {
        config.app_name = app_name;
    }

    let manager = SimConnectManager::new(SimConnector, config);
    let status = manager.status_changes();

    if options.non_interactive {
        manager.attach_event_sink(ConsoleSink);
        manager.start_connection();

        // runs until the process is killed
        for connected in status.iter() {
            log::debug!("Connection status: {}", connected);
        }
    } else {
        manager.start_connection();

        std::thread::spawn(move || {
            for connected in status.iter() {
                if connected {
                    println!("SimConnect connection established!");
                } else {
                    println!("SimConnect disconnected.");
                }
            }
        });

        let stdin = std::io::stdin();
        if let Err(e) = console::run(&manager, stdin.lock(), std::io::stdout()) {
            log::error!("Console failed: {}", e);
        }
    }

    manager.stop_connection();
}
