use std::net::TcpListener;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use rust_l2ctl::config::Config;
use rust_l2ctl::mac_learning::SwitchRegistry;
use rust_l2ctl::ofp_controller;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();
    let listener = TcpListener::bind(config.listen_on())
        .with_context(|| format!("binding {}", config.listen_on()))?;
    info!("listening for switches on {}", config.listen_on());

    let registry = Arc::new(SwitchRegistry::new());
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream.peer_addr().ok();
                info!("switch connected from {:?}", peer);
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("{:?}: cannot set TCP_NODELAY: {}", peer, e);
                }
                let registry = registry.clone();
                let config = config.clone();
                std::thread::spawn(move || {
                    if let Err(e) = ofp_controller::handle_client_connected(stream, registry, &config) {
                        error!("session with {:?} ended: {}", peer, e);
                    }
                });
            }
            Err(e) => warn!("connection failed: {}", e),
        }
    }
    Ok(())
}
