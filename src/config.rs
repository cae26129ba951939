use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// Controller settings.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[clap(name = "rust_l2ctl_controller", version, about)]
pub struct Config {
    /// Address to accept switch connections on
    #[clap(short = 'l', long, default_value = "0.0.0.0")]
    pub listen_address: IpAddr,

    /// OpenFlow controller port
    #[clap(short, long, default_value = "6633")]
    pub port: u16,

    /// Also forget hosts learned on a port when the switch reports it deleted
    #[clap(long)]
    pub purge_learned_on_port_delete: bool,
}

impl Config {
    pub fn listen_on(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 6633,
            purge_learned_on_port_delete: false,
        }
    }
}
