mod cli;

use bgpcore::peer::{PeerConfig, PeerOptions};
use bgpcore::rib::LoggingRibSink;
use bgpcore::speaker::Speaker;
use clap::Parser;

fn setup_logger(verbose: bool) {
    let config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    simplelog::TermLogger::init(
        if verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");
}

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    setup_logger(args.verbose);

    let mut speaker = match Speaker::bind(args.listen_addr, args.listen_port, LoggingRibSink).await
    {
        Ok(speaker) => speaker,
        Err(err) => {
            log::error!("failed to bind listener: {err}");
            std::process::exit(1);
        }
    };

    for peer in &args.peers {
        speaker.add_peer(PeerConfig {
            local_as: args.local_as,
            remote_as: peer.asn,
            remote_addr: peer.addr,
            local_bgp_id: args.local_id,
            hold_time: peer.hold_time,
            options: PeerOptions::default(),
        });
        log::info!("configured peer AS{} at {}", peer.asn, peer.addr);
    }

    if let Err(err) = speaker.run().await {
        log::error!("speaker exited: {err}");
        std::process::exit(1);
    }
}
