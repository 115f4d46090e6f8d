use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netframe_peer::{Listener, PeerError};
use tracing::{debug, info};

use crate::cmd::ListenArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        Listener::bind(args.addr.as_str()).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = match listener.accept() {
            Ok(conn) => conn,
            Err(err) => return Err(peer_error("accept failed", err)),
        };

        while running.load(Ordering::SeqCst) {
            let message = match conn.recv() {
                Ok(message) => message,
                Err(PeerError::Disconnected(_)) => {
                    debug!(conn = conn.id(), "peer disconnected");
                    break;
                }
                Err(err) => return Err(peer_error("receive failed", err)),
            };

            print_message(&message, conn.id(), format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install signal handler: {err}")))
}
