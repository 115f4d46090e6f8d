use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use netframe_peer::{Connection, Listener, PeerError};
use tracing::{info, warn};

use crate::cmd::EchoArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let listener =
        Listener::bind(args.addr.as_str()).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "echo server listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    while running.load(Ordering::SeqCst) {
        let conn = match listener.accept() {
            Ok(conn) => conn,
            Err(err) => return Err(peer_error("accept failed", err)),
        };

        let running = Arc::clone(&running);
        thread::spawn(move || echo_connection(conn, &running));
    }

    Ok(SUCCESS)
}

fn echo_connection(mut conn: Connection, running: &AtomicBool) {
    info!(conn = conn.id(), peer = ?conn.peer_addr(), "connection opened");

    while running.load(Ordering::SeqCst) {
        match conn.recv() {
            Ok(message) => {
                info!(conn = conn.id(), size = message.len(), "echoing message");
                if let Err(err) = conn.send(message) {
                    warn!(conn = conn.id(), error = %err, "echo send failed");
                    break;
                }
            }
            Err(err) => {
                match classify_recv_error(err) {
                    RecvErrorDisposition::CleanClose => {}
                    RecvErrorDisposition::Unexpected(err) => {
                        warn!(conn = conn.id(), error = %err, "receive failed");
                    }
                }
                break;
            }
        }
    }

    info!(conn = conn.id(), "connection finished");
}

enum RecvErrorDisposition {
    CleanClose,
    Unexpected(PeerError),
}

fn classify_recv_error(err: PeerError) -> RecvErrorDisposition {
    if matches!(err, PeerError::Disconnected(_)) {
        return RecvErrorDisposition::CleanClose;
    }
    RecvErrorDisposition::Unexpected(err)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install signal handler: {err}")))
}
