//! Minimal echo server: accepts connections and echoes messages back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! Then, in another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7400 --data hello --wait

use std::thread;

use netframe::peer::Listener;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind("127.0.0.1:7400")?;
    eprintln!("Listening on {}", listener.local_addr());

    loop {
        let mut conn = listener.accept()?;
        eprintln!("Connection {} from {:?}", conn.id(), conn.peer_addr());

        thread::spawn(move || loop {
            match conn.recv() {
                Ok(message) => {
                    eprintln!("conn {}: echoing {} bytes", conn.id(), message.len());
                    if conn.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    eprintln!("conn {} finished: {err}", conn.id());
                    break;
                }
            }
        });
    }
}
