//! Many producers, one connection: cloned senders feed the same send
//! pipeline, which coalesces queued messages into single writes.
//!
//! Run with:
//!   cargo run --example fanout

use std::thread;

use netframe::peer::{connect, Listener, PeerError};

const PRODUCERS: usize = 4;
const PER_PRODUCER: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr();

    let server = thread::spawn(move || -> Result<usize, PeerError> {
        let mut conn = listener.accept()?;
        let mut received = 0usize;
        while received < PRODUCERS * PER_PRODUCER {
            let message = conn.recv()?;
            eprintln!("[server] {}", String::from_utf8_lossy(&message));
            received += 1;
        }
        Ok(received)
    });

    let conn = connect(addr)?;
    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let sender = conn.sender();
        producers.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                sender
                    .send(format!("producer {p} message {i}"))
                    .expect("send should queue");
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer thread should finish");
    }
    conn.flush()?;

    let received = server.join().expect("server thread should finish")?;
    eprintln!("[client] server received {received} messages");
    Ok(())
}
