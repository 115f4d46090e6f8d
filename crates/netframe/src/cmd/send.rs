use std::fs;
use std::time::Duration;

use netframe_channel::ChannelConfig;
use netframe_peer::connect_with_config;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let send_timeout = parse_duration(&args.send_timeout)?;
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "--repeat must be at least 1"));
    }

    let payload = resolve_payload(&args)?;

    let config = ChannelConfig::default().with_send_timeout(Some(send_timeout));
    let mut conn = connect_with_config(args.addr.as_str(), &config)
        .map_err(|err| peer_error("connect failed", err))?;
    debug!(conn = conn.id(), addr = %args.addr, "connected");

    for _ in 0..args.repeat {
        conn.send(payload.clone())
            .map_err(|err| peer_error("send failed", err))?;
    }
    conn.flush().map_err(|err| peer_error("send failed", err))?;

    if args.wait {
        let reply = conn
            .recv_timeout(wait_timeout)
            .map_err(|err| peer_error("receive failed", err))?;
        print_message(&reply, conn.id(), format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| io_error("failed to read payload file", err));
    }
    Err(CliError::new(
        USAGE,
        "a payload is required: use --data or --file",
    ))
}

/// Parse a human duration: `5s`, `500ms`, or a bare number of seconds.
fn parse_duration(value: &str) -> CliResult<Duration> {
    let value = value.trim();

    let duration = if let Some(millis) = value.strip_suffix("ms") {
        millis
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    };

    match duration {
        Some(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(CliError::new(
            USAGE,
            format!("invalid duration '{value}': expected forms like 5s, 500ms, 30"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("0ms").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5m").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn resolve_payload_requires_a_source() {
        let args = SendArgs {
            addr: "127.0.0.1:7400".to_string(),
            data: None,
            file: None,
            repeat: 1,
            wait: false,
            wait_timeout: "5s".to_string(),
            send_timeout: "30s".to_string(),
        };

        let err = resolve_payload(&args).expect_err("missing payload should fail");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn resolve_payload_prefers_inline_data() {
        let args = SendArgs {
            addr: "127.0.0.1:7400".to_string(),
            data: Some("inline".to_string()),
            file: None,
            repeat: 1,
            wait: false,
            wait_timeout: "5s".to_string(),
            send_timeout: "30s".to_string(),
        };

        let payload = resolve_payload(&args).expect("inline payload should resolve");
        assert_eq!(payload, b"inline");
    }
}
