//! Line-oriented bridge between a BLE transport shim and the service.
//!
//! Inbound, one write per line: `<characteristic-uuid> <base64 write>`.
//! Outbound, one notification per line:
//! `<characteristic-uuid> <device-id> <base64 payload>`.

use crate::component_event;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pairing_session::{Characteristic, Notification, PairingService};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Parse one inbound line into a characteristic and raw write
pub fn parse_line(line: &str) -> Result<(Characteristic, Vec<u8>)> {
    let (uuid, data) = line
        .trim()
        .split_once(' ')
        .ok_or_else(|| anyhow!("expected `<uuid> <base64>`"))?;
    let characteristic: Characteristic = uuid.parse()?;
    let raw = STANDARD
        .decode(data.trim())
        .context("write is not valid base64")?;
    Ok((characteristic, raw))
}

/// Render one notification as an outbound line
pub fn format_notification(n: &Notification) -> String {
    format!(
        "{} {} {}\n",
        n.characteristic.uuid(),
        n.device_id,
        STANDARD.encode(&n.payload)
    )
}

/// Pump lines into the service and notifications out until input ends
pub async fn run<R, W>(
    service: Arc<PairingService>,
    input: R,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    component_event!(INFO, "bridge", "Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok((characteristic, raw)) => {
                        component_event!(DEBUG, "bridge", "{} byte write on {}", raw.len(), characteristic);
                        service.on_characteristic_write(characteristic, &raw).await;
                    }
                    Err(e) => component_event!(WARN, "bridge", "Skipping input line: {:#}", e),
                }
            }

            Some(n) = notifications.recv() => {
                write_notification(&mut output, &n).await?;
            }
        }
    }

    // Flush whatever the last writes produced
    while let Ok(n) = notifications.try_recv() {
        write_notification(&mut output, &n).await?;
    }
    output.flush().await?;

    Ok(())
}

async fn write_notification<W: AsyncWrite + Unpin>(output: &mut W, n: &Notification) -> Result<()> {
    output
        .write_all(format_notification(n).as_bytes())
        .await
        .context("failed to write notification")?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairing_crypto::{aes_ctr_decrypt, aes_ctr_encrypt, base64_decode, base64_encode};
    use pairing_session::{ChannelNotifier, SessionStore};
    use pairing_wire::{Chunker, DeviceId, KeyEnvelope, DEFAULT_MAX_VALUE_SIZE};
    use rand::rngs::OsRng;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
    use tokio::io::BufReader;

    const DEVICE: &str = "0badc0de-1111-2222-3333-444444444444";

    fn line(characteristic: Characteristic, write: &[u8]) -> String {
        format!("{} {}\n", characteristic.uuid(), STANDARD.encode(write))
    }

    #[test]
    fn test_parse_line() {
        let (c, raw) = parse_line("00000004-1e3c-fad4-74e2-97a033f1bfaa aGVsbG8=\n").unwrap();
        assert_eq!(c, Characteristic::TestKey);
        assert_eq!(raw, b"hello");

        assert!(parse_line("00000004-1e3c-fad4-74e2-97a033f1bfaa").is_err());
        assert!(parse_line("00000009-1e3c-fad4-74e2-97a033f1bfaa aGVsbG8=").is_err());
        assert!(parse_line("00000004-1e3c-fad4-74e2-97a033f1bfaa %%%").is_err());
    }

    #[test]
    fn test_format_notification() {
        let n = Notification {
            characteristic: Characteristic::KeyTransfer,
            device_id: DeviceId::try_from(DEVICE).unwrap(),
            payload: (&b"already logged in"[..]).into(),
        };
        assert_eq!(
            format_notification(&n),
            format!(
                "00000003-1e3c-fad4-74e2-97a033f1bfaa {DEVICE} {}\n",
                STANDARD.encode(b"already logged in")
            )
        );
    }

    #[tokio::test]
    async fn test_handshake_over_bridge() {
        let (notifier, rx) = ChannelNotifier::new();
        let store = Arc::new(SessionStore::new(DEFAULT_MAX_VALUE_SIZE));
        let service = Arc::new(PairingService::new(store.clone(), Arc::new(notifier)));

        let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_out) = tokio::io::duplex(64 * 1024);
        let bridge = tokio::spawn(run(service, BufReader::new(server_in), rx, server_out));
        let mut replies = BufReader::new(client_out).lines();

        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let device = DeviceId::try_from(DEVICE).unwrap();
        let chunker = Chunker::new(128);

        // Garbage lines are skipped
        client_in.write_all(b"not a line\n\n").await.unwrap();
        for w in chunker.chunk_value(&device, pem.as_bytes(), None).unwrap() {
            client_in
                .write_all(line(Characteristic::KeyTransfer, &w).as_bytes())
                .await
                .unwrap();
        }

        let reply = replies.next_line().await.unwrap().unwrap();
        let fields: Vec<&str> = reply.split(' ').collect();
        assert_eq!(fields[0], Characteristic::KeyTransfer.uuid().to_string());
        assert_eq!(fields[1], DEVICE);

        let envelope = private
            .decrypt(Pkcs1v15Encrypt, &STANDARD.decode(fields[2]).unwrap())
            .unwrap();
        let envelope = KeyEnvelope::parse(std::str::from_utf8(&envelope).unwrap()).unwrap();
        let key = base64_decode(envelope.key_b64.as_bytes()).unwrap();
        let iv = base64_decode(envelope.iv_b64.as_bytes()).unwrap();

        let confirmation = base64_encode(&aes_ctr_encrypt(&key, &iv, b"Pass back").unwrap());
        let write = format!("{DEVICE}:[START][len:9]{confirmation}[END]");
        client_in
            .write_all(line(Characteristic::TestKey, write.as_bytes()).as_bytes())
            .await
            .unwrap();

        let reply = replies.next_line().await.unwrap().unwrap();
        let fields: Vec<&str> = reply.split(' ').collect();
        assert_eq!(fields[0], Characteristic::TestKey.uuid().to_string());
        let ct = STANDARD.decode(fields[2]).unwrap();
        assert_eq!(aes_ctr_decrypt(&key, &iv, ct.len(), &ct).unwrap(), b"Received");

        drop(client_in);
        bridge.await.unwrap().unwrap();
        assert_eq!(store.keys_generated(), 1);
    }
}
