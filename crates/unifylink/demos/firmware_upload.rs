//! Streams a firmware image through a deliberately small send queue.
//!
//! Run with:
//!   cargo run --example firmware-upload

use std::sync::{Arc, Mutex};

use unifylink::components::{FirmwareImage, FirmwareUpload, Update};
use unifylink::frame::crc16;
use unifylink::{Link, LinkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = Link::new(LinkConfig {
        // Room for two chunk frames at a time.
        max_queue_bytes: 2 * 264,
        ..LinkConfig::default()
    });
    let device = Link::default();
    let host_update = Update::new(&host);
    let device_update = Update::new(&device);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    device_update.on_chunk(move |chunk| {
        if let Ok(mut image) = sink.lock() {
            image.extend_from_slice(&chunk.data);
        }
    });

    let image: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 251) as u8).collect();
    let mut upload = FirmwareUpload::new(FirmwareImage::new(image.clone()));

    let mut rounds = 0;
    loop {
        let done = upload.pump(&host_update)?;
        device.push_received_bytes(&host.drain_outbound())?;
        device.run_parse_pass();
        rounds += 1;
        eprintln!(
            "round {rounds}: {}/{} frames queued",
            upload.frames_queued(),
            upload.frames_total()
        );
        if done {
            break;
        }
    }

    let mut flashed = received.lock().map_err(|_| "image buffer poisoned")?.clone();
    // The last chunk is zero-padded; the real length comes out of band.
    flashed.truncate(image.len());
    let crc = crc16(&flashed);
    eprintln!(
        "device saw {} chunks, image crc {crc:#06x}, announced {:#06x}",
        device_update.chunks_received(),
        device_update.last_crc()
    );
    if crc != device_update.last_crc() || flashed != image {
        return Err("image mismatch".into());
    }
    Ok(())
}
