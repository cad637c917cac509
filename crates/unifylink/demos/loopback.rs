//! Host and device links wired back to back in memory.
//!
//! The host commands a motor speed and asks for feedback; the device
//! applies the command and answers the read request from its own table.
//!
//! Run with:
//!   cargo run --example loopback

use unifylink::components::{MotorFeedback, MotorMode, Motors, MAX_MOTORS};
use unifylink::Link;

/// Move everything `from` has queued into `to` and dispatch it.
fn shuttle(from: &Link, to: &Link) -> Result<usize, Box<dyn std::error::Error>> {
    let wire = from.drain_outbound();
    to.push_received_bytes(&wire)?;
    Ok(to.run_parse_pass().frames)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = Link::default();
    let device = Link::default();
    let host_motors = Motors::new(&host);
    let device_motors = Motors::new(&device);

    device_motors.on_setpoints(|setpoints| {
        eprintln!("[device] motor 0 setpoint: {}", setpoints[0].set);
    });
    host_motors.on_feedback(|feedback| {
        eprintln!(
            "[host] motor 0 position={} speed={}",
            feedback[0].position, feedback[0].speed
        );
    });

    host_motors.set_mode(0, MotorMode::Speed)?;
    host_motors.set_speed(0, 1200)?;
    eprintln!("[host] sent {} frames", shuttle(&host, &device)?);

    let mut feedback = [MotorFeedback::default(); MAX_MOTORS];
    feedback[0].position = 4096;
    feedback[0].speed = device_motors.setpoints()[0].set;
    device_motors.send_feedback(feedback)?;
    shuttle(&device, &host)?;

    // Empty payload: the device answers with its current setpoint table.
    host_motors.request_setpoints()?;
    shuttle(&host, &device)?;
    shuttle(&device, &host)?;

    eprintln!("[host] echoed setpoint: {}", host_motors.setpoints()[0].set);
    eprintln!("[host] stats: {:?}", host.stats());
    Ok(())
}
