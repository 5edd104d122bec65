//! Prints keystrokes and connected controller states as JSON lines.

use netpad_lib::{NetPadError, SlotSelector, MAX_SLOTS};
use std::time::{Duration, Instant};

const STATE_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> netpad_lib::Result<()> {
    env_logger::init();

    netpad_lib::enable(true);
    match netpad_lib::hal().peer() {
        Some(peer) => log::info!("Monitoring input server {}", peer),
        None => log::error!("No session with the input server"),
    }

    let mut last_dump = Instant::now();
    loop {
        while let Some(event) = netpad_lib::get_keystroke(SlotSelector::Any)? {
            println!("{}", serde_json::json!({ "keystroke": event }));
        }

        if last_dump.elapsed() >= STATE_INTERVAL {
            last_dump = Instant::now();
            for index in 0..MAX_SLOTS as u32 {
                match netpad_lib::get_state_ex(index) {
                    Ok(state) => println!(
                        "{}",
                        serde_json::json!({
                            "slot": netpad_lib::slot_status(index)?,
                            "state": state,
                        })
                    ),
                    Err(NetPadError::NotConnected(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}
