//! Fuzz target for robot file parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use robokit_core::config::RobotConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(robot) = RobotConfig::parse(text) {
        for service in &robot.services {
            let _ = service.vision_attributes();
        }
    }
});
