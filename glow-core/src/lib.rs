#![no_std]

// Preheat timing logic shared by the glow-plug firmware and host tooling.
//
// Everything here stays free of the standard library and of any concrete MCU
// so the same state machine drives the STM32 firmware and the host emulator.
// Peripherals are reached only through the traits in `hal`.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod crank;
pub mod hal;
pub mod heartbeat;
pub mod machine;
pub mod sampler;
pub mod shared;
pub mod sim;
pub mod telemetry;
