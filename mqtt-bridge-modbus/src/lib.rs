//! MQTT bridge for Modbus water-treatment instruments.
//!
//! This bridge polls analog process values (COD, TSS, pH, temperature) from
//! Modbus TCP sensor transmitters and republishes them as JSON telemetry
//! over MQTT, one poller per configured site.
//!
//! # Payload
//!
//! One JSON object per site per cycle, published to `wwtp/<site>/data`:
//!
//! ```text
//! {"cod": 45.3, "tss": 12.75, "timestamp": "2024-06-01T10:15:00"}
//! ```
//!
//! Field names and register addresses come from the site profile in the
//! configuration file; a field whose registers cannot be read is published
//! as `null`.

pub mod config;
pub mod decode;
pub mod link;
pub mod poller;
pub mod publisher;
