//! In-process client for hosted modules

mod client;

pub use client::{NativeModuleClient, Services};
