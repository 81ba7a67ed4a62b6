//! Records written to a run directory.

use crate::config::OdeConfig;
use crate::graph::ContactGraph;
use crate::network::{History, NetworkParams};
use crate::sirv::Trajectory;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Output of one network simulation.
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Seed the run's random stream was created from.
    pub seed: u64,

    pub params: NetworkParams,

    pub graph: ContactGraph,

    /// One snapshot per step, including step 0.
    pub history: History,
}

/// Output of one compartmental model integration.
#[derive(Debug, Serialize, Deserialize)]
pub struct OdeRecord {
    pub config: OdeConfig,

    pub trajectory: Trajectory,

    /// Failure message if integration stopped before the horizon.
    pub failure: Option<String>,
}

/// Serialize `value` to a MessagePack file.
pub fn write_msgpack<T: Serialize, P: AsRef<Path>>(value: &T, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Deserialize a value from a MessagePack file.
pub fn read_msgpack<T: DeserializeOwned, P: AsRef<Path>>(file: P) -> Result<T> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let value = decode::from_read(&mut reader).context("failed to deserialize value")?;
    Ok(value)
}
