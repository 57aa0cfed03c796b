//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

const TX_HRP: &str = "tx";

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Transaction id stamped on every witness a commit produces
pub fn new_tx_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(TX_HRP)
}
