//! Hash-chained receipts of committed world state writes
use super::state::StateError;
use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// One committed write to one key. `previous` is the hash of the witness before it,
/// `None` only for the first write of a key.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Witness {
    #[n(0)]
    pub key: String,
    #[n(1)]
    pub sequence: u64,
    #[n(2)]
    pub tx_id: String, // bech32 encoded uuid7
    #[n(3)]
    pub submitter: String,
    #[n(4)]
    pub timestamp: TimeStamp<Utc>,
    #[n(5)]
    pub value_hash: String, // sha256 of the value written
    #[n(6)]
    pub previous: Option<String>,
}

/// Latest sequence and hash for a key, kept so appends don't rescan the chain.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct WitnessHead {
    #[n(0)]
    pub sequence: u64,
    #[n(1)]
    pub hash: String,
}

impl Witness {
    /// Witness for a write that follows `head` (or the first write when there is none).
    pub fn next(
        head: Option<&WitnessHead>,
        key: &str,
        tx_id: &str,
        submitter: &str,
        timestamp: TimeStamp<Utc>,
        value: &[u8],
    ) -> Self {
        Self {
            key: key.to_string(),
            sequence: head.map_or(0, |h| h.sequence + 1),
            tx_id: tx_id.to_string(),
            submitter: submitter.to_string(),
            timestamp,
            value_hash: sha256::digest(value),
            previous: head.map(|h| h.hash.clone()),
        }
    }

    /// Encodes the witness, returning its hash and its cbor bytes
    pub fn build(&self) -> Result<(String, Vec<u8>), StateError> {
        let cbor = minicbor::to_vec(self).map_err(|e| StateError::Codec(e.to_string()))?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        minicbor::decode(bytes).map_err(|e| StateError::Codec(e.to_string()))
    }

    pub fn witnesses(&self, value: &[u8]) -> bool {
        self.value_hash == sha256::digest(value)
    }
}

impl WitnessHead {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        minicbor::to_vec(self).map_err(|e| StateError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        minicbor::decode(bytes).map_err(|e| StateError::Codec(e.to_string()))
    }
}

/// Walk a key's witnesses in order, checking sequence numbers and hash links.
/// Returns the head of a sound chain.
pub fn verify_chain(key: &str, witnesses: &[Witness]) -> Result<Option<WitnessHead>, StateError> {
    let mut head: Option<WitnessHead> = None;

    for witness in witnesses {
        let expected_sequence = head.as_ref().map_or(0, |h| h.sequence + 1);
        let expected_previous = head.as_ref().map(|h| h.hash.as_str());

        if witness.key != key
            || witness.sequence != expected_sequence
            || witness.previous.as_deref() != expected_previous
        {
            return Err(StateError::Tampered {
                key: key.to_string(),
                sequence: witness.sequence,
            });
        }

        let (hash, _) = witness.build()?;
        head = Some(WitnessHead {
            sequence: witness.sequence,
            hash,
        });
    }

    Ok(head)
}
