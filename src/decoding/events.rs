use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use thiserror::Error;

use crate::contract::abi::AuctionHouse;
use crate::types::auction::{TipRecord, WinnerRecord};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected {event} log, found topic0 {found:?}")]
    UnexpectedTopic {
        event: &'static str,
        found: Option<B256>,
    },

    #[error("{event} log is missing {field}")]
    MissingMetadata {
        event: &'static str,
        field: &'static str,
    },

    #[error("failed to decode {event} log in tx {tx_hash}: {message}")]
    Abi {
        event: &'static str,
        tx_hash: B256,
        message: String,
    },

    #[error("{event} log in tx {tx_hash} carries auction id {value} which does not fit in 64 bits")]
    AuctionIdOutOfRange {
        event: &'static str,
        tx_hash: B256,
        value: U256,
    },
}

impl DecodeError {
    /// Skippable errors describe logs that are not (yet) ours to apply. Anything
    /// else means the payload doesn't match the contract ABI.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            DecodeError::UnexpectedTopic { .. } | DecodeError::MissingMetadata { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerEvent {
    pub auction_id: u64,
    pub winner: Address,
    pub winning_bid: U256,
    pub text: String,
    pub image_cid: Option<String>,
    pub voice_cid: Option<String>,
    pub block_number: u64,
    pub tx_hash: B256,
    pub block_timestamp: Option<u64>,
}

impl WinnerEvent {
    /// The zero address marks a round that settled without bids.
    pub fn has_winner(&self) -> bool {
        self.winner != Address::ZERO
    }

    pub fn into_record(self, chain_id: u64, created_at: u64) -> WinnerRecord {
        WinnerRecord {
            chain_id,
            auction_id: self.auction_id,
            winner: self.winner,
            winning_bid: self.winning_bid,
            text: self.text,
            image_cid: self.image_cid,
            voice_cid: self.voice_cid,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            tips_received: U256::ZERO,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipEvent {
    pub auction_id: u64,
    pub tipper: Address,
    pub amount: U256,
    pub block_number: u64,
    pub tx_hash: B256,
}

impl TipEvent {
    pub fn into_record(self, chain_id: u64) -> TipRecord {
        TipRecord {
            chain_id,
            auction_id: self.auction_id,
            tipper: self.tipper,
            amount: self.amount,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
        }
    }
}

fn check_topic0(log: &Log, event: &'static str, expected: B256) -> Result<(), DecodeError> {
    let found = log.topics().first().copied();
    if found != Some(expected) {
        return Err(DecodeError::UnexpectedTopic { event, found });
    }
    Ok(())
}

fn log_position(log: &Log, event: &'static str) -> Result<(u64, B256), DecodeError> {
    let block_number = log.block_number.ok_or(DecodeError::MissingMetadata {
        event,
        field: "block_number",
    })?;
    let tx_hash = log.transaction_hash.ok_or(DecodeError::MissingMetadata {
        event,
        field: "transaction_hash",
    })?;
    Ok((block_number, tx_hash))
}

fn auction_id(value: U256, event: &'static str, tx_hash: B256) -> Result<u64, DecodeError> {
    u64::try_from(value).map_err(|_| DecodeError::AuctionIdOutOfRange {
        event,
        tx_hash,
        value,
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl TryFrom<&Log> for WinnerEvent {
    type Error = DecodeError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        const EVENT: &str = "NewWinner";

        check_topic0(log, EVENT, AuctionHouse::NewWinner::SIGNATURE_HASH)?;
        let (block_number, tx_hash) = log_position(log, EVENT)?;

        let decoded =
            AuctionHouse::NewWinner::decode_log(&log.inner).map_err(|e| DecodeError::Abi {
                event: EVENT,
                tx_hash,
                message: e.to_string(),
            })?;
        let event = decoded.data;

        Ok(WinnerEvent {
            auction_id: auction_id(event.auctionId, EVENT, tx_hash)?,
            winner: event.winner,
            winning_bid: event.winningBid,
            text: event.text,
            image_cid: non_empty(event.imageCid),
            voice_cid: non_empty(event.voiceCid),
            block_number,
            tx_hash,
            block_timestamp: log.block_timestamp,
        })
    }
}

impl TryFrom<&Log> for TipEvent {
    type Error = DecodeError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        const EVENT: &str = "PostTipped";

        check_topic0(log, EVENT, AuctionHouse::PostTipped::SIGNATURE_HASH)?;
        let (block_number, tx_hash) = log_position(log, EVENT)?;

        let decoded =
            AuctionHouse::PostTipped::decode_log(&log.inner).map_err(|e| DecodeError::Abi {
                event: EVENT,
                tx_hash,
                message: e.to_string(),
            })?;
        let event = decoded.data;

        Ok(TipEvent {
            auction_id: auction_id(event.auctionId, EVENT, tx_hash)?,
            tipper: event.tipper,
            amount: event.amount,
            block_number,
            tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Bytes, LogData};

    use super::*;
    use crate::contract::mock::{tip_log, winner_log};

    const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");
    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    #[test]
    fn test_decode_winner_event() {
        let log = winner_log(CONTRACT, 12, B256::repeat_byte(1), ALICE, 7, 500, "gm", "bafy-image", "");
        let event = WinnerEvent::try_from(&log).unwrap();

        assert_eq!(event.auction_id, 7);
        assert_eq!(event.winner, ALICE);
        assert_eq!(event.winning_bid, U256::from(500));
        assert_eq!(event.text, "gm");
        assert_eq!(event.image_cid.as_deref(), Some("bafy-image"));
        assert_eq!(event.voice_cid, None);
        assert_eq!(event.block_number, 12);
        assert_eq!(event.tx_hash, B256::repeat_byte(1));
        assert!(event.has_winner());
    }

    #[test]
    fn test_zero_winner_is_not_a_winner() {
        let log = winner_log(CONTRACT, 12, B256::repeat_byte(1), Address::ZERO, 7, 0, "", "", "");
        let event = WinnerEvent::try_from(&log).unwrap();
        assert!(!event.has_winner());
    }

    #[test]
    fn test_decode_tip_event() {
        let log = tip_log(CONTRACT, 20, B256::repeat_byte(2), 7, ALICE, 42);
        let event = TipEvent::try_from(&log).unwrap();

        assert_eq!(event.auction_id, 7);
        assert_eq!(event.tipper, ALICE);
        assert_eq!(event.amount, U256::from(42));
        assert_eq!(event.block_number, 20);
    }

    #[test]
    fn test_tip_log_is_not_a_winner_log() {
        let log = tip_log(CONTRACT, 20, B256::repeat_byte(2), 7, ALICE, 42);
        let err = WinnerEvent::try_from(&log).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedTopic { .. }));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_pending_log_is_skippable() {
        let mut log = tip_log(CONTRACT, 20, B256::repeat_byte(2), 7, ALICE, 42);
        log.block_number = None;
        let err = TipEvent::try_from(&log).unwrap_err();
        assert!(matches!(err, DecodeError::MissingMetadata { field: "block_number", .. }));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_truncated_payload_fails_closed() {
        let mut log = winner_log(CONTRACT, 12, B256::repeat_byte(1), ALICE, 7, 500, "gm", "", "");
        let topics = log.inner.data.topics().to_vec();
        log.inner.data = LogData::new_unchecked(topics, Bytes::from(vec![0u8; 16]));

        let err = WinnerEvent::try_from(&log).unwrap_err();
        assert!(matches!(err, DecodeError::Abi { .. }));
        assert!(!err.is_skippable());
    }

    #[test]
    fn test_oversized_auction_id_fails_closed() {
        let log = crate::contract::mock::tip_log_raw(
            CONTRACT,
            20,
            B256::repeat_byte(3),
            U256::from(u64::MAX) + U256::from(1),
            ALICE,
            U256::from(1),
        );
        let err = TipEvent::try_from(&log).unwrap_err();
        assert!(matches!(err, DecodeError::AuctionIdOutOfRange { .. }));
        assert!(!err.is_skippable());
    }
}
