//! Transaction data model and per-type admission rules (spec §3, §4.3).

use crate::address::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    NativeTransfer,
    MinerReward,
    ContractCode,
    ContractState,
    Gas,
    ValidatorReward,
    Data,
}

impl TransactionType {
    /// Rewards are protocol-originated credits: only the system address may
    /// send them, and they never debit the sender (spec §3, §8 invariant 3).
    pub fn is_reward(self) -> bool {
        matches!(self, TransactionType::MinerReward | TransactionType::ValidatorReward)
    }

    /// Contract bookkeeping transactions carry no value and do not touch
    /// balances at all (spec §4.3: "ContractCode/ContractState do not touch
    /// balances"). `Data` is treated the same way: it carries opaque
    /// payload, not value (documented as an open-question resolution in
    /// DESIGN.md).
    pub fn touches_balance(self) -> bool {
        !matches!(
            self,
            TransactionType::ContractCode | TransactionType::ContractState | TransactionType::Data
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub sender: Address,
    pub recipient: Address,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "data_as_base64")]
    pub data: Vec<u8>,
    pub info: String,
    pub gas: Decimal,
}

mod data_as_base64 {
    use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        B64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    InvalidAddress,
    InvalidAmount,
    NotAuthenticated,
    InsufficientBalance,
    SelfTransfer,
}

impl std::fmt::Display for TxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxError::InvalidAddress => "InvalidAddress",
            TxError::InvalidAmount => "InvalidAmount",
            TxError::NotAuthenticated => "NotAuthenticated",
            TxError::InsufficientBalance => "InsufficientBalance",
            TxError::SelfTransfer => "SelfTransfer",
        };
        write!(f, "{s}")
    }
}

impl std::error::Error for TxError {}

impl Transaction {
    pub fn new(
        kind: TransactionType,
        sender: Address,
        recipient: Address,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        data: Vec<u8>,
        info: impl Into<String>,
        gas: Decimal,
    ) -> Self {
        Transaction {
            kind,
            sender,
            recipient,
            amount,
            timestamp,
            data,
            info: info.into(),
            gas,
        }
    }

    /// Type-specific precondition against a balance lookup, independent of
    /// pool/chain position (spec §4.3's "per-type validator").
    pub fn validate(&self, balance_of: impl Fn(&Address) -> Decimal) -> Result<(), TxError> {
        if self.amount.is_sign_negative() || self.gas.is_sign_negative() {
            return Err(TxError::InvalidAmount);
        }
        if self.kind.is_reward() {
            if !self.sender.is_system() {
                return Err(TxError::NotAuthenticated);
            }
            return Ok(());
        }
        if self.sender == self.recipient {
            return Err(TxError::SelfTransfer);
        }
        if self.kind.touches_balance() && self.amount > balance_of(&self.sender) {
            return Err(TxError::InsufficientBalance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn addr(suffix: char) -> Address {
        Address::parse(format!("smartX{}", suffix.to_string().repeat(40))).unwrap()
    }

    #[test]
    fn self_transfer_is_rejected_for_non_reward() {
        let a = addr('a');
        let tx = Transaction::new(
            TransactionType::NativeTransfer,
            a.clone(),
            a,
            Decimal::from_str("1").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        assert_eq!(tx.validate(|_| Decimal::from_str("10").unwrap()), Err(TxError::SelfTransfer));
    }

    #[test]
    fn insufficient_balance_is_rejected() {
        let tx = Transaction::new(
            TransactionType::NativeTransfer,
            addr('a'),
            addr('b'),
            Decimal::from_str("100").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        assert_eq!(
            tx.validate(|_| Decimal::from_str("10").unwrap()),
            Err(TxError::InsufficientBalance)
        );
    }

    #[test]
    fn reward_from_non_system_sender_is_rejected() {
        let tx = Transaction::new(
            TransactionType::MinerReward,
            addr('a'),
            addr('b'),
            Decimal::from_str("5").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        assert_eq!(tx.validate(|_| Decimal::ZERO), Err(TxError::NotAuthenticated));
    }

    #[test]
    fn reward_from_system_sender_is_accepted_regardless_of_balance() {
        let tx = Transaction::new(
            TransactionType::MinerReward,
            Address::system(),
            addr('b'),
            Decimal::from_str("5").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        assert_eq!(tx.validate(|_| Decimal::ZERO), Ok(()));
    }

    #[test]
    fn contract_code_tx_skips_balance_check() {
        let tx = Transaction::new(
            TransactionType::ContractCode,
            addr('a'),
            Address::system(),
            Decimal::ZERO,
            Utc::now(),
            vec![1, 2, 3],
            "deploy",
            Decimal::ZERO,
        );
        assert_eq!(tx.validate(|_| Decimal::ZERO), Ok(()));
    }
}
