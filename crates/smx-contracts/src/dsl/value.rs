//! Runtime values for the contract DSL (spec §9's "embed a sandboxed
//! interpreter" option, SPEC_FULL §6).

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Decimal(Decimal),
    Str(String),
    Bool(bool),
    Array(Vec<Value>),
    /// Tuple returned by `execute`, rendered as a JSON array in the result
    /// string (spec §8 scenarios S1/S2 expect tuple-shaped results).
    Tuple(Vec<Value>),
    Unit,
}

impl Value {
    /// `Unit` (an unset state field) reads as zero in numeric context, so
    /// the common `state.set(k, state.get(k) + 1)` counter pattern works
    /// against a freshly initialized field without a separate "has this key
    /// ever been set" check.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Unit => Some(Decimal::ZERO),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) | Value::Tuple(a) => !a.is_empty(),
            Value::Unit => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Array(a) | Value::Tuple(a) => {
                serde_json::Value::Array(a.iter().map(Value::to_json).collect())
            }
            Value::Unit => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(a) | Value::Tuple(a) => {
                write!(f, "[{}]", a.iter().map(Value::to_string).collect::<Vec<_>>().join(", "))
            }
            Value::Unit => write!(f, "unit"),
        }
    }
}

/// The contract's persisted state: a flat string-keyed map of values,
/// serialized through the codec as `newState` (spec §3, §4.5).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ContractState {
    pub fields: BTreeMap<String, serde_json::Value>,
    /// The contract's own Authenticated User Table: `Address -> base64(SHA-256(key))`
    /// (spec §3, §8 scenario S6).
    pub users: BTreeMap<String, String>,
    /// Token-style balance ledger, the built-in analogue of the `token`
    /// capability bundle (spec §9's composition-over-inheritance design
    /// note, SPEC_FULL §6).
    pub balances: BTreeMap<String, Decimal>,
}

impl ContractState {
    pub fn balance_of(&self, address: &str) -> Decimal {
        *self.balances.get(address).unwrap_or(&Decimal::ZERO)
    }

    pub fn credit(&mut self, address: &str, amount: Decimal) {
        *self.balances.entry(address.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    /// Debits `amount` from `address`. Returns `false` (leaving the ledger
    /// untouched) if the balance would go negative, the same shape as the
    /// chain engine's `InsufficientBalance` rejection (spec §4.3).
    pub fn debit(&mut self, address: &str, amount: Decimal) -> bool {
        let current = self.balance_of(address);
        if amount > current {
            return false;
        }
        self.balances.insert(address.to_string(), current - amount);
        true
    }

    /// Registers `address` with the hash of `raw_key`. Returns `false` if
    /// already registered (spec §8 scenario S6: first call succeeds,
    /// repeats fail and the originally stored hash is kept).
    pub fn register_user(&mut self, address: &str, raw_key: &str) -> bool {
        if self.users.contains_key(address) {
            return false;
        }
        self.users.insert(address.to_string(), smx_crypto::hash_key(raw_key));
        true
    }

    pub fn authenticate_user(&self, address: &str, raw_key: &str) -> bool {
        match self.users.get(address) {
            Some(stored) => *stored == smx_crypto::hash_key(raw_key),
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Value {
        match self.fields.get(key) {
            Some(serde_json::Value::Number(n)) if n.is_i64() => {
                Value::Int(n.as_i64().unwrap())
            }
            Some(serde_json::Value::String(s)) => {
                if let Ok(d) = s.parse::<Decimal>() {
                    if s.chars().next().map(|c| c.is_ascii_digit() || c == '-').unwrap_or(false) {
                        return Value::Decimal(d);
                    }
                }
                Value::Str(s.clone())
            }
            Some(serde_json::Value::Bool(b)) => Value::Bool(*b),
            Some(serde_json::Value::Array(a)) => {
                Value::Array(a.iter().map(json_to_value).collect())
            }
            _ => Value::Unit,
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value.to_json());
    }
}

fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Number(n) if n.is_i64() => Value::Int(n.as_i64().unwrap()),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Array(a) => Value::Array(a.iter().map(json_to_value).collect()),
        _ => Value::Unit,
    }
}
