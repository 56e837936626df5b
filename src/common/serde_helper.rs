//! String-keyed deserializers for the hex-encoded fixture format.

use serde::{Deserialize, Deserializer};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hex::FromHex;

fn strip_pref(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

pub fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_str_radix(strip_pref(s), 16).map_err(|e| e.to_string())
}

/// Fixture addresses may be shorter than 20 bytes; the value is the low
/// 160 bits of the hex number.
pub fn parse_address(s: &str) -> Result<Address, String> {
    parse_u256(s).map(crate::word::to_address)
}

pub fn parse_h256(s: &str) -> Result<H256, String> {
    parse_u256(s).map(|v| H256(v.to_big_endian()))
}

pub fn parse_u64(s: &str) -> Result<u64, String> {
    if let Some(digits) = s.strip_prefix("0x") {
        u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
    } else {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

pub fn parse_bytes(s: &str) -> Result<Bytes, String> {
    if s.is_empty() {
        return Ok(Bytes::new());
    }
    Vec::<u8>::from_hex(strip_pref(s))
        .map(Bytes::from)
        .map_err(|e| e.to_string())
}

macro_rules! de_from_str {
    ($name:ident, $target:ty, $parser:expr) => {
        pub fn $name<'de, D>(d: D) -> Result<$target, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: String = Deserialize::deserialize(d)?;
            $parser(&s).map_err(serde::de::Error::custom)
        }
    };
}

macro_rules! de_opt_from_str {
    ($name:ident, $target:ty, $parser:expr) => {
        pub fn $name<'de, D>(d: D) -> Result<Option<$target>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt: Option<String> = Option::deserialize(d)?;
            match opt.as_deref() {
                None | Some("") => Ok(None),
                Some(s) => $parser(s).map(Some).map_err(serde::de::Error::custom),
            }
        }
    };
}

de_from_str!(de_u256, U256, parse_u256);
de_from_str!(de_addr, Address, parse_address);
de_from_str!(de_u64, u64, parse_u64);
de_from_str!(de_bytes, Bytes, parse_bytes);

de_opt_from_str!(de_opt_u256, U256, parse_u256);
de_opt_from_str!(de_opt_addr, Address, parse_address);
de_opt_from_str!(de_opt_u64, u64, parse_u64);
de_opt_from_str!(de_opt_bytes, Bytes, parse_bytes);

pub fn de_vec_u256<'de, D>(d: D) -> Result<Vec<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Vec<String> = Deserialize::deserialize(d)?;
    v.iter()
        .map(|s| parse_u256(s).map_err(serde::de::Error::custom))
        .collect()
}

pub fn de_opt_vec_u256<'de, D>(d: D) -> Result<Option<Vec<U256>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<String>> = Option::deserialize(d)?;
    match opt {
        None => Ok(None),
        Some(list) => list
            .iter()
            .map(|s| parse_u256(s).map_err(serde::de::Error::custom))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
    }
}

pub fn de_vec_h256<'de, D>(d: D) -> Result<Vec<H256>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Vec<String> = Deserialize::deserialize(d)?;
    v.iter()
        .map(|s| parse_h256(s).map_err(serde::de::Error::custom))
        .collect()
}
