//! Address translation between chains that share Bitcoin's address formats.
//!
//! - Base58Check: the payload is kept, the version byte is swapped for the target chain's.
//! - Segwit (bech32/bech32m): witness version and program are kept, the HRP is swapped.
//!
//! References:
//!
//! - https://en.bitcoin.it/wiki/Base58Check_encoding
//! - https://en.bitcoin.it/wiki/BIP_0173
//! - https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use bech32::{segwit, Hrp};
use bitcoin::base58;
use std::fmt;
use std::str::FromStr;

/// Address version bytes and segwit HRP of one network (mainnet or testnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParams {
    pub p2pkh: u8,
    pub p2sh: u8,
    pub hrp: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    pub name: &'static str,
    pub main: AddressParams,
    pub test: AddressParams,
}

pub const NAMECOIN: ChainParams = ChainParams {
    name: "namecoin",
    main: AddressParams {
        p2pkh: 52,
        p2sh: 13,
        hrp: "nc",
    },
    test: AddressParams {
        p2pkh: 111,
        p2sh: 196,
        hrp: "tn",
    },
};

pub const BITCOIN: ChainParams = ChainParams {
    name: "bitcoin",
    main: AddressParams {
        p2pkh: 0,
        p2sh: 5,
        hrp: "bc",
    },
    test: AddressParams {
        p2pkh: 111,
        p2sh: 196,
        hrp: "tb",
    },
};

impl ChainParams {
    pub const ALL: [ChainParams; 2] = [NAMECOIN, BITCOIN];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|x| x.name.eq_ignore_ascii_case(name))
    }
}

impl FromStr for ChainParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let known = Self::ALL.map(|x| x.name).join(", ");
            format!("unknown chain `{s}` (known: {known})")
        })
    }
}

impl fmt::Display for ChainParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid bech32 for conversion: {address}")]
    Bech32 {
        address: String,
        source: segwit::DecodeError,
    },
    #[error("cannot encode witness program of {address} under HRP `{hrp}`")]
    Bech32Encode {
        address: String,
        hrp: &'static str,
        source: segwit::EncodeError,
    },
    #[error("invalid HRP `{hrp}`")]
    Hrp {
        hrp: &'static str,
        source: bech32::primitives::hrp::Error,
    },
    #[error("unknown base58 version {version} in {address}")]
    UnknownVersion { address: String, version: u8 },
    #[error("empty base58 payload in {address}")]
    Empty { address: String },
    #[error("invalid input for format conversion: {address}")]
    Invalid {
        address: String,
        source: base58::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTranslator {
    from: ChainParams,
    to: ChainParams,
}

impl Default for AddressTranslator {
    fn default() -> Self {
        Self::new(NAMECOIN, BITCOIN)
    }
}

impl AddressTranslator {
    pub fn new(from: ChainParams, to: ChainParams) -> Self {
        Self { from, to }
    }

    pub fn from_chain(&self) -> &ChainParams {
        &self.from
    }

    pub fn to_chain(&self) -> &ChainParams {
        &self.to
    }

    /// Converts an address of the source chain into the target chain's format.
    ///
    /// Segwit addresses are recognized by their `<hrp>1` prefix (case-insensitive); everything
    /// else has to be valid Base58Check with one of the source chain's P2PKH/P2SH versions.
    pub fn translate(&self, address: &str) -> Result<String, AddressError> {
        if has_segwit_prefix(address, self.from.main.hrp) {
            return self.translate_segwit(address, self.to.main.hrp);
        }
        if has_segwit_prefix(address, self.from.test.hrp) {
            return self.translate_segwit(address, self.to.test.hrp);
        }
        self.translate_base58(address)
    }

    fn translate_segwit(
        &self,
        address: &str,
        new_hrp: &'static str,
    ) -> Result<String, AddressError> {
        // the original HRP is discarded; only the witness version and program are carried over
        let (_, witness_version, program) =
            segwit::decode(address).map_err(|source| AddressError::Bech32 {
                address: address.into(),
                source,
            })?;
        let hrp = Hrp::parse(new_hrp).map_err(|source| AddressError::Hrp {
            hrp: new_hrp,
            source,
        })?;
        segwit::encode(hrp, witness_version, &program).map_err(|source| {
            AddressError::Bech32Encode {
                address: address.into(),
                hrp: new_hrp,
                source,
            }
        })
    }

    fn translate_base58(&self, address: &str) -> Result<String, AddressError> {
        let mut data = base58::decode_check(address).map_err(|source| AddressError::Invalid {
            address: address.into(),
            source,
        })?;
        let Some(version) = data.first_mut() else {
            return Err(AddressError::Empty {
                address: address.into(),
            });
        };
        let old = *version;
        *version = self
            .map_version(old)
            .ok_or_else(|| AddressError::UnknownVersion {
                address: address.into(),
                version: old,
            })?;
        Ok(base58::encode_check(&data))
    }

    fn map_version(&self, version: u8) -> Option<u8> {
        let (from, to) = (&self.from, &self.to);
        [
            (from.main.p2pkh, to.main.p2pkh),
            (from.main.p2sh, to.main.p2sh),
            (from.test.p2pkh, to.test.p2pkh),
            (from.test.p2sh, to.test.p2sh),
        ]
        .into_iter()
        .find(|&(old, _)| old == version)
        .map(|(_, new)| new)
    }
}

fn has_segwit_prefix(address: &str, hrp: &str) -> bool {
    let Some((separator, prefix)) = address
        .as_bytes()
        .get(..hrp.len() + 1)
        .and_then(|x| x.split_last())
    else {
        return false;
    };
    *separator == b'1' && prefix.eq_ignore_ascii_case(hrp.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    const GENESIS_HASH160: [u8; 20] = hex!("62e907b15cbf27d5425399ebf6f0fb50ebb88f18");
    const SCRIPT_HASH: [u8; 20] = hex!("748284390f9e263a4b766a75d0633c50426eb875");

    fn translator() -> AddressTranslator {
        AddressTranslator::default()
    }

    fn versioned(version: u8, payload: &[u8]) -> String {
        let mut data = vec![version];
        data.extend_from_slice(payload);
        base58::encode_check(&data)
    }

    #[test]
    fn p2pkh() {
        assert_eq!(
            translator().translate("N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMe").unwrap(),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
    }

    #[test]
    fn p2sh() {
        assert_eq!(
            translator().translate("6R1tY7Ku2ppiBmhYxpjCiAEAPdYrgMZYJn").unwrap(),
            "3CK4fEwbMP7heJarmU4eqA3sMbVJyEnU3V"
        );
    }

    #[test]
    fn base58_payload_kept() {
        let t = translator();
        for (from_version, to_version, payload) in [
            (NAMECOIN.main.p2pkh, BITCOIN.main.p2pkh, GENESIS_HASH160),
            (NAMECOIN.main.p2sh, BITCOIN.main.p2sh, SCRIPT_HASH),
            (NAMECOIN.test.p2pkh, BITCOIN.test.p2pkh, GENESIS_HASH160),
            (NAMECOIN.test.p2sh, BITCOIN.test.p2sh, SCRIPT_HASH),
        ] {
            let converted = t.translate(&versioned(from_version, &payload)).unwrap();
            let decoded = base58::decode_check(&converted).unwrap();
            assert_eq!(decoded[0], to_version);
            assert_eq!(&decoded[1..], &payload);
        }
    }

    #[test]
    fn bech32_v0() {
        let t = translator();
        assert_eq!(
            t.translate("nc1qw508d6qejxtdg4y5r3zarvary0c5xw7kttkktk").unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            t.translate("tn1qw508d6qejxtdg4y5r3zarvary0c5xw7ku7wsq7").unwrap(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
        // upper case input is a valid bech32 string as well
        assert_eq!(
            t.translate("NC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KTTKKTK").unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn bech32m_v1() {
        let converted = translator()
            .translate("nc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqwd67vg")
            .unwrap();
        assert_eq!(
            converted,
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0"
        );
        let (hrp, version, program) = segwit::decode(&converted).unwrap();
        assert_eq!(hrp.to_string(), "bc");
        assert_eq!(version.to_u8(), 1);
        assert_eq!(
            program,
            hex!("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
        );
    }

    #[test]
    fn bad_bech32() {
        // last checksum character changed
        let result = translator().translate("nc1qw508d6qejxtdg4y5r3zarvary0c5xw7kttkktq");
        assert!(matches!(result, Err(AddressError::Bech32 { .. })));
    }

    #[test]
    fn bad_checksum() {
        let result = translator().translate("N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMf");
        assert!(matches!(result, Err(AddressError::Invalid { .. })));
    }

    #[test]
    fn unknown_version() {
        let result = translator().translate("DEA5vGb2NpAwCiCp5yTE16F3DueQUVivQp");
        assert!(matches!(
            result,
            Err(AddressError::UnknownVersion { version: 30, .. })
        ));
        // a Bitcoin address is not a Namecoin address
        assert!(translator()
            .translate("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")
            .is_err());
    }

    #[test]
    fn deterministic() {
        let t = translator();
        let a = t.translate("N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMe").unwrap();
        let b = t.translate("N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMe").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reverse_direction() {
        let t = AddressTranslator::new(BITCOIN, NAMECOIN);
        assert_eq!(
            t.translate("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap(),
            "N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMe"
        );
        assert_eq!(
            t.translate("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap(),
            "nc1qw508d6qejxtdg4y5r3zarvary0c5xw7kttkktk"
        );
    }

    #[test]
    fn chain_names() {
        assert_eq!("Namecoin".parse::<ChainParams>().unwrap(), NAMECOIN);
        assert_eq!(ChainParams::from_name("bitcoin"), Some(BITCOIN));
        assert!("dogecoin".parse::<ChainParams>().is_err());
    }

    #[test]
    fn malformed_input() {
        let t = translator();
        for address in ["", "nc1", "nC1qw508d6qejxtdg4y5r3zarvary0c5xw7kttkktk", "1111"] {
            assert!(t.translate(address).is_err(), "{address:?}");
        }
    }

    #[test]
    fn invalid_target_hrp() {
        let mut target = BITCOIN;
        target.main.hrp = "b c";
        let result = AddressTranslator::new(NAMECOIN, target)
            .translate("nc1qw508d6qejxtdg4y5r3zarvary0c5xw7kttkktk");
        assert!(matches!(result, Err(AddressError::Hrp { hrp: "b c", .. })));
    }

    #[test]
    fn segwit_prefix() {
        assert!(has_segwit_prefix("nc1q", "nc"));
        assert!(has_segwit_prefix("NC1Q", "nc"));
        assert!(!has_segwit_prefix("nc", "nc"));
        assert!(!has_segwit_prefix("ncq1", "nc"));
        assert!(!has_segwit_prefix("ñc1", "nc"));
    }
}
