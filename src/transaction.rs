//! Transactions, their wire format, and signing
//!
//! A [`Transaction`] spends outputs of earlier transactions. Those outputs are
//! not part of the transaction itself, so fee calculation, signature hashing
//! and verification resolve them through a [`TransactionStore`].

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::codec::{encode_varint, hash256, read_array, read_u32_le, read_u64_le, read_varint};
use crate::constants::*;
use crate::error::{PrimitiveError, Result};
use crate::keys::PrivateKey;
use crate::script::{Command, Script};
use crate::types::{Hash, Network};

/// Source of previously confirmed transactions
pub trait TransactionStore {
    /// Look up a transaction by its id (display byte order)
    fn fetch(&self, tx_id: &Hash, network: Network) -> Result<Transaction>;
}

/// A [`TransactionStore`] held in memory, keyed by network and id
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    transactions: HashMap<(Network, Hash), Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a transaction under its own id, which is returned
    pub fn insert(&mut self, tx: Transaction) -> Result<Hash> {
        let id = tx.hash()?;
        self.transactions.insert((tx.network, id), tx);
        Ok(id)
    }

    /// Parse a raw transaction and store it
    pub fn insert_raw(&mut self, raw: &[u8], network: Network) -> Result<Hash> {
        let tx = Transaction::parse(&mut Cursor::new(raw), network)?;
        self.insert(tx)
    }

    pub fn contains(&self, tx_id: &Hash, network: Network) -> bool {
        self.transactions.contains_key(&(network, *tx_id))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for MemoryStore {
    fn fetch(&self, tx_id: &Hash, network: Network) -> Result<Transaction> {
        match self.transactions.get(&(network, *tx_id)) {
            Some(tx) => Ok(tx.clone()),
            None => {
                warn!("transaction {} not found on {}", hex::encode(tx_id), network);
                Err(PrimitiveError::NotFound(hex::encode(tx_id)))
            }
        }
    }
}

/// Reference to a previous output plus the script unlocking it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIn {
    /// Id of the transaction being spent, in display byte order
    pub prev_tx: Hash,
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// Input with an empty unlocking script and a final sequence number
    pub fn new(prev_tx: Hash, prev_index: u32) -> Self {
        Self {
            prev_tx,
            prev_index,
            script_sig: Script::default(),
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut prev_tx: Hash = read_array(reader)?;
        prev_tx.reverse();
        Ok(Self {
            prev_tx,
            prev_index: read_u32_le(reader)?,
            script_sig: Script::parse(reader)?,
            sequence: read_u32_le(reader)?,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        result.extend(self.prev_tx.iter().rev());
        result.extend_from_slice(&self.prev_index.to_le_bytes());
        result.extend(self.script_sig.serialize()?);
        result.extend_from_slice(&self.sequence.to_le_bytes());
        Ok(result)
    }

    /// The output this input spends
    pub fn prev_output<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        network: Network,
    ) -> Result<TxOut> {
        let prev = store.fetch(&self.prev_tx, network)?;
        let len = prev.outputs.len();
        prev.outputs
            .into_iter()
            .nth(self.prev_index as usize)
            .ok_or_else(|| PrimitiveError::OutputIndex {
                tx_id: hex::encode(self.prev_tx),
                index: self.prev_index,
                len,
            })
    }

    /// Amount of the output being spent
    pub fn value<S: TransactionStore + ?Sized>(&self, store: &S, network: Network) -> Result<u64> {
        Ok(self.prev_output(store, network)?.amount)
    }

    /// Locking script of the output being spent
    pub fn script_pubkey<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        network: Network,
    ) -> Result<Script> {
        Ok(self.prev_output(store, network)?.script_pubkey)
    }
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.prev_tx), self.prev_index)
    }
}

/// Amount locked by a script
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            amount: read_u64_le(reader)?,
            script_pubkey: Script::parse(reader)?,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = self.amount.to_le_bytes().to_vec();
        result.extend(self.script_pubkey.serialize()?);
        Ok(result)
    }
}

impl fmt::Display for TxOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.amount, self.script_pubkey)
    }
}

/// A transaction together with the network it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub network: Network,
}

impl Transaction {
    pub fn new(
        version: u32,
        inputs: Vec<TxIn>,
        outputs: Vec<TxOut>,
        lock_time: u32,
        network: Network,
    ) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
            network,
        }
    }

    /// Parse the wire encoding
    ///
    /// `serialize` gives back the same bytes when every script push is
    /// minimally encoded; otherwise the pushes are rewritten minimally and
    /// the id changes with them.
    pub fn parse<R: Read + ?Sized>(reader: &mut R, network: Network) -> Result<Self> {
        let version = read_u32_le(reader)?;

        let num_inputs = read_varint(reader)?;
        let mut inputs = Vec::new();
        for _ in 0..num_inputs {
            inputs.push(TxIn::parse(reader)?);
        }

        let num_outputs = read_varint(reader)?;
        let mut outputs = Vec::new();
        for _ in 0..num_outputs {
            outputs.push(TxOut::parse(reader)?);
        }

        let lock_time = read_u32_le(reader)?;
        Ok(Self::new(version, inputs, outputs, lock_time, network))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.serialize_with_scripts(|_, tx_in| Ok(tx_in.script_sig.clone()))
    }

    /// Serialize, substituting each input's unlocking script
    fn serialize_with_scripts<F>(&self, mut script_for: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize, &TxIn) -> Result<Script>,
    {
        let mut result = self.version.to_le_bytes().to_vec();
        result.extend(encode_varint(self.inputs.len() as u64));
        for (i, tx_in) in self.inputs.iter().enumerate() {
            let tx_in = TxIn {
                script_sig: script_for(i, tx_in)?,
                ..tx_in.clone()
            };
            result.extend(tx_in.serialize()?);
        }
        result.extend(encode_varint(self.outputs.len() as u64));
        for tx_out in &self.outputs {
            result.extend(tx_out.serialize()?);
        }
        result.extend_from_slice(&self.lock_time.to_le_bytes());
        Ok(result)
    }

    /// hash256 of the serialization, in display byte order
    pub fn hash(&self) -> Result<Hash> {
        let mut hash = hash256(&self.serialize()?);
        hash.reverse();
        Ok(hash)
    }

    /// Hex of [`Transaction::hash`]
    pub fn id(&self) -> Result<String> {
        Ok(hex::encode(self.hash()?))
    }

    /// Input value minus output value; negative when outputs overspend
    pub fn fee<S: TransactionStore + ?Sized>(&self, store: &S) -> Result<i64> {
        let mut total: i128 = 0;
        for tx_in in &self.inputs {
            total += i128::from(tx_in.value(store, self.network)?);
        }
        for tx_out in &self.outputs {
            total -= i128::from(tx_out.amount);
        }
        Ok(total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// SIGHASH_ALL signature hash for input `index`
    ///
    /// The signed input carries the spent output's locking script, or
    /// `redeem_script` when spending a P2SH output; every other input is
    /// serialized with an empty script.
    pub fn sig_hash<S: TransactionStore + ?Sized>(
        &self,
        index: usize,
        store: &S,
        redeem_script: Option<&Script>,
    ) -> Result<BigUint> {
        self.check_index(index)?;
        let mut modified = self.serialize_with_scripts(|i, tx_in| {
            if i != index {
                return Ok(Script::default());
            }
            match redeem_script {
                Some(redeem) => Ok(redeem.clone()),
                None => tx_in.script_pubkey(store, self.network),
            }
        })?;
        modified.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        Ok(BigUint::from_bytes_be(&hash256(&modified)))
    }

    /// Run input `index`'s unlocking script against the output it spends
    pub fn verify_input<S: TransactionStore + ?Sized>(&self, index: usize, store: &S) -> Result<bool> {
        self.check_index(index)?;
        let tx_in = &self.inputs[index];
        let script_pubkey = tx_in.script_pubkey(store, self.network)?;

        let redeem_script = if script_pubkey.is_p2sh_script_pubkey() {
            let Some(Command::Data(raw)) = tx_in.script_sig.cmds().last() else {
                debug!(input = index, "P2SH input without a redeem script");
                return Ok(false);
            };
            match Script::parse_raw(raw) {
                Ok(script) => Some(script),
                Err(e) => {
                    debug!(input = index, "bad redeem script: {}", e);
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let z = self.sig_hash(index, store, redeem_script.as_ref())?;
        let result = tx_in.script_sig.combine(&script_pubkey).evaluate(&z);
        debug!(input = index, valid = result.is_valid(), "verified input");
        Ok(result.is_valid())
    }

    /// Non-negative fee and every input valid
    pub fn verify<S: TransactionStore + ?Sized>(&self, store: &S) -> Result<bool> {
        if self.fee(store)? < 0 {
            debug!("outputs exceed inputs");
            return Ok(false);
        }
        for index in 0..self.inputs.len() {
            if !self.verify_input(index, store)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign a P2PKH input with `key` and check the result
    pub fn sign_input<S: TransactionStore + ?Sized>(
        &mut self,
        index: usize,
        key: &PrivateKey,
        store: &S,
    ) -> Result<bool> {
        let z = self.sig_hash(index, store, None)?;
        let mut sig = key.sign(&z)?.der();
        sig.push(SIGHASH_ALL as u8);
        let sec = key.public_key().sec(true);
        self.inputs[index].script_sig = Script::new(vec![Command::Data(sig), Command::Data(sec)]);
        self.verify_input(index, store)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.inputs.len() {
            return Err(PrimitiveError::InputIndex {
                index,
                len: self.inputs.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id().unwrap_or_else(|_| "<unserializable>".to_string());
        writeln!(f, "tx: {}", id)?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "tx_ins:")?;
        for tx_in in &self.inputs {
            writeln!(f, "{}", tx_in)?;
        }
        writeln!(f, "tx_outs:")?;
        for tx_out in &self.outputs {
            writeln!(f, "{}", tx_out)?;
        }
        write!(f, "locktime: {}", self.lock_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hash160;
    use crate::script::p2pkh_script;

    const BOOK_TX_HEX: &str = "0100000001813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000006b\
                               483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a98\
                               6d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545\
                               de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278afeffffff02a135ef01000000001976a914bc3b\
                               654dca7e56b04dca18f2566cdaf02e8d9ada88ac99c39800000000001976a9141c4bc762dd5423e33216\
                               6702cb75f40df79fea1288ac19430600";

    fn book_tx() -> Transaction {
        let raw = hex::decode(BOOK_TX_HEX).unwrap();
        Transaction::parse(&mut Cursor::new(raw), Network::Mainnet).unwrap()
    }

    fn hash(hex_str: &str) -> Hash {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_parse_version_and_locktime() {
        let tx = book_tx();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.lock_time, 410393);
    }

    #[test]
    fn test_parse_inputs() {
        let tx = book_tx();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(
            tx.inputs[0].prev_tx,
            hash("d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81")
        );
        assert_eq!(tx.inputs[0].prev_index, 0);
        assert_eq!(tx.inputs[0].sequence, 0xfffffffe);
        assert_eq!(
            hex::encode(tx.inputs[0].script_sig.serialize().unwrap()),
            "6b483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a98\
             6d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545\
             de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278a"
        );
    }

    #[test]
    fn test_parse_outputs() {
        let tx = book_tx();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].amount, 32454049);
        assert_eq!(
            hex::encode(tx.outputs[0].script_pubkey.serialize().unwrap()),
            "1976a914bc3b654dca7e56b04dca18f2566cdaf02e8d9ada88ac"
        );
        assert_eq!(tx.outputs[1].amount, 10011545);
        assert!(tx.outputs[1].script_pubkey.is_p2pkh_script_pubkey());
    }

    #[test]
    fn test_serialize_round_trip() {
        assert_eq!(hex::encode(book_tx().serialize().unwrap()), BOOK_TX_HEX);
    }

    #[test]
    fn test_id() {
        let tx = book_tx();
        let id = tx.id().unwrap();
        assert_eq!(id, "452c629d67e41baec3ac6f04fe744b4b9617f8f859c63b3002f8684e7a4fee03");
        assert_eq!(tx.id().unwrap(), id);
    }

    #[test]
    fn test_parse_truncated() {
        let raw = hex::decode(&BOOK_TX_HEX[..100]).unwrap();
        assert!(matches!(
            Transaction::parse(&mut Cursor::new(raw), Network::Mainnet),
            Err(PrimitiveError::Serialization(_))
        ));
    }

    #[test]
    fn test_store_miss() {
        let store = MemoryStore::new();
        let tx = book_tx();
        assert!(matches!(
            tx.inputs[0].value(&store, Network::Mainnet),
            Err(PrimitiveError::NotFound(_))
        ));
        assert!(matches!(tx.fee(&store), Err(PrimitiveError::NotFound(_))));
    }

    #[test]
    fn test_store_is_keyed_by_network() {
        let mut store = MemoryStore::new();
        let id = store
            .insert_raw(&hex::decode(BOOK_TX_HEX).unwrap(), Network::Testnet)
            .unwrap();
        assert!(store.contains(&id, Network::Testnet));
        assert!(!store.contains(&id, Network::Mainnet));
        assert!(store.fetch(&id, Network::Mainnet).is_err());
        assert_eq!(store.fetch(&id, Network::Testnet).unwrap().id().unwrap(), hex::encode(id));
    }

    /// One p2pkh output to secret 8675309, and an unsigned spend of it
    fn funded_spend() -> (MemoryStore, Transaction, PrivateKey) {
        let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
        let h160 = hash160(&key.public_key().sec(true));
        let funding = Transaction::new(
            1,
            vec![TxIn::new([0x11; 32], 0)],
            vec![TxOut::new(50_000, p2pkh_script(&h160))],
            0,
            Network::Testnet,
        );
        let mut store = MemoryStore::new();
        let funding_id = store.insert(funding).unwrap();
        let spend = Transaction::new(
            1,
            vec![TxIn::new(funding_id, 0)],
            vec![TxOut::new(40_000, p2pkh_script(&[0x22; 20]))],
            0,
            Network::Testnet,
        );
        (store, spend, key)
    }

    #[test]
    fn test_funding_id() {
        let (_, spend, _) = funded_spend();
        assert_eq!(
            hex::encode(spend.inputs[0].prev_tx),
            "3a8ac725bf208263d65b38eeffe938851a0a94b86603c5d6459b6958aec8d6d7"
        );
        assert_eq!(
            spend.id().unwrap(),
            "3ab9954c2f5143db31b8f731ca8aff86678a0ad2b06a335b754a34d8acbdbf87"
        );
    }

    #[test]
    fn test_fee() {
        let (store, mut spend, _) = funded_spend();
        assert_eq!(spend.fee(&store).unwrap(), 10_000);
        spend.outputs[0].amount = 60_000;
        assert_eq!(spend.fee(&store).unwrap(), -10_000);
    }

    #[test]
    fn test_sig_hash() {
        let (store, spend, _) = funded_spend();
        let z = spend.sig_hash(0, &store, None).unwrap();
        assert_eq!(
            format!("{:064x}", z),
            "ae3f42486a8479ba23d0699c817a46e92804381b443074d051923ffd88433049"
        );
    }

    #[test]
    fn test_sig_hash_bad_index() {
        let (store, spend, _) = funded_spend();
        assert!(matches!(
            spend.sig_hash(1, &store, None),
            Err(PrimitiveError::InputIndex { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let (store, mut spend, key) = funded_spend();
        assert!(!spend.verify(&store).unwrap());
        assert!(spend.sign_input(0, &key, &store).unwrap());
        assert!(spend.verify_input(0, &store).unwrap());
        assert!(spend.verify(&store).unwrap());
    }

    #[test]
    fn test_sign_with_wrong_key() {
        let (store, mut spend, _) = funded_spend();
        let wrong = PrivateKey::new(BigUint::from(8675310u32)).unwrap();
        assert!(!spend.sign_input(0, &wrong, &store).unwrap());
    }

    #[test]
    fn test_verify_rejects_overspend() {
        let (store, mut spend, key) = funded_spend();
        spend.outputs[0].amount = 60_000;
        assert!(spend.sign_input(0, &key, &store).unwrap());
        assert!(!spend.verify(&store).unwrap());
    }

    #[test]
    fn test_bad_prev_index() {
        let (store, mut spend, _) = funded_spend();
        spend.inputs[0].prev_index = 3;
        assert!(matches!(
            spend.fee(&store),
            Err(PrimitiveError::OutputIndex { index: 3, len: 1, .. })
        ));
    }

    #[test]
    fn test_display() {
        let text = book_tx().to_string();
        assert!(text.starts_with("tx: 452c629d67e41baec3ac6f04fe744b4b9617f8f859c63b3002f8684e7a4fee03"));
        assert!(text.contains("d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81:0"));
        assert!(text.ends_with("locktime: 410393"));
    }
}
