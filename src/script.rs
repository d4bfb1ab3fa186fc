//! Script parsing, serialization and evaluation
//!
//! A script is a list of [`Command`]s. Evaluation runs the commands against a
//! fresh main stack and alt stack, dispatching opcodes through an
//! [`OpcodeTable`]. Rejection is an ordinary outcome reported as an
//! [`EvalResult`], never an error.
//!
//! Pay-to-script-hash is recognised while running: when a data push is
//! followed by exactly `OP_HASH160 <20 bytes> OP_EQUAL`, the pushed bytes are
//! checked against the hash and then run as the redeem script.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io::{Cursor, Read};
use std::ops::Add;
use thiserror::Error;
use tracing::{debug, trace};

use crate::codec::{
    encode_varint, h160_to_p2pkh_address, h160_to_p2sh_address, read_bytes, read_u16_le, read_u8,
    read_varint,
};
use crate::constants::{MAX_DIRECT_PUSH, MAX_PUSH_SIZE};
use crate::error::{PrimitiveError, Result};
use crate::op::*;
use crate::types::{ByteString, Hash160, Network, Stack};

/// A single script element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Op(u8),
    Data(ByteString),
}

impl Command {
    /// The pushed bytes, if this is a data push
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Command::Data(data) => Some(data),
            Command::Op(_) => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Op(code) => match op_name(*code) {
                Some(name) => f.write_str(name),
                None => write!(f, "OP_[{}]", code),
            },
            Command::Data(data) => f.write_str(&hex::encode(data)),
        }
    }
}

/// Why a script was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFailure {
    #[error("{} failed", describe_op(*.0))]
    OpcodeFailed(u8),

    #[error("{} is not in the opcode table", describe_op(*.0))]
    UnknownOpcode(u8),

    #[error("redeem script does not match its hash")]
    P2shHashMismatch,

    #[error("redeem script could not be parsed")]
    RedeemScriptParse,

    #[error("stack is empty at the end of evaluation")]
    EmptyStack,

    #[error("top of stack is false")]
    FalseResult,
}

fn describe_op(code: u8) -> String {
    Command::Op(code).to_string()
}

/// Outcome of evaluating a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    Valid,
    Invalid(ScriptFailure),
}

impl EvalResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, EvalResult::Valid)
    }

    pub fn failure(&self) -> Option<ScriptFailure> {
        match self {
            EvalResult::Valid => None,
            EvalResult::Invalid(failure) => Some(*failure),
        }
    }
}

/// An ordered list of opcodes and data pushes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script {
    cmds: Vec<Command>,
}

impl Script {
    pub fn new(cmds: Vec<Command>) -> Self {
        Self { cmds }
    }

    pub fn cmds(&self) -> &[Command] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Parse a varint-prefixed script
    ///
    /// Pushes are stored as bare data, so serializing again only reproduces
    /// the input bytes when every push used its minimal encoding.
    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let length = read_varint(reader)?;
        let mut cmds = Vec::new();
        let mut count: u64 = 0;
        while count < length {
            let current = read_u8(reader)?;
            count += 1;
            match current {
                1..=75 => {
                    cmds.push(Command::Data(read_bytes(reader, usize::from(current))?));
                    count += u64::from(current);
                }
                OP_PUSHDATA1 => {
                    let data_length = read_u8(reader)?;
                    cmds.push(Command::Data(read_bytes(reader, usize::from(data_length))?));
                    count += u64::from(data_length) + 1;
                }
                OP_PUSHDATA2 => {
                    let data_length = read_u16_le(reader)?;
                    if usize::from(data_length) > MAX_PUSH_SIZE {
                        return Err(PrimitiveError::ScriptTooLong(usize::from(data_length)));
                    }
                    cmds.push(Command::Data(read_bytes(reader, usize::from(data_length))?));
                    count += u64::from(data_length) + 2;
                }
                code => cmds.push(Command::Op(code)),
            }
        }
        if count != length {
            return Err(PrimitiveError::ScriptParse(format!(
                "consumed {} bytes of a {} byte script",
                count, length
            )));
        }
        Ok(Self { cmds })
    }

    /// Parse a script body that carries no length prefix
    pub fn parse_raw(raw: &[u8]) -> Result<Self> {
        let mut prefixed = encode_varint(raw.len() as u64);
        prefixed.extend_from_slice(raw);
        Self::parse(&mut Cursor::new(prefixed))
    }

    /// Script body without the length prefix, using minimal push encodings
    pub fn raw_serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Command::Op(code) => result.push(*code),
                Command::Data(data) => {
                    let length = data.len();
                    if length <= MAX_DIRECT_PUSH {
                        result.push(length as u8);
                    } else if length <= 0xff {
                        result.push(OP_PUSHDATA1);
                        result.push(length as u8);
                    } else if length <= MAX_PUSH_SIZE {
                        result.push(OP_PUSHDATA2);
                        result.extend_from_slice(&(length as u16).to_le_bytes());
                    } else {
                        return Err(PrimitiveError::ScriptTooLong(length));
                    }
                    result.extend_from_slice(data);
                }
            }
        }
        Ok(result)
    }

    /// Script body prefixed with its varint length
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let raw = self.raw_serialize()?;
        let mut result = encode_varint(raw.len() as u64);
        result.extend(raw);
        Ok(result)
    }

    /// `self` followed by `other`
    pub fn combine(&self, other: &Script) -> Script {
        let mut cmds = self.cmds.clone();
        cmds.extend(other.cmds.iter().cloned());
        Script { cmds }
    }

    /// Evaluate against the signature hash `z` with the standard opcodes
    pub fn evaluate(&self, z: &BigUint) -> EvalResult {
        self.evaluate_with(&StandardOpcodes, z)
    }

    /// Evaluate with a caller-supplied opcode table
    pub fn evaluate_with<T: OpcodeTable + ?Sized>(&self, table: &T, z: &BigUint) -> EvalResult {
        let mut cmds: VecDeque<Command> = self.cmds.iter().cloned().collect();
        let mut stack = Stack::new();
        let mut altstack = Stack::new();

        while let Some(cmd) = cmds.pop_front() {
            match cmd {
                Command::Op(code) => {
                    let Some(operation) = table.operation(code) else {
                        return reject(ScriptFailure::UnknownOpcode(code));
                    };
                    let ok = match operation {
                        Operation::Stack(f) => f(&mut stack),
                        Operation::Flow(f) => f(&mut stack, &mut cmds),
                        Operation::AltStack(f) => f(&mut stack, &mut altstack),
                        Operation::Signature(f) => f(&mut stack, z),
                    };
                    if !ok {
                        return reject(ScriptFailure::OpcodeFailed(code));
                    }
                }
                Command::Data(data) => {
                    let Some(h160) = take_p2sh_tail(&mut cmds) else {
                        stack.push(data);
                        continue;
                    };
                    stack.push(data.clone());

                    let matched = run_stack_op(table, OP_HASH160, &mut stack) && {
                        stack.push(h160.to_vec());
                        run_stack_op(table, OP_EQUAL, &mut stack)
                            && run_stack_op(table, OP_VERIFY, &mut stack)
                    };
                    if !matched {
                        return reject(ScriptFailure::P2shHashMismatch);
                    }

                    match Script::parse_raw(&data) {
                        Ok(redeem_script) => {
                            trace!(
                                "splicing {} byte redeem script: {}",
                                data.len(),
                                redeem_script
                            );
                            cmds.extend(redeem_script.cmds);
                        }
                        Err(e) => {
                            debug!("redeem script parse error: {}", e);
                            return reject(ScriptFailure::RedeemScriptParse);
                        }
                    }
                }
            }
        }

        match stack.last() {
            None => reject(ScriptFailure::EmptyStack),
            Some(top) if top.is_empty() => reject(ScriptFailure::FalseResult),
            Some(_) => EvalResult::Valid,
        }
    }

    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn is_p2pkh_script_pubkey(&self) -> bool {
        matches!(
            self.cmds.as_slice(),
            [
                Command::Op(OP_DUP),
                Command::Op(OP_HASH160),
                Command::Data(h160),
                Command::Op(OP_EQUALVERIFY),
                Command::Op(OP_CHECKSIG),
            ] if h160.len() == 20
        )
    }

    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    pub fn is_p2sh_script_pubkey(&self) -> bool {
        is_p2sh_shape(self.cmds.iter())
    }

    /// Address paid to by a P2PKH or P2SH locking script
    pub fn address(&self, network: Network) -> Option<String> {
        if self.is_p2pkh_script_pubkey() {
            let h160: Hash160 = self.cmds[2].data()?.try_into().ok()?;
            Some(h160_to_p2pkh_address(&h160, network))
        } else if self.is_p2sh_script_pubkey() {
            let h160: Hash160 = self.cmds[1].data()?.try_into().ok()?;
            Some(h160_to_p2sh_address(&h160, network))
        } else {
            None
        }
    }
}

impl Add for Script {
    type Output = Script;

    fn add(mut self, other: Script) -> Script {
        self.cmds.extend(other.cmds);
        self
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

/// Locking script paying to a public key hash
pub fn p2pkh_script(h160: &Hash160) -> Script {
    Script::new(vec![
        Command::Op(OP_DUP),
        Command::Op(OP_HASH160),
        Command::Data(h160.to_vec()),
        Command::Op(OP_EQUALVERIFY),
        Command::Op(OP_CHECKSIG),
    ])
}

/// Locking script paying to a redeem script hash
pub fn p2sh_script(h160: &Hash160) -> Script {
    Script::new(vec![
        Command::Op(OP_HASH160),
        Command::Data(h160.to_vec()),
        Command::Op(OP_EQUAL),
    ])
}

fn is_p2sh_shape<'a>(mut cmds: impl Iterator<Item = &'a Command>) -> bool {
    matches!(
        (cmds.next(), cmds.next(), cmds.next(), cmds.next()),
        (
            Some(Command::Op(OP_HASH160)),
            Some(Command::Data(h160)),
            Some(Command::Op(OP_EQUAL)),
            None,
        ) if h160.len() == 20
    )
}

/// Remove a trailing `OP_HASH160 <h160> OP_EQUAL` from the queue, returning the hash
fn take_p2sh_tail(cmds: &mut VecDeque<Command>) -> Option<Hash160> {
    if !is_p2sh_shape(cmds.iter()) {
        return None;
    }
    let h160 = cmds.get(1)?.data()?.try_into().ok()?;
    cmds.clear();
    Some(h160)
}

fn run_stack_op<T: OpcodeTable + ?Sized>(table: &T, code: u8, stack: &mut Stack) -> bool {
    match table.operation(code) {
        Some(Operation::Stack(f)) => f(stack),
        _ => false,
    }
}

fn reject(failure: ScriptFailure) -> EvalResult {
    debug!("script rejected: {}", failure);
    EvalResult::Invalid(failure)
}
