//! Opcode table for the script VM
//!
//! Every opcode maps to an [`Operation`]. The variant says which part of the
//! VM state the opcode may touch: only the main stack, the remaining command
//! queue (flow control), the alt stack, or the signature hash. The VM in
//! [`crate::script`] dispatches on the variant and never on the opcode value.

use num_bigint::BigUint;
use std::collections::VecDeque;

use crate::codec::{hash160, hash256, sha256};
use crate::constants::MAX_SCRIPT_NUM_SIZE;
use crate::keys::PublicKey;
use crate::script::Command;
use crate::signature::Signature;
use crate::types::{ByteString, Stack};

macro_rules! opcodes {
    ($($name:ident = $code:literal),* $(,)?) => {
        $(pub const $name: u8 = $code;)*

        /// Mnemonic of an assigned opcode
        pub fn op_name(code: u8) -> Option<&'static str> {
            match code {
                $($code => Some(stringify!($name)),)*
                _ => None,
            }
        }
    };
}

opcodes! {
    OP_0 = 0x00,
    OP_PUSHDATA1 = 0x4c,
    OP_PUSHDATA2 = 0x4d,
    OP_PUSHDATA4 = 0x4e,
    OP_1NEGATE = 0x4f,
    OP_1 = 0x51,
    OP_2 = 0x52,
    OP_3 = 0x53,
    OP_4 = 0x54,
    OP_5 = 0x55,
    OP_6 = 0x56,
    OP_7 = 0x57,
    OP_8 = 0x58,
    OP_9 = 0x59,
    OP_10 = 0x5a,
    OP_11 = 0x5b,
    OP_12 = 0x5c,
    OP_13 = 0x5d,
    OP_14 = 0x5e,
    OP_15 = 0x5f,
    OP_16 = 0x60,
    OP_NOP = 0x61,
    OP_IF = 0x63,
    OP_NOTIF = 0x64,
    OP_ELSE = 0x67,
    OP_ENDIF = 0x68,
    OP_VERIFY = 0x69,
    OP_RETURN = 0x6a,
    OP_TOALTSTACK = 0x6b,
    OP_FROMALTSTACK = 0x6c,
    OP_2DROP = 0x6d,
    OP_2DUP = 0x6e,
    OP_3DUP = 0x6f,
    OP_2OVER = 0x70,
    OP_2ROT = 0x71,
    OP_2SWAP = 0x72,
    OP_IFDUP = 0x73,
    OP_DEPTH = 0x74,
    OP_DROP = 0x75,
    OP_DUP = 0x76,
    OP_NIP = 0x77,
    OP_OVER = 0x78,
    OP_PICK = 0x79,
    OP_ROLL = 0x7a,
    OP_ROT = 0x7b,
    OP_SWAP = 0x7c,
    OP_TUCK = 0x7d,
    OP_SIZE = 0x82,
    OP_EQUAL = 0x87,
    OP_EQUALVERIFY = 0x88,
    OP_1ADD = 0x8b,
    OP_1SUB = 0x8c,
    OP_NEGATE = 0x8f,
    OP_ABS = 0x90,
    OP_NOT = 0x91,
    OP_0NOTEQUAL = 0x92,
    OP_ADD = 0x93,
    OP_SUB = 0x94,
    OP_BOOLAND = 0x9a,
    OP_BOOLOR = 0x9b,
    OP_NUMEQUAL = 0x9c,
    OP_NUMEQUALVERIFY = 0x9d,
    OP_NUMNOTEQUAL = 0x9e,
    OP_LESSTHAN = 0x9f,
    OP_GREATERTHAN = 0xa0,
    OP_LESSTHANOREQUAL = 0xa1,
    OP_GREATERTHANOREQUAL = 0xa2,
    OP_MIN = 0xa3,
    OP_MAX = 0xa4,
    OP_WITHIN = 0xa5,
    OP_RIPEMD160 = 0xa6,
    OP_SHA1 = 0xa7,
    OP_SHA256 = 0xa8,
    OP_HASH160 = 0xa9,
    OP_HASH256 = 0xaa,
    OP_CODESEPARATOR = 0xab,
    OP_CHECKSIG = 0xac,
    OP_CHECKSIGVERIFY = 0xad,
    OP_CHECKMULTISIG = 0xae,
    OP_CHECKMULTISIGVERIFY = 0xaf,
    OP_NOP1 = 0xb0,
    OP_CHECKLOCKTIMEVERIFY = 0xb1,
    OP_CHECKSEQUENCEVERIFY = 0xb2,
    OP_NOP4 = 0xb3,
    OP_NOP5 = 0xb4,
    OP_NOP6 = 0xb5,
    OP_NOP7 = 0xb6,
    OP_NOP8 = 0xb7,
    OP_NOP9 = 0xb8,
    OP_NOP10 = 0xb9,
}

/// Public keys accepted by a single OP_CHECKMULTISIG
const MAX_MULTISIG_KEYS: i64 = 20;

/// What an opcode is allowed to see, and the function that runs it
///
/// Every function returns `false` to reject the script.
#[derive(Clone, Copy)]
pub enum Operation {
    Stack(fn(&mut Stack) -> bool),
    Flow(fn(&mut Stack, &mut VecDeque<Command>) -> bool),
    AltStack(fn(&mut Stack, &mut Stack) -> bool),
    Signature(fn(&mut Stack, &BigUint) -> bool),
}

/// Lookup from opcode byte to its operation
pub trait OpcodeTable {
    /// `None` marks an unassigned or disabled opcode
    fn operation(&self, code: u8) -> Option<Operation>;
}

/// The standard opcode semantics
///
/// Disabled opcodes (splice, bitwise logic, multiplication and shifts) and
/// OP_SHA1 have no entry. The two locktime opcodes run as plain NOPs since
/// evaluation has no transaction context.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOpcodes;

impl OpcodeTable for StandardOpcodes {
    fn operation(&self, code: u8) -> Option<Operation> {
        use Operation::{AltStack, Flow, Signature, Stack};

        let operation = match code {
            OP_0 => Stack(|s| push_num(s, 0)),
            OP_1NEGATE => Stack(|s| push_num(s, -1)),
            OP_1 => Stack(|s| push_num(s, 1)),
            OP_2 => Stack(|s| push_num(s, 2)),
            OP_3 => Stack(|s| push_num(s, 3)),
            OP_4 => Stack(|s| push_num(s, 4)),
            OP_5 => Stack(|s| push_num(s, 5)),
            OP_6 => Stack(|s| push_num(s, 6)),
            OP_7 => Stack(|s| push_num(s, 7)),
            OP_8 => Stack(|s| push_num(s, 8)),
            OP_9 => Stack(|s| push_num(s, 9)),
            OP_10 => Stack(|s| push_num(s, 10)),
            OP_11 => Stack(|s| push_num(s, 11)),
            OP_12 => Stack(|s| push_num(s, 12)),
            OP_13 => Stack(|s| push_num(s, 13)),
            OP_14 => Stack(|s| push_num(s, 14)),
            OP_15 => Stack(|s| push_num(s, 15)),
            OP_16 => Stack(|s| push_num(s, 16)),

            OP_NOP | OP_CODESEPARATOR | OP_NOP1..=OP_NOP10 => Stack(op_nop),
            OP_IF => Flow(op_if),
            OP_NOTIF => Flow(op_notif),
            OP_VERIFY => Stack(op_verify),
            OP_RETURN => Stack(op_return),

            OP_TOALTSTACK => AltStack(op_toaltstack),
            OP_FROMALTSTACK => AltStack(op_fromaltstack),

            OP_2DROP => Stack(op_2drop),
            OP_2DUP => Stack(op_2dup),
            OP_3DUP => Stack(op_3dup),
            OP_2OVER => Stack(op_2over),
            OP_2ROT => Stack(op_2rot),
            OP_2SWAP => Stack(op_2swap),
            OP_IFDUP => Stack(op_ifdup),
            OP_DEPTH => Stack(op_depth),
            OP_DROP => Stack(op_drop),
            OP_DUP => Stack(op_dup),
            OP_NIP => Stack(op_nip),
            OP_OVER => Stack(op_over),
            OP_PICK => Stack(op_pick),
            OP_ROLL => Stack(op_roll),
            OP_ROT => Stack(op_rot),
            OP_SWAP => Stack(op_swap),
            OP_TUCK => Stack(op_tuck),
            OP_SIZE => Stack(op_size),

            OP_EQUAL => Stack(op_equal),
            OP_EQUALVERIFY => Stack(op_equalverify),

            OP_1ADD => Stack(|s| unary(s, |a| a + 1)),
            OP_1SUB => Stack(|s| unary(s, |a| a - 1)),
            OP_NEGATE => Stack(|s| unary(s, |a| -a)),
            OP_ABS => Stack(|s| unary(s, i64::abs)),
            OP_NOT => Stack(|s| unary(s, |a| i64::from(a == 0))),
            OP_0NOTEQUAL => Stack(|s| unary(s, |a| i64::from(a != 0))),
            OP_ADD => Stack(|s| binary(s, |a, b| a + b)),
            OP_SUB => Stack(|s| binary(s, |a, b| a - b)),
            OP_BOOLAND => Stack(|s| binary(s, |a, b| i64::from(a != 0 && b != 0))),
            OP_BOOLOR => Stack(|s| binary(s, |a, b| i64::from(a != 0 || b != 0))),
            OP_NUMEQUAL => Stack(|s| binary(s, |a, b| i64::from(a == b))),
            OP_NUMEQUALVERIFY => Stack(|s| binary(s, |a, b| i64::from(a == b)) && op_verify(s)),
            OP_NUMNOTEQUAL => Stack(|s| binary(s, |a, b| i64::from(a != b))),
            OP_LESSTHAN => Stack(|s| binary(s, |a, b| i64::from(a < b))),
            OP_GREATERTHAN => Stack(|s| binary(s, |a, b| i64::from(a > b))),
            OP_LESSTHANOREQUAL => Stack(|s| binary(s, |a, b| i64::from(a <= b))),
            OP_GREATERTHANOREQUAL => Stack(|s| binary(s, |a, b| i64::from(a >= b))),
            OP_MIN => Stack(|s| binary(s, i64::min)),
            OP_MAX => Stack(|s| binary(s, i64::max)),
            OP_WITHIN => Stack(op_within),

            OP_RIPEMD160 => Stack(op_ripemd160),
            OP_SHA256 => Stack(|s| hash_top(s, |data| sha256(data).to_vec())),
            OP_HASH160 => Stack(|s| hash_top(s, |data| hash160(data).to_vec())),
            OP_HASH256 => Stack(|s| hash_top(s, |data| hash256(data).to_vec())),

            OP_CHECKSIG => Signature(op_checksig),
            OP_CHECKSIGVERIFY => Signature(|s, z| op_checksig(s, z) && op_verify(s)),
            OP_CHECKMULTISIG => Signature(op_checkmultisig),
            OP_CHECKMULTISIGVERIFY => Signature(|s, z| op_checkmultisig(s, z) && op_verify(s)),

            _ => return None,
        };
        Some(operation)
    }
}

/// Minimal little-endian sign-magnitude encoding of a script number
pub fn encode_num(num: i64) -> ByteString {
    if num == 0 {
        return Vec::new();
    }
    let negative = num < 0;
    let mut magnitude = num.unsigned_abs();
    let mut result = Vec::new();
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    // the top bit of the last byte carries the sign
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Decode a script number, or `None` when it is wider than four bytes
pub fn decode_num(element: &[u8]) -> Option<i64> {
    if element.len() > MAX_SCRIPT_NUM_SIZE {
        return None;
    }
    let Some((&last, rest)) = element.split_last() else {
        return Some(0);
    };
    let negative = last & 0x80 != 0;
    let mut result = i64::from(last & 0x7f);
    for &byte in rest.iter().rev() {
        result = (result << 8) | i64::from(byte);
    }
    Some(if negative { -result } else { result })
}

/// Truth value of a stack element: any non-zero byte, negative zero excepted
pub fn is_true(element: &[u8]) -> bool {
    match element.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80),
    }
}

fn push_num(stack: &mut Stack, num: i64) -> bool {
    stack.push(encode_num(num));
    true
}

fn pop_num(stack: &mut Stack) -> Option<i64> {
    decode_num(&stack.pop()?)
}

fn unary(stack: &mut Stack, f: fn(i64) -> i64) -> bool {
    match pop_num(stack) {
        Some(a) => push_num(stack, f(a)),
        None => false,
    }
}

/// `a` is the deeper operand, `b` the top of the stack
fn binary(stack: &mut Stack, f: fn(i64, i64) -> i64) -> bool {
    let Some(b) = pop_num(stack) else {
        return false;
    };
    let Some(a) = pop_num(stack) else {
        return false;
    };
    push_num(stack, f(a, b))
}

fn hash_top(stack: &mut Stack, f: fn(&[u8]) -> ByteString) -> bool {
    match stack.pop() {
        Some(element) => {
            stack.push(f(&element));
            true
        }
        None => false,
    }
}

fn op_nop(_stack: &mut Stack) -> bool {
    true
}

// OP_IF / OP_NOTIF - splice the taken branch back onto the front of the queue
fn branch(stack: &mut Stack, items: &mut VecDeque<Command>, take_if_true: bool) -> bool {
    if stack.is_empty() {
        return false;
    }
    let mut true_items = Vec::new();
    let mut false_items = Vec::new();
    let mut in_else = false;
    let mut found = false;
    let mut endifs_needed = 1;

    while let Some(item) = items.pop_front() {
        let current = if in_else { &mut false_items } else { &mut true_items };
        match item {
            Command::Op(OP_IF | OP_NOTIF) => {
                endifs_needed += 1;
                current.push(item);
            }
            Command::Op(OP_ELSE) if endifs_needed == 1 => in_else = true,
            Command::Op(OP_ENDIF) => {
                if endifs_needed == 1 {
                    found = true;
                    break;
                }
                endifs_needed -= 1;
                current.push(item);
            }
            _ => current.push(item),
        }
    }
    if !found {
        return false;
    }

    let condition = stack.pop().is_some_and(|element| is_true(&element));
    let taken = if condition == take_if_true { true_items } else { false_items };
    for item in taken.into_iter().rev() {
        items.push_front(item);
    }
    true
}

fn op_if(stack: &mut Stack, items: &mut VecDeque<Command>) -> bool {
    branch(stack, items, true)
}

fn op_notif(stack: &mut Stack, items: &mut VecDeque<Command>) -> bool {
    branch(stack, items, false)
}

fn op_verify(stack: &mut Stack) -> bool {
    stack.pop().is_some_and(|element| is_true(&element))
}

fn op_return(_stack: &mut Stack) -> bool {
    false
}

fn op_toaltstack(stack: &mut Stack, altstack: &mut Stack) -> bool {
    match stack.pop() {
        Some(element) => {
            altstack.push(element);
            true
        }
        None => false,
    }
}

fn op_fromaltstack(stack: &mut Stack, altstack: &mut Stack) -> bool {
    match altstack.pop() {
        Some(element) => {
            stack.push(element);
            true
        }
        None => false,
    }
}

// OP_2DROP - remove top 2 stack items
fn op_2drop(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    stack.truncate(stack.len() - 2);
    true
}

/// Copy the top `n` items, preserving their order
fn dup_n(stack: &mut Stack, n: usize) -> bool {
    if stack.len() < n {
        return false;
    }
    let copied = stack[stack.len() - n..].to_vec();
    stack.extend(copied);
    true
}

fn op_2dup(stack: &mut Stack) -> bool {
    dup_n(stack, 2)
}

fn op_3dup(stack: &mut Stack) -> bool {
    dup_n(stack, 3)
}

// OP_2OVER - copy second pair of stack items to top
fn op_2over(stack: &mut Stack) -> bool {
    if stack.len() < 4 {
        return false;
    }
    let pair = stack[stack.len() - 4..stack.len() - 2].to_vec();
    stack.extend(pair);
    true
}

// OP_2ROT - move the fifth and sixth items to the top
fn op_2rot(stack: &mut Stack) -> bool {
    if stack.len() < 6 {
        return false;
    }
    let start = stack.len() - 6;
    let pair: Vec<ByteString> = stack.drain(start..start + 2).collect();
    stack.extend(pair);
    true
}

// OP_2SWAP - swap second pair of stack items
fn op_2swap(stack: &mut Stack) -> bool {
    if stack.len() < 4 {
        return false;
    }
    let start = stack.len() - 4;
    stack[start..].rotate_left(2);
    true
}

// OP_IFDUP - duplicate top stack item if it's true
fn op_ifdup(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            if is_true(top) {
                let top = top.clone();
                stack.push(top);
            }
            true
        }
        None => false,
    }
}

fn op_depth(stack: &mut Stack) -> bool {
    let depth = stack.len() as i64;
    push_num(stack, depth)
}

fn op_drop(stack: &mut Stack) -> bool {
    stack.pop().is_some()
}

fn op_dup(stack: &mut Stack) -> bool {
    dup_n(stack, 1)
}

// OP_NIP - remove second-to-top stack item
fn op_nip(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let index = stack.len() - 2;
    stack.remove(index);
    true
}

fn op_over(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let second = stack[stack.len() - 2].clone();
    stack.push(second);
    true
}

/// Index of the item `n` below the top, after popping `n` itself
fn depth_index(stack: &mut Stack) -> Option<usize> {
    let n = usize::try_from(pop_num(stack)?).ok()?;
    stack.len().checked_sub(n + 1)
}

// OP_PICK - copy nth stack item to top
fn op_pick(stack: &mut Stack) -> bool {
    match depth_index(stack) {
        Some(index) => {
            let item = stack[index].clone();
            stack.push(item);
            true
        }
        None => false,
    }
}

// OP_ROLL - move nth stack item to top
fn op_roll(stack: &mut Stack) -> bool {
    match depth_index(stack) {
        Some(index) => {
            let item = stack.remove(index);
            stack.push(item);
            true
        }
        None => false,
    }
}

// OP_ROT - rotate top 3 stack items
fn op_rot(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let start = stack.len() - 3;
    stack[start..].rotate_left(1);
    true
}

fn op_swap(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let len = stack.len();
    stack.swap(len - 1, len - 2);
    true
}

// OP_TUCK - copy top stack item to before second-to-top
fn op_tuck(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let top = stack[stack.len() - 1].clone();
    let index = stack.len() - 2;
    stack.insert(index, top);
    true
}

fn op_size(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            let size = top.len() as i64;
            push_num(stack, size)
        }
        None => false,
    }
}

fn op_equal(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
        return false;
    };
    push_num(stack, i64::from(a == b))
}

fn op_equalverify(stack: &mut Stack) -> bool {
    op_equal(stack) && op_verify(stack)
}

// OP_WITHIN - min <= x < max
fn op_within(stack: &mut Stack) -> bool {
    let (Some(max), Some(min), Some(x)) = (pop_num(stack), pop_num(stack), pop_num(stack)) else {
        return false;
    };
    push_num(stack, i64::from(min <= x && x < max))
}

fn op_ripemd160(stack: &mut Stack) -> bool {
    use ripemd::{Digest, Ripemd160};
    hash_top(stack, |data| Ripemd160::digest(data).to_vec())
}

/// Split `<sig||hashtype>` and parse both halves
fn parse_sig_and_key(der_with_type: &[u8], sec: &[u8]) -> Option<(Signature, PublicKey)> {
    let (_, der) = der_with_type.split_last()?;
    let signature = Signature::parse(der).ok()?;
    let public_key = PublicKey::parse(sec).ok()?;
    Some((signature, public_key))
}

// OP_CHECKSIG - verify ECDSA signature against z
fn op_checksig(stack: &mut Stack, z: &BigUint) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (Some(sec), Some(sig)) = (stack.pop(), stack.pop()) else {
        return false;
    };
    match parse_sig_and_key(&sig, &sec) {
        Some((signature, public_key)) => push_num(stack, i64::from(public_key.verify(z, &signature))),
        None => false,
    }
}

// OP_CHECKMULTISIG - m-of-n, signatures matched against keys in order
fn op_checkmultisig(stack: &mut Stack, z: &BigUint) -> bool {
    let Some(n) = pop_num(stack) else {
        return false;
    };
    if !(0..=MAX_MULTISIG_KEYS).contains(&n) || stack.len() < n as usize + 1 {
        return false;
    }
    let secs = stack.split_off(stack.len() - n as usize);

    let Some(m) = pop_num(stack) else {
        return false;
    };
    if !(0..=n).contains(&m) || stack.len() < m as usize + 1 {
        return false;
    }
    let sigs = stack.split_off(stack.len() - m as usize);
    // the historical extra element consumed by CHECKMULTISIG
    stack.pop();

    let mut keys = Vec::with_capacity(secs.len());
    for sec in &secs {
        match PublicKey::parse(sec) {
            Ok(key) => keys.push(key),
            Err(_) => return false,
        }
    }
    let mut signatures = Vec::with_capacity(sigs.len());
    for sig in &sigs {
        match sig.split_last().map(|(_, der)| Signature::parse(der)) {
            Some(Ok(signature)) => signatures.push(signature),
            _ => return false,
        }
    }

    let mut remaining = keys.iter();
    let all_matched = signatures
        .iter()
        .all(|signature| remaining.any(|key| key.verify(z, signature)));
    push_num(stack, i64::from(all_matched))
}
