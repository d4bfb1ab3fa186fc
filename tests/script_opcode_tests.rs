//! Tests for script evaluation through the public API

use num_bigint::BigUint;
use utxo_primitives::codec::hash160;
use utxo_primitives::op::*;
use utxo_primitives::script::{p2pkh_script, p2sh_script};
use utxo_primitives::*;

fn key(secret: u32) -> PrivateKey {
    PrivateKey::new(BigUint::from(secret)).unwrap()
}

fn sig_with_hashtype(key: &PrivateKey, z: &BigUint) -> Vec<u8> {
    let mut sig = key.sign(z).unwrap().der();
    sig.push(0x01);
    sig
}

fn ops(codes: &[u8]) -> Script {
    Script::new(codes.iter().map(|&c| Command::Op(c)).collect())
}

#[test]
fn test_eval_simple_arithmetic() {
    // 2 3 ADD 5 EQUAL
    let script = ops(&[OP_2, OP_3, OP_ADD, OP_5, OP_EQUAL]);
    assert!(script.evaluate(&BigUint::from(0u32)).is_valid());

    let script = ops(&[OP_2, OP_3, OP_ADD, OP_6, OP_EQUAL]);
    assert_eq!(
        script.evaluate(&BigUint::from(0u32)),
        EvalResult::Invalid(ScriptFailure::FalseResult)
    );
}

#[test]
fn test_eval_equalverify_failure_names_opcode() {
    let script = ops(&[OP_1, OP_2, OP_EQUALVERIFY, OP_1]);
    assert_eq!(
        script.evaluate(&BigUint::from(0u32)),
        EvalResult::Invalid(ScriptFailure::OpcodeFailed(OP_EQUALVERIFY))
    );
}

#[test]
fn test_eval_nested_if() {
    // 1 0 IF 2 ELSE 1 IF 3 ENDIF ENDIF 3 EQUAL
    let script = ops(&[
        OP_1, OP_0, OP_IF, OP_2, OP_ELSE, OP_IF, OP_3, OP_ENDIF, OP_ENDIF, OP_3, OP_EQUAL,
    ]);
    assert!(script.evaluate(&BigUint::from(0u32)).is_valid());
}

#[test]
fn test_eval_unbalanced_if() {
    let script = ops(&[OP_1, OP_IF, OP_1]);
    assert_eq!(
        script.evaluate(&BigUint::from(0u32)),
        EvalResult::Invalid(ScriptFailure::OpcodeFailed(OP_IF))
    );
}

#[test]
fn test_p2pkh_spend() {
    let key = key(424242);
    let z = BigUint::from(0xfeed_beefu32);
    let sec = key.public_key().sec(false);
    let script_sig = Script::new(vec![
        Command::Data(sig_with_hashtype(&key, &z)),
        Command::Data(sec.clone()),
    ]);
    let script_pubkey = p2pkh_script(&hash160(&sec));

    assert!((script_sig.clone() + script_pubkey.clone()).evaluate(&z).is_valid());
    // same signature, different message
    assert!(!(script_sig + script_pubkey).evaluate(&(z + 1u32)).is_valid());
}

#[test]
fn test_p2pkh_wrong_public_key() {
    let signer = key(1000);
    let other = key(1001);
    let z = BigUint::from(77u32);
    let script_sig = Script::new(vec![
        Command::Data(sig_with_hashtype(&signer, &z)),
        Command::Data(other.public_key().sec(true)),
    ]);
    let script_pubkey = p2pkh_script(&signer.public_key().hash160(true));
    assert_eq!(
        (script_sig + script_pubkey).evaluate(&z),
        EvalResult::Invalid(ScriptFailure::OpcodeFailed(OP_EQUALVERIFY))
    );
}

#[test]
fn test_p2sh_multisig_spend() {
    let keys = [key(11), key(22), key(33)];
    let z = BigUint::from(0x5eed_u32);

    let mut redeem = vec![Command::Op(OP_2)];
    redeem.extend(keys.iter().map(|k| Command::Data(k.public_key().sec(true))));
    redeem.push(Command::Op(OP_3));
    redeem.push(Command::Op(OP_CHECKMULTISIG));
    let redeem_raw = Script::new(redeem).raw_serialize().unwrap();
    let script_pubkey = p2sh_script(&hash160(&redeem_raw));

    let spend = |signers: &[&PrivateKey]| {
        let mut cmds = vec![Command::Op(OP_0)];
        cmds.extend(signers.iter().map(|k| Command::Data(sig_with_hashtype(k, &z))));
        cmds.push(Command::Data(redeem_raw.clone()));
        Script::new(cmds).combine(&script_pubkey).evaluate(&z)
    };

    assert!(spend(&[&keys[0], &keys[1]]).is_valid());
    assert!(spend(&[&keys[0], &keys[2]]).is_valid());
    assert!(spend(&[&keys[1], &keys[2]]).is_valid());
    // signatures must follow key order
    assert!(!spend(&[&keys[2], &keys[0]]).is_valid());
    // an outside key
    assert!(!spend(&[&keys[0], &key(44)]).is_valid());
}

#[test]
fn test_p2sh_requires_exact_tail() {
    // OP_HASH160 <h> OP_EQUAL followed by another opcode is not P2SH
    let redeem_raw = ops(&[OP_1]).raw_serialize().unwrap();
    let mut locking = p2sh_script(&hash160(&redeem_raw)).cmds().to_vec();
    locking.push(Command::Op(OP_NOP));
    let script = Script::new(vec![Command::Data(redeem_raw)]) + Script::new(locking);

    // plain evaluation: HASH160 then EQUAL leaves 1 on the stack and the redeem script is not run
    assert!(script.evaluate(&BigUint::from(0u32)).is_valid());
}

#[test]
fn test_p2sh_redeem_script_can_fail() {
    let redeem_raw = ops(&[OP_0]).raw_serialize().unwrap();
    let script = Script::new(vec![Command::Data(redeem_raw.clone())])
        + p2sh_script(&hash160(&redeem_raw));
    assert_eq!(
        script.evaluate(&BigUint::from(0u32)),
        EvalResult::Invalid(ScriptFailure::FalseResult)
    );
}

#[test]
fn test_parsed_script_evaluates() {
    let script = Script::parse_raw(&[OP_1, OP_DUP, OP_EQUAL]).unwrap();
    assert_eq!(script.cmds().len(), 3);
    assert!(script.evaluate(&BigUint::from(0u32)).is_valid());
}
