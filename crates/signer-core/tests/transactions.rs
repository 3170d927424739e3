//! End-to-end signing and verification through the public API.

use num_bigint::BigUint;
use signer_core::hash::{hash160, sha256};
use signer_core::script::{p2pkh_script, p2sh_script, p2wpkh_script, p2wsh_script};
use signer_core::{
    Command, Network, Opcode, PrivateKey, Script, SegwitHashes, SpendKind, Tx, TxCache, TxIn,
    TxLookup, TxOut, SIGHASH_ALL,
};

fn key(secret: u64) -> PrivateKey {
    PrivateKey::new(BigUint::from(secret)).unwrap()
}

/// Cache holding one funding transaction paying `outputs`; returns its id.
fn fund(outputs: Vec<TxOut>) -> (TxCache, [u8; 32]) {
    let funding = Tx::new(1, vec![TxIn::new([0x42; 32], 7)], outputs, 0);
    let txid = funding.hash().unwrap();
    let mut cache = TxCache::new();
    cache.insert(txid, funding).unwrap();
    (cache, txid)
}

fn sig_with_type(key: &PrivateKey, z: &BigUint) -> Vec<u8> {
    let mut sig = key.sign(z).der();
    sig.push(SIGHASH_ALL as u8);
    sig
}

fn spend(txid: [u8; 32], index: u32, amount: u64) -> Tx {
    let change = key(31337).point().hash160(true);
    Tx::new(1, vec![TxIn::new(txid, index)], vec![TxOut::new(amount, p2pkh_script(&change))], 0)
}

#[test]
fn p2pkh_spend() {
    let owner = key(0xdead_beef);
    let (cache, txid) = fund(vec![TxOut::new(100_000, p2pkh_script(&owner.point().hash160(true)))]);

    let mut tx = spend(txid, 0, 90_000);
    assert!(tx.sign_input(0, &owner, &cache).unwrap());
    assert_eq!(tx.classify_input(0, &cache).unwrap(), SpendKind::Legacy);
    assert!(tx.verify(&cache).unwrap());

    let reparsed = Tx::from_hex(&hex::encode(tx.serialize().unwrap())).unwrap();
    assert_eq!(reparsed.id().unwrap(), tx.id().unwrap());
    assert!(reparsed.verify(&cache).unwrap());
}

#[test]
fn p2sh_multisig_spend() {
    let first = key(1001);
    let second = key(2002);
    let redeem = Script::new(vec![
        Command::Op(Opcode::OP_2),
        Command::Data(first.point().sec(true)),
        Command::Data(second.point().sec(true)),
        Command::Op(Opcode::OP_2),
        Command::Op(Opcode::OP_CHECKMULTISIG),
    ]);
    let redeem_raw = redeem.raw_serialize().unwrap();
    let (cache, txid) = fund(vec![TxOut::new(75_000, p2sh_script(&hash160(&redeem_raw)))]);

    let mut tx = spend(txid, 0, 70_000);
    let z = tx.sig_hash(0, Some(&redeem), &cache).unwrap();
    let signed = |sigs: Vec<Vec<u8>>| {
        let mut cmds = vec![Command::Op(Opcode::OP_0)];
        cmds.extend(sigs.into_iter().map(Command::Data));
        cmds.push(Command::Data(redeem_raw.clone()));
        Script::new(cmds)
    };

    tx.inputs[0].script_sig = signed(vec![sig_with_type(&first, &z), sig_with_type(&second, &z)]);
    assert_eq!(tx.classify_input(0, &cache).unwrap(), SpendKind::P2sh);
    assert!(tx.verify(&cache).unwrap());

    // Signatures out of key order fail
    tx.inputs[0].script_sig = signed(vec![sig_with_type(&second, &z), sig_with_type(&first, &z)]);
    assert!(!tx.verify_input(0, &cache).unwrap());

    // Only one of two required signatures
    tx.inputs[0].script_sig = signed(vec![sig_with_type(&first, &z)]);
    assert!(!tx.verify_input(0, &cache).unwrap());
}

#[test]
fn p2wpkh_spends() {
    let owner = key(555_555);
    let h160 = owner.point().hash160(true);
    let nested = hash160(&p2wpkh_script(&h160).raw_serialize().unwrap());
    let (cache, txid) = fund(vec![
        TxOut::new(40_000, p2wpkh_script(&h160)),
        TxOut::new(60_000, p2sh_script(&nested)),
    ]);

    let mut tx = spend(txid, 0, 95_000);
    tx.inputs.push(TxIn::new(txid, 1));
    assert!(tx.sign_input_p2wpkh(0, &owner, &cache).unwrap());
    assert!(tx.sign_input_p2wpkh(1, &owner, &cache).unwrap());
    assert!(tx.segwit);
    assert_eq!(tx.classify_input(0, &cache).unwrap(), SpendKind::P2wpkh);
    assert_eq!(tx.classify_input(1, &cache).unwrap(), SpendKind::P2shP2wpkh);
    assert!(tx.verify(&cache).unwrap());

    // A witness signed by another key does not satisfy the program
    let mut stolen = tx.clone();
    assert!(!stolen.sign_input_p2wpkh(0, &key(7), &cache).unwrap());
}

#[test]
fn p2wsh_spend() {
    let owner = key(424_242);
    let witness_script = Script::new(vec![
        Command::Data(owner.point().sec(true)),
        Command::Op(Opcode::OP_CHECKSIG),
    ]);
    let witness_raw = witness_script.raw_serialize().unwrap();
    let (cache, txid) = fund(vec![TxOut::new(12_345, p2wsh_script(&sha256(&witness_raw)))]);

    let mut tx = spend(txid, 0, 12_000);
    let hashes = SegwitHashes::new(&tx).unwrap();
    let z = tx.sig_hash_bip143(0, &hashes, &witness_script, &cache).unwrap();
    tx.inputs[0].witness = vec![sig_with_type(&owner, &z), witness_raw.clone()];
    tx.segwit = true;

    assert_eq!(tx.classify_input(0, &cache).unwrap(), SpendKind::P2wsh);
    assert!(tx.verify(&cache).unwrap());

    // Swapping the witness script breaks the program hash
    tx.inputs[0].witness[1] = Script::new(vec![Command::Op(Opcode::OP_1)]).raw_serialize().unwrap();
    assert!(!tx.verify_input(0, &cache).unwrap());
}

#[test]
fn p2sh_p2wsh_spend() {
    let owner = key(777_001);
    let witness_script = Script::new(vec![
        Command::Data(owner.point().sec(true)),
        Command::Op(Opcode::OP_CHECKSIG),
    ]);
    let witness_raw = witness_script.raw_serialize().unwrap();
    let redeem_raw = p2wsh_script(&sha256(&witness_raw)).raw_serialize().unwrap();
    let (cache, txid) = fund(vec![TxOut::new(33_000, p2sh_script(&hash160(&redeem_raw)))]);

    let mut tx = spend(txid, 0, 32_000);
    let hashes = SegwitHashes::new(&tx).unwrap();
    let z = tx.sig_hash_bip143(0, &hashes, &witness_script, &cache).unwrap();
    tx.inputs[0].script_sig = Script::new(vec![Command::Data(redeem_raw)]);
    tx.inputs[0].witness = vec![sig_with_type(&owner, &z), witness_raw];
    tx.segwit = true;

    assert_eq!(tx.classify_input(0, &cache).unwrap(), SpendKind::P2shP2wsh);
    assert!(tx.verify(&cache).unwrap());

    let reparsed = Tx::parse_bytes(&tx.serialize().unwrap()).unwrap();
    assert!(reparsed.verify(&cache).unwrap());

    // A different witness script no longer matches the nested program
    let other = Script::new(vec![
        Command::Data(key(9).point().sec(true)),
        Command::Op(Opcode::OP_CHECKSIG),
    ]);
    tx.inputs[0].witness[1] = other.raw_serialize().unwrap();
    assert!(!tx.verify_input(0, &cache).unwrap());
}

#[test]
fn cache_json_roundtrip_keeps_lookups() {
    let owner = key(8_888);
    let (cache, txid) = fund(vec![TxOut::new(5_000, p2pkh_script(&owner.point().hash160(true)))]);

    let json = cache.dump_json().unwrap();
    let loaded = TxCache::load_json(&json).unwrap();
    assert_eq!(loaded.fetch(&txid), cache.fetch(&txid));

    let mut tx = spend(txid, 0, 4_000);
    assert!(tx.sign_input(0, &owner, &loaded).unwrap());
    assert_eq!(tx.fee(&loaded).unwrap(), 1_000);
}

#[test]
fn addresses_for_spent_scripts() {
    let owner = key(12_345);
    let h160 = owner.point().hash160(true);
    assert_eq!(
        p2pkh_script(&h160).address(Network::Mainnet).unwrap(),
        owner.point().address(true, Network::Mainnet)
    );
    assert!(p2wpkh_script(&h160).address(Network::Testnet).unwrap().starts_with("tb1q"));
    assert_eq!(
        signer_core::address_to_script(&p2sh_script(&h160).address(Network::Mainnet).unwrap(), Network::Mainnet)
            .unwrap(),
        p2sh_script(&h160)
    );
}
