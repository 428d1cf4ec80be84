//! Reference tests running generated routines and comparing exact bytes.
//!
//! Each test generates the routines for one request, loads them into a
//! fresh machine and checks the resulting memory, return values or halt.

use anyhow::anyhow;
use num_bigint::{BigInt, BigUint};
use num_traits::One;

use solty::abi::{AbiFunctions, EncodingOptions, RoutineCache};
use solty::types::{DataLocation, Type, TypeRef, TypeRegistry};
use solty::vm::{Halt, Machine, Word};

fn word(value: u64) -> Word {
    Word::from(value)
}

fn bytes_of(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn read(machine: &mut Machine, from: u64, len: u64) -> Result<Vec<u8>, anyhow::Error> {
    Ok(machine.memory_mut().read(&word(from), &word(len))?)
}

/// Struct `{uint128 a; uint128 b; uint256 c;}` shares slot 0 between `a` and `b`.
#[test]
fn test_struct_members_pack_into_slots() -> Result<(), anyhow::Error> {
    let mut reg = TypeRegistry::new();
    let id = reg.declare_struct("S", None)?;
    reg.define_struct(
        id,
        vec![
            ("a".into(), Type::uint(128)),
            ("b".into(), Type::uint(128)),
            ("c".into(), Type::uint256()),
        ],
    )?;
    let members = reg.struct_storage_members(id)?;
    let a = members.member_storage_offset(&reg, "a")?.cloned().ok_or_else(|| anyhow!("a"))?;
    let b = members.member_storage_offset(&reg, "b")?.cloned().ok_or_else(|| anyhow!("b"))?;
    let c = members.member_storage_offset(&reg, "c")?.cloned().ok_or_else(|| anyhow!("c"))?;
    assert_eq!((a.slot.clone(), a.offset), (BigUint::from(0u8), 0));
    assert_eq!((b.slot.clone(), b.offset), (BigUint::from(0u8), 16));
    assert_eq!((c.slot.clone(), c.offset), (BigUint::from(1u8), 0));
    assert_eq!(members.storage_size(&reg)?, BigUint::from(2u8));

    // Copy the struct out of storage into ABI encoded memory.
    let storage = Type::struct_type(id, "S", DataLocation::Storage);
    let memory = storage.with_location(DataLocation::Memory, true);
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[storage], &[memory], false)?;
    let mut machine = Machine::new(cache.routines().cloned());
    let base = word(5);
    machine.sstore(base.clone(), word(0x22).shl(&word(128)).or(&word(0x11)));
    machine.sstore(word(6), word(0x33));
    let tail = machine.call(&encoder, &[word(0x80), base])?;
    assert_eq!(tail, vec![word(0x80 + 96)]);
    assert_eq!(read(&mut machine, 0x80, 96)?, bytes_of(&[word(0x11), word(0x22), word(0x33)]));
    Ok(())
}

/// `uint8[3]` fits one slot and is read back element by element.
#[test]
fn test_small_static_array_in_storage() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let three = Type::array(DataLocation::Storage, Type::uint(8), Some(3u8.into()));
    let forty = Type::array(DataLocation::Storage, Type::uint(8), Some(40u8.into()));
    assert_eq!(three.storage_size(&reg)?, BigUint::one());
    assert_eq!(forty.storage_size(&reg)?, BigUint::from(2u8));

    let target = three.with_location(DataLocation::Memory, true);
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[three], &[target], false)?;
    let mut machine = Machine::new(cache.routines().cloned());
    machine.sstore(word(0), word(0x03_02_01));
    machine.call(&encoder, &[word(0x80), word(0)])?;
    assert_eq!(read(&mut machine, 0x80, 96)?, bytes_of(&[word(1), word(2), word(3)]));
    Ok(())
}

/// `uint8[]` of 33 elements: one full slot of 32 items, then one item in the last slot.
#[test]
fn test_packed_dynamic_array_spills_into_last_slot() -> Result<(), anyhow::Error> {
    use sha3::{Digest, Keccak256};

    let reg = TypeRegistry::new();
    let array = Type::array(DataLocation::Storage, Type::uint(8), None);
    let target = array.with_location(DataLocation::Memory, true);
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[array], &[target], false)?;
    let mut machine = Machine::new(cache.routines().cloned());

    let data = Word::from_be_slice(&Keccak256::digest(word(0).to_be_bytes()));
    let mut first = Word::zero();
    for i in 0..32u64 {
        first = first.or(&word(i + 1).shl(&word(8 * i)));
    }
    machine.sstore(word(0), word(33));
    machine.sstore(data.clone(), first);
    machine.sstore(data.add(&word(1)), word(33));

    let tail = machine.call(&encoder, &[word(0x80), word(0)])?;
    assert_eq!(tail, vec![word(0x80 + 0x40 + 33 * 0x20)]);
    let mut expected = vec![word(0x20), word(33)];
    expected.extend((1..=33u64).map(word));
    assert_eq!(read(&mut machine, 0x80, 0x40 + 33 * 0x20)?, bytes_of(&expected));
    Ok(())
}

/// `uint128[3]` packs two items per slot, the third alone in the second slot.
#[test]
fn test_odd_length_packed_array() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let array = Type::array(DataLocation::Storage, Type::uint(128), Some(3u8.into()));
    assert_eq!(array.storage_size(&reg)?, BigUint::from(2u8));

    let target = array.with_location(DataLocation::Memory, true);
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[array], &[target], false)?;
    let mut machine = Machine::new(cache.routines().cloned());
    machine.sstore(word(7), word(0xbb).shl(&word(128)).or(&word(0xaa)));
    machine.sstore(word(8), word(0xcc));

    let tail = machine.call(&encoder, &[word(0x80), word(7)])?;
    assert_eq!(tail, vec![word(0x80 + 96)]);
    assert_eq!(read(&mut machine, 0x80, 96)?, bytes_of(&[word(0xaa), word(0xbb), word(0xcc)]));
    Ok(())
}

/// `bytes` of length 3 encodes as length word plus one zero padded data word.
#[test]
fn test_dynamic_bytes_are_padded() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let bytes = Type::bytes_memory();
    let mut cache = RoutineCache::new();
    let (tuple, single) = {
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let tuple = abi.tuple_encoder(&[bytes.clone()], &[bytes.clone()], false)?;
        let single = abi.abi_encoding_function(&bytes, &bytes, EncodingOptions::default())?;
        (tuple, single)
    };
    let mut machine = Machine::new(cache.routines().cloned());

    // Length 3, then data followed by garbage that must not leak into the padding.
    let mut value = word(3).to_be_bytes().to_vec();
    value.extend([0xaa, 0xbb, 0xcc]);
    value.extend([0xff; 29]);
    let ptr = machine.allocate(&value)?;
    assert_eq!(ptr, word(0x80));

    let end = machine.call(&single, &[ptr.clone(), word(0x100)])?;
    assert_eq!(end, vec![word(0x140)]);
    let mut expected = word(3).to_be_bytes().to_vec();
    expected.extend([0xaa, 0xbb, 0xcc]);
    expected.extend([0u8; 29]);
    assert_eq!(read(&mut machine, 0x100, 64)?, expected);

    let tail = machine.call(&tuple, &[word(0x200), ptr])?;
    assert_eq!(tail, vec![word(0x260)]);
    let mut encoded = word(0x20).to_be_bytes().to_vec();
    encoded.extend(expected);
    assert_eq!(read(&mut machine, 0x200, 96)?, encoded);
    Ok(())
}

/// A head offset of 2^64 is rejected before any memory is allocated.
#[test]
fn test_oversized_offset_is_rejected() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let array = Type::array(DataLocation::Memory, Type::uint256(), None);
    let mut cache = RoutineCache::new();
    let decoder = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&[array], false)?;

    let offset = Word::new(BigUint::one() << 64u32);
    let calldata = bytes_of(&[offset, word(1), word(1)]);
    let size = calldata.len() as u64;
    let mut machine = Machine::new(cache.routines().cloned()).with_calldata(calldata);
    let before = machine.memory().as_bytes().to_vec();
    assert_eq!(machine.call(&decoder, &[word(0), word(size)]), Err(Halt::Revert));
    assert_eq!(machine.memory().as_bytes(), before.as_slice());
    assert_eq!(machine.free_memory_pointer()?, word(0x80));
    Ok(())
}

/// `int16(-1)` widened to `int256` is sign extended.
#[test]
fn test_signed_values_are_sign_extended() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let mut cache = RoutineCache::new();
    let (encoder, decode_wide, decode_narrow) = {
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        (
            abi.tuple_encoder(&[Type::int(16)], &[Type::int(256)], false)?,
            abi.tuple_decoder(&[Type::int(256)], false)?,
            abi.tuple_decoder(&[Type::int(16)], false)?,
        )
    };
    let all_ones = Word::from_signed(&BigInt::from(-1));

    // The stack word carries only the low 16 bits.
    let mut machine = Machine::new(cache.routines().cloned());
    machine.call(&encoder, &[word(0x80), word(0xffff)])?;
    assert_eq!(read(&mut machine, 0x80, 32)?, vec![0xff; 32]);

    let mut machine = Machine::new(cache.routines().cloned()).with_calldata(vec![0xff; 32]);
    assert_eq!(machine.call(&decode_wide, &[word(0), word(32)])?, vec![all_ones.clone()]);
    assert_eq!(machine.call(&decode_narrow, &[word(0), word(32)])?, vec![all_ones]);

    // A zero extended int16 is not canonical.
    let mut machine =
        Machine::new(cache.routines().cloned()).with_calldata(word(0xffff).to_be_bytes().to_vec());
    assert_eq!(machine.call(&decode_narrow, &[word(0), word(32)]), Err(Halt::Revert));
    Ok(())
}

#[test]
fn test_value_tuple_encoding_cleans_inputs() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let types: Vec<TypeRef> = vec![Type::uint(8), Type::boolean(), Type::address()];
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&types, &types, false)?;
    let mut machine = Machine::new(cache.routines().cloned());
    let dirty_address = word(0xab).shl(&word(160)).or(&word(0x1234));
    let tail = machine.call(&encoder, &[word(0x80), word(0x107), word(42), dirty_address])?;
    assert_eq!(tail, vec![word(0x80 + 96)]);
    assert_eq!(read(&mut machine, 0x80, 96)?, bytes_of(&[word(7), word(1), word(0x1234)]));
    Ok(())
}

#[test]
fn test_packed_encoding() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let types: Vec<TypeRef> = vec![Type::uint(8), Type::boolean(), Type::bytes_memory(), Type::uint(16)];
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder_packed(&types, &types)?;
    let mut machine = Machine::new(cache.routines().cloned());
    let mut value = word(3).to_be_bytes().to_vec();
    value.extend([0xaa, 0xbb, 0xcc]);
    let ptr = machine.allocate(&value)?;
    let end = machine.call(&encoder, &[word(0x200), word(7), word(1), ptr, word(0xbeef)])?;
    assert_eq!(end, vec![word(0x200 + 7)]);
    assert_eq!(read(&mut machine, 0x200, 7)?, vec![0x07, 0x01, 0xaa, 0xbb, 0xcc, 0xbe, 0xef]);
    Ok(())
}

#[test]
fn test_short_storage_bytes_are_encoded() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let from = Type::bytes(DataLocation::Storage);
    let to = Type::bytes_memory();
    let mut cache = RoutineCache::new();
    let encoder = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[from], &[to], false)?;
    let mut machine = Machine::new(cache.routines().cloned());

    // Short layout: data left aligned, 2 * length in the lowest byte.
    let mut slot = [0u8; 32];
    slot[0] = b'a';
    slot[1] = b'b';
    slot[2] = b'c';
    slot[31] = 6;
    machine.sstore(word(1), Word::from_be_slice(&slot));
    let tail = machine.call(&encoder, &[word(0x80), word(1)])?;
    assert_eq!(tail, vec![word(0x80 + 96)]);
    let mut expected = bytes_of(&[word(0x20), word(3)]);
    expected.extend(b"abc");
    expected.extend([0u8; 29]);
    assert_eq!(read(&mut machine, 0x80, 96)?, expected);
    Ok(())
}

#[test]
fn test_decoding_arrays_and_bytes() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let array = Type::array(DataLocation::Memory, Type::uint256(), None);
    let bytes = Type::bytes_memory();
    let mut cache = RoutineCache::new();
    let decoder = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&[array, bytes], false)?;

    let mut calldata = bytes_of(&[word(0x40), word(0xa0), word(2), word(5), word(6), word(3)]);
    calldata.extend([0xaa, 0xbb, 0xcc]);
    calldata.extend([0u8; 29]);
    let size = calldata.len() as u64;
    let mut machine = Machine::new(cache.routines().cloned()).with_calldata(calldata);
    let values = machine.call(&decoder, &[word(0), word(size)])?;
    assert_eq!(values, vec![word(0x80), word(0xe0)]);
    assert_eq!(read(&mut machine, 0x80, 96)?, bytes_of(&[word(2), word(5), word(6)]));
    let mut expected = word(3).to_be_bytes().to_vec();
    expected.extend([0xaa, 0xbb, 0xcc]);
    expected.extend([0u8; 29]);
    assert_eq!(read(&mut machine, 0xe0, 64)?, expected);
    assert_eq!(machine.free_memory_pointer()?, word(0x120));
    Ok(())
}

#[test]
fn test_decoding_rejects_dirty_values() -> Result<(), anyhow::Error> {
    let mut reg = TypeRegistry::new();
    let color = reg.declare_enum("Color", None, vec!["Red".into(), "Green".into()])?;
    let types = vec![Type::boolean(), Type::enum_type(color, "Color")];
    let mut cache = RoutineCache::new();
    let decoder = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&types, false)?;
    let routines: Vec<_> = cache.routines().cloned().collect();

    let run = |calldata: Vec<u8>| {
        let size = calldata.len() as u64;
        Machine::new(routines.clone())
            .with_calldata(calldata)
            .call(&decoder, &[word(0), word(size)])
    };
    assert_eq!(run(bytes_of(&[word(1), word(1)])), Ok(vec![word(1), word(1)]));
    assert_eq!(run(bytes_of(&[word(2), word(1)])), Err(Halt::Revert));
    assert_eq!(run(bytes_of(&[word(1), word(2)])), Err(Halt::Revert));
    assert_eq!(run(bytes_of(&[word(1)])), Err(Halt::Revert));
    Ok(())
}

#[test]
fn test_rendered_encoder_text() -> Result<(), anyhow::Error> {
    let reg = TypeRegistry::new();
    let mut cache = RoutineCache::new();
    let name = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&[Type::uint(8)], &[Type::uint(8)], false)?;
    assert_eq!(name, "abi_encode_tuple_t_uint8__to_t_uint8__fromStack");
    let requested = cache.requested_functions();
    assert!(requested.externally_used.contains(&name));
    let text = requested.render();
    assert!(text.contains("function abi_encode_tuple_t_uint8__to_t_uint8__fromStack(headStart, value0) -> tail {"));
    assert!(text.contains("function cleanup_t_uint8(value) -> cleaned {"));
    assert!(cache.is_empty());
    Ok(())
}
