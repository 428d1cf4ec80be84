//! Property-based tests for generated encoders and decoders and for
//! storage packing.
//!
//! Encoders and decoders are executed on the routine interpreter; the
//! properties compare their results with the rules of the type model.

use num_bigint::{BigInt, BigUint};
use num_traits::One;
use proptest::prelude::*;

use solty::abi::{AbiFunctions, RoutineCache};
use solty::layout::StorageOffsets;
use solty::types::{DataLocation, Type, TypeRef, TypeRegistry};
use solty::vm::{Halt, Machine, Word};

fn word(value: u64) -> Word {
    Word::from(value)
}

/// Stack value with garbage above the low `bits`.
fn dirty(value: u128, garbage: u64, bits: u16) -> Word {
    let value = Word::new(BigUint::from(value));
    if bits >= 256 {
        return value;
    }
    let low = Word::new((BigUint::one() << bits) - 1u8);
    let high = Word::from(garbage).shl(&word(u64::from(bits)));
    value.and(&low).or(&high)
}

/// Encodes `value` of `ty` from the stack, then decodes the result as call data.
fn round_trip(ty: &TypeRef, value: Word) -> Result<(Vec<u8>, Vec<Word>), anyhow::Error> {
    let reg = TypeRegistry::new();
    let mut cache = RoutineCache::new();
    let mut abi = AbiFunctions::new(&reg, &mut cache);
    let types = vec![ty.clone()];
    let encoder = abi.tuple_encoder(&types, &types, false)?;
    let decoder = abi.tuple_decoder(&types, false)?;
    let routines: Vec<_> = cache.routines().cloned().collect();

    let mut machine = Machine::new(routines.clone());
    machine.call(&encoder, &[word(0x80), value])?;
    let encoded = machine.memory_mut().read(&word(0x80), &word(32))?;
    let decoded = Machine::new(routines)
        .with_calldata(encoded.clone())
        .call(&decoder, &[word(0), word(32)])?;
    Ok((encoded, decoded))
}

fn value_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        (1u16..=32).prop_map(|n| Type::uint(8 * n)),
        (1u16..=32).prop_map(|n| Type::int(8 * n)),
        (1u8..=32).prop_map(Type::fixed_bytes),
        Just(Type::boolean()),
        Just(Type::address()),
    ]
}

/// Value types mixed with dynamically encoded and static memory references.
fn tuple_member() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        3 => value_type(),
        1 => Just(Type::bytes_memory()),
        1 => Just(Type::string_memory()),
        1 => Just(Type::array(DataLocation::Memory, Type::uint256(), None)),
        1 => Just(Type::array(DataLocation::Memory, Type::uint(8), Some(3u8.into()))),
        1 => Just(Type::array(DataLocation::Memory, Type::string_memory(), Some(2u8.into()))),
    ]
}

fn storable_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        4 => value_type(),
        1 => (1u8..=70).prop_map(|n| Type::array(DataLocation::Storage, Type::uint(8), Some(n.into()))),
        1 => Just(Type::array(DataLocation::Storage, Type::uint256(), None)),
        1 => Just(Type::bytes(DataLocation::Storage)),
        1 => Just(Type::mapping(Type::address(), Type::uint256())),
    ]
}

proptest! {
    #[test]
    fn unsigned_values_round_trip_cleaned(n in 1u16..=32, value: u128, garbage: u64) {
        let bits = 8 * n;
        let ty = Type::uint(bits);
        let (encoded, decoded) = round_trip(&ty, dirty(value, garbage, bits)).unwrap();
        let expected = dirty(value, 0, bits);
        prop_assert_eq!(encoded, expected.to_be_bytes().to_vec());
        prop_assert_eq!(decoded, vec![expected]);
    }

    #[test]
    fn signed_values_round_trip_sign_extended(n in 1u16..=16, value: i128) {
        let bits = 8 * n;
        let ty = Type::int(bits);
        // Truncate to `bits`, then sign extend the way the value is held canonically.
        let modulus = BigInt::one() << bits;
        let mut truncated = BigInt::from(value) % &modulus;
        if truncated < BigInt::from(0) {
            truncated += &modulus;
        }
        if truncated >= (&modulus >> 1u32) {
            truncated -= &modulus;
        }
        let canonical = Word::from_signed(&truncated);
        let (encoded, decoded) = round_trip(&ty, canonical.clone()).unwrap();
        prop_assert_eq!(encoded, canonical.to_be_bytes().to_vec());
        prop_assert_eq!(decoded, vec![canonical]);
    }

    #[test]
    fn fixed_bytes_keep_only_their_prefix(n in 1u8..=31, seed: u64) {
        let ty = Type::fixed_bytes(n);
        let full = Word::new((BigUint::one() << 256u32) - 1u8).xor(&word(seed));
        let (encoded, decoded) = round_trip(&ty, full.clone()).unwrap();
        let full_bytes = full.to_be_bytes();
        for (i, byte) in encoded.iter().enumerate() {
            let expected = if i < usize::from(n) { full_bytes.get(i).copied().unwrap_or(0) } else { 0 };
            prop_assert_eq!(*byte, expected);
        }
        prop_assert_eq!(decoded, vec![Word::from_be_slice(&encoded)]);
    }

    #[test]
    fn static_tuples_fill_exactly_the_head(types in prop::collection::vec(value_type(), 0..6)) {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let head = abi.head_size(&types).unwrap();
        prop_assert_eq!(head, 32 * types.len() as u64);
        let encoder = abi.tuple_encoder(&types, &types, false).unwrap();
        let mut args = vec![word(0x80)];
        args.extend(types.iter().map(|_| word(1)));
        let tail = Machine::new(cache.routines().cloned()).call(&encoder, &args).unwrap();
        prop_assert_eq!(tail, vec![word(0x80 + head)]);
    }

    #[test]
    fn first_tail_offset_is_the_head_size(types in prop::collection::vec(tuple_member(), 1..6)) {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let head = abi.head_size(&types).unwrap();
        let encoder = abi.tuple_encoder(&types, &types, false).unwrap();
        let decoder = abi.tuple_decoder(&types, false).unwrap();
        let routines: Vec<_> = cache.routines().cloned().collect();

        // Reference values all point at zeroed memory: empty and all-zero values.
        let zeroed = word(0x1000);
        let mut args = vec![word(0x80)];
        args.extend(types.iter().map(|t| if t.is_value_type() { word(1) } else { zeroed.clone() }));
        let mut machine = Machine::new(routines.clone());
        let tail = machine.call(&encoder, &args).unwrap();
        let end = tail.first().cloned().unwrap_or_default();

        let mut position = 0u64;
        let mut first_dynamic = None;
        for ty in &types {
            if ty.is_dynamically_encoded(&reg).unwrap() && first_dynamic.is_none() {
                first_dynamic = Some(position);
            }
            position += ty.calldata_head_size(&reg).unwrap();
        }
        prop_assert_eq!(position, head);
        match first_dynamic {
            Some(at) => {
                let offset = machine.memory_mut().load(&word(0x80 + at)).unwrap();
                prop_assert_eq!(offset, word(head));
            }
            None => {
                prop_assert_eq!(end.clone(), word(0x80 + head));
            }
        }

        let size = end.sub(&word(0x80)).to_usize().unwrap();
        let encoded = machine.memory_mut().read(&word(0x80), &word(size as u64)).unwrap();
        let decoded = Machine::new(routines)
            .with_calldata(encoded)
            .call(&decoder, &[word(0), word(size as u64)]);
        prop_assert!(decoded.is_ok());
    }

    #[test]
    fn short_input_is_rejected(types in prop::collection::vec(value_type(), 1..6), cut in 1usize..32) {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let decoder = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&types, false).unwrap();
        let size = 32 * types.len() - cut;
        let result = Machine::new(cache.routines().cloned())
            .with_calldata(vec![0u8; size])
            .call(&decoder, &[word(0), word(size as u64)]);
        prop_assert_eq!(result, Err(Halt::Revert));
    }

    #[test]
    fn offsets_at_or_above_two_to_the_64_are_rejected(extra: u64, dynamic in 0usize..3) {
        let reg = TypeRegistry::new();
        let ty = match dynamic {
            0 => Type::bytes_memory(),
            1 => Type::string_memory(),
            _ => Type::array(DataLocation::Memory, Type::uint(8), None),
        };
        let mut cache = RoutineCache::new();
        let decoder = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&[ty], false).unwrap();
        let offset = Word::new((BigUint::one() << 64u32) + extra);
        let calldata: Vec<u8> = [offset, word(0)].iter().flat_map(|w| w.to_be_bytes()).collect();
        let result = Machine::new(cache.routines().cloned())
            .with_calldata(calldata)
            .call(&decoder, &[word(0), word(64)]);
        prop_assert_eq!(result, Err(Halt::Revert));
    }

    #[test]
    fn storage_packing_invariants(types in prop::collection::vec(storable_type(), 0..12)) {
        let reg = TypeRegistry::new();
        let offsets = StorageOffsets::compute(&reg, &types).unwrap();
        let again = StorageOffsets::compute(&reg, &types).unwrap();
        prop_assert_eq!(&offsets, &again);

        let mut previous: Option<(BigUint, u8, usize)> = None;
        for (index, ty) in types.iter().enumerate() {
            let position = offsets.offset(index).unwrap();
            let bytes = ty.storage_bytes(&reg).unwrap();
            let slots = ty.storage_size(&reg).unwrap();
            prop_assert!(usize::from(position.offset) + bytes.min(32) <= 32);
            if slots > BigUint::one() || bytes >= 32 {
                prop_assert_eq!(position.offset, 0);
            }
            if let Some((slot, offset, size)) = &previous {
                // Each member starts after the previous one ends.
                let after_previous = position.slot > *slot
                    || (position.slot == *slot && usize::from(position.offset) >= usize::from(*offset) + size);
                prop_assert!(after_previous);
            }
            previous = Some((position.slot.clone() + slots - 1u8, position.offset, bytes.min(32)));
        }
        let expected_size = match &previous {
            Some((last_slot, _, _)) => last_slot.clone() + 1u8,
            None => BigUint::from(0u8),
        };
        prop_assert_eq!(offsets.storage_size(), &expected_size);
    }

    #[test]
    fn appending_a_member_never_shrinks_storage(
        types in prop::collection::vec(storable_type(), 0..8),
        extra in storable_type(),
    ) {
        let reg = TypeRegistry::new();
        let before = StorageOffsets::compute(&reg, &types).unwrap();
        let mut longer = types.clone();
        longer.push(extra);
        let after = StorageOffsets::compute(&reg, &longer).unwrap();
        prop_assert!(after.storage_size() >= before.storage_size());
        prop_assert!(*after.storage_size() >= BigUint::one());
    }
}
