use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::hash::Hasher;

use proptest::prelude::*;
use siphasher::sip::SipHasher;

use crate::HashMap;

/// Hashes a key to `key / 32`, so runs of 32 keys share one hash.
#[derive(Clone, Default)]
struct CoarseHashBuilder;

#[derive(Default)]
struct CoarseHasher(u64);

impl Hasher for CoarseHasher {
    fn finish(&self) -> u64 {
        self.0 / 32
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | b as u64;
        }
    }

    fn write_u16(&mut self, n: u16) {
        self.0 = n as u64;
    }
}

impl BuildHasher for CoarseHashBuilder {
    type Hasher = CoarseHasher;

    fn build_hasher(&self) -> Self::Hasher {
        CoarseHasher::default()
    }
}

#[derive(Clone, Default)]
struct SipHashBuilder;

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new_with_keys(0x0123_4567, 0x89AB_CDEF)
    }
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, u32),
    Remove(u16),
    Get(u16),
    Retain(u16),
    Shrink,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u16..512;
    let op = prop_oneof![
        50 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        25 => key.clone().prop_map(Op::Remove),
        22 => key.clone().prop_map(Op::Get),
        2 => (2u16..8).prop_map(Op::Retain),
        1 => Just(Op::Shrink),
    ];
    prop::collection::vec(op, 0..=2000)
}

fn run<S: BuildHasher>(ops: Vec<Op>, mut map: HashMap<u16, u32, S>) -> Result<(), TestCaseError> {
    let mut model: BTreeMap<u16, u32> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                prop_assert_eq!(map.insert(key, value), model.insert(key, value));
            }
            Op::Remove(key) => {
                prop_assert_eq!(map.remove(&key), model.remove(&key));
            }
            Op::Get(key) => {
                prop_assert_eq!(map.get(&key), model.get(&key));
            }
            Op::Retain(modulus) => {
                map.retain(|k, _| k % modulus != 0);
                model.retain(|k, _| k % modulus != 0);
            }
            Op::Shrink => {
                map.shrink_to_fit();
                map.check_invariants();
            }
        }
        prop_assert_eq!(map.len(), model.len());
    }

    map.check_invariants();

    let mut pairs = map.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>();
    pairs.sort();
    let expected = model.into_iter().collect::<Vec<_>>();
    prop_assert_eq!(pairs, expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_colliding(ops in ops_strategy()) {
        run(ops, HashMap::with_hasher(CoarseHashBuilder))?;
    }

    #[test]
    fn prop_equivalence_sip(ops in ops_strategy()) {
        run(ops, HashMap::with_hasher(SipHashBuilder))?;
    }
}
