//! Serialized form: `(bucket count, load factor, len, [(key, value), ..])`.
//!
//! The bucket count is informational. A deserialized map presizes from
//! the declared length, capped at `PRESIZE_LIMIT` entries and with the
//! load factor clamped, then grows as entries actually arrive. A document
//! cannot reserve more than that bound up front.

use crate::config::MapConfig;
use crate::hashing::defensive_capacity_for_len;
use crate::hooks::NodeHooks;
use crate::map::TreeBinMap;
use crate::ordered::OrderedTreeBinMap;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// Most entries a declared length may presize for.
const PRESIZE_LIMIT: usize = 4096;

struct Entries<'a, K, V, S, H>(&'a TreeBinMap<K, V, S, H>);

impl<K, V, S, H> Serialize for Entries<'_, K, V, S, H>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

impl<K, V, S, H> Serialize for TreeBinMap<K, V, S, H>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let mut state = serializer.serialize_tuple(4)?;
        state.serialize_element(&self.capacity())?;
        state.serialize_element(&self.load_factor())?;
        state.serialize_element(&self.len())?;
        state.serialize_element(&Entries(self))?;
        state.end()
    }
}

/// Streams pairs straight into the map under construction and reports
/// how many were read.
struct EntriesSeed<'a, K, V, S, H>(&'a mut TreeBinMap<K, V, S, H>);

impl<'de, K, V, S, H> DeserializeSeed<'de> for EntriesSeed<'_, K, V, S, H>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    type Value = usize;

    fn deserialize<D>(self, deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, K, V, S, H> Visitor<'de> for EntriesSeed<'_, K, V, S, H>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    type Value = usize;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of key-value pairs")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<usize, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut read = 0usize;
        while let Some((k, v)) = seq.next_element::<(K, V)>()? {
            self.0.put_val(k, v, false, false);
            read += 1;
        }
        Ok(read)
    }
}

struct MapVisitor<K, V, S, H>(PhantomData<(K, V, S, H)>);

impl<'de, K, V, S, H> Visitor<'de> for MapVisitor<K, V, S, H>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
    H: NodeHooks<K, V> + Default,
{
    type Value = TreeBinMap<K, V, S, H>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a (buckets, load factor, len, entries) tuple")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let _buckets: usize = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let load_factor: f32 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        let declared: usize = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(2, &self))?;

        MapConfig::new()
            .load_factor(load_factor)
            .validate()
            .map_err(de::Error::custom)?;
        let (capacity, _) =
            defensive_capacity_for_len(declared.min(PRESIZE_LIMIT), load_factor);
        let config = MapConfig::new()
            .load_factor(load_factor)
            .initial_capacity(capacity);
        let mut map = TreeBinMap::with_config_and_hasher(config, S::default())
            .map_err(de::Error::custom)?
            .with_hooks(H::default());

        let read = seq
            .next_element_seed(EntriesSeed(&mut map))?
            .ok_or_else(|| de::Error::invalid_length(3, &self))?;
        if read != declared {
            return Err(de::Error::custom(format_args!(
                "declared {declared} entries but found {read}"
            )));
        }
        if map.len() != declared {
            return Err(de::Error::custom(format_args!(
                "declared {declared} entries but {} are distinct",
                map.len()
            )));
        }
        Ok(map)
    }
}

impl<'de, K, V, S, H> Deserialize<'de> for TreeBinMap<K, V, S, H>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
    H: NodeHooks<K, V> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(4, MapVisitor(PhantomData))
    }
}

impl<K, V, S, H> Serialize for OrderedTreeBinMap<K, V, S, H>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        (**self).serialize(serializer)
    }
}

impl<'de, K, V, S, H> Deserialize<'de> for OrderedTreeBinMap<K, V, S, H>
where
    K: Deserialize<'de> + Ord + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
    H: NodeHooks<K, V> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        TreeBinMap::<K, V, S, H>::deserialize(deserializer).map(TreeBinMap::with_key_order)
    }
}
