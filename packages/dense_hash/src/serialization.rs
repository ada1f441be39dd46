//! Serialization of the collections: a [`Dictionary`] is a map and a [`Set`] is a sequence.
//!
//! Deserialization builds the collection with the default comparer and provider, presized
//! from the length hint of the input. Repeated keys or items in the input are rejected.

use std::fmt;
use std::marker::PhantomData;

use buffer_pool::PoolProvider;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, Serializer};

use crate::{Dictionary, Error, KeyComparer, Set};

// Hints come from the input, so they only presize up to this many entries.
const MAX_PRESIZED_ENTRIES: usize = 1 << 16;

impl<K, V, C, A> Serialize for Dictionary<K, V, C, A>
where
    K: Serialize + 'static,
    V: Serialize + 'static,
    A: PoolProvider,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map_err(ser::Error::custom)?)
    }
}

impl<T, C, A> Serialize for Set<T, C, A>
where
    T: Serialize + 'static,
    A: PoolProvider,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_slice().map_err(ser::Error::custom)?)
    }
}

impl<'de, K, V, C, A> Deserialize<'de> for Dictionary<K, V, C, A>
where
    K: Deserialize<'de> + 'static,
    V: Deserialize<'de> + 'static,
    C: KeyComparer<K> + Default,
    A: PoolProvider + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DictionaryVisitor {
            _marker: PhantomData,
        })
    }
}

impl<'de, T, C, A> Deserialize<'de> for Set<T, C, A>
where
    T: Deserialize<'de> + 'static,
    C: KeyComparer<T> + Default,
    A: PoolProvider + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(SetVisitor {
            _marker: PhantomData,
        })
    }
}

struct DictionaryVisitor<K, V, C, A> {
    _marker: PhantomData<fn() -> (K, V, C, A)>,
}

impl<'de, K, V, C, A> Visitor<'de> for DictionaryVisitor<K, V, C, A>
where
    K: Deserialize<'de> + 'static,
    V: Deserialize<'de> + 'static,
    C: KeyComparer<K> + Default,
    A: PoolProvider + Default,
{
    type Value = Dictionary<K, V, C, A>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map with unique keys")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let capacity = map.size_hint().unwrap_or(0).min(MAX_PRESIZED_ENTRIES);

        let mut dictionary =
            Dictionary::with_capacity_and_comparer_in(capacity, C::default(), A::default())
                .map_err(de::Error::custom)?;

        while let Some((key, value)) = map.next_entry()? {
            dictionary.insert(key, value).map_err(de::Error::custom)?;
        }

        Ok(dictionary)
    }
}

struct SetVisitor<T, C, A> {
    _marker: PhantomData<fn() -> (T, C, A)>,
}

impl<'de, T, C, A> Visitor<'de> for SetVisitor<T, C, A>
where
    T: Deserialize<'de> + 'static,
    C: KeyComparer<T> + Default,
    A: PoolProvider + Default,
{
    type Value = Set<T, C, A>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a sequence of unique items")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
        let capacity = seq.size_hint().unwrap_or(0).min(MAX_PRESIZED_ENTRIES);

        let mut set = Set::with_capacity_and_comparer_in(capacity, C::default(), A::default())
            .map_err(de::Error::custom)?;

        while let Some(item) = seq.next_element()? {
            if !set.insert(item).map_err(de::Error::custom)? {
                return Err(de::Error::custom(Error::DuplicateKey));
            }
        }

        Ok(set)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn dictionary_round_trip() {
        let dictionary: Dictionary<String, Vec<u8>> = [
            ("empty".to_string(), vec![]),
            ("bytes".to_string(), vec![1, 2, 3]),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&dictionary).unwrap();
        assert_eq!(json, r#"{"empty":[],"bytes":[1,2,3]}"#);

        let restored: Dictionary<String, Vec<u8>> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, dictionary);
        restored.integrity_check();
    }

    #[test]
    fn set_round_trip() {
        let set: Set<i64> = [-1, 0, 1].into_iter().collect();

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[-1,0,1]");

        let restored: Set<i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn duplicates_are_rejected() {
        let dictionary = serde_json::from_str::<Dictionary<String, u8>>(r#"{"a":1,"a":2}"#);
        assert!(dictionary.unwrap_err().to_string().contains("equal key"));

        let set = serde_json::from_str::<Set<u8>>("[1,2,1]");
        assert!(set.unwrap_err().to_string().contains("equal key"));
    }

    #[test]
    fn disposed_collections_do_not_serialize() {
        let mut dictionary: Dictionary<u8, u8> = Dictionary::new();
        dictionary.dispose().unwrap();

        let error = serde_json::to_string(&dictionary).unwrap_err();
        assert!(error.to_string().contains("disposed"));
    }
}
