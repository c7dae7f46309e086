//! Minimal `tf.train.Example` protobuf messages, enough to read one int64 feature.
//!
//! Field numbers follow `tensorflow/core/example/{example,feature}.proto`.

use prost::Message;
use std::collections::HashMap;

#[derive(Clone, PartialEq, Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),

        #[prost(message, tag = "2")]
        FloatList(super::FloatList),

        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

/// First value of the int64 feature `name`, if `bytes` is an `Example` that has one.
pub fn int64_feature(bytes: &[u8], name: &str) -> Option<i64> {
    let example = Example::decode(bytes).ok()?;

    match example.features?.feature.get(name)?.kind.as_ref()? {
        feature::Kind::Int64List(list) => list.value.first().copied(),
        _ => None,
    }
}

/// Build an `Example` holding a single int64 feature. Used to produce test data.
pub fn example_with_int64(name: &str, value: i64) -> Vec<u8> {
    let mut feature = HashMap::new();
    feature.insert(
        name.to_string(),
        Feature {
            kind: Some(feature::Kind::Int64List(Int64List { value: vec![value] })),
        },
    );

    Example {
        features: Some(Features { feature }),
    }
    .encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int64_feature() {
        let bytes = example_with_int64("label", 2);

        assert_eq!(int64_feature(&bytes, "label"), Some(2));
        assert_eq!(int64_feature(&bytes, "other"), None);
    }

    #[test]
    fn test_non_int64_feature() {
        let mut feature = HashMap::new();
        feature.insert(
            "label".to_string(),
            Feature {
                kind: Some(feature::Kind::BytesList(BytesList {
                    value: vec![b"cat".to_vec()],
                })),
            },
        );

        let bytes = Example {
            features: Some(Features { feature }),
        }
        .encode_to_vec();

        assert_eq!(int64_feature(&bytes, "label"), None);
    }

    #[test]
    fn test_not_an_example() {
        assert_eq!(int64_feature(&[0xff, 0xff, 0xff], "label"), None);
    }
}
