//! Filters and pipelines sent to the server.

use bson::{doc, Document};
use check_core::{DocumentKey, OrderedFind, RandomOperator, RandomSample, KEY_FIELD};

/// Ascending `_id` sort.
pub fn key_ascending() -> Document {
    doc! { KEY_FIELD: 1 }
}

/// Storage order hint for full scans.
pub fn natural_order() -> Document {
    doc! { "$natural": 1 }
}

pub fn ordered_filter(query: &OrderedFind) -> Document {
    match &query.min_key {
        Some(key) => doc! { KEY_FIELD: { "$gte": key.as_bson().clone() } },
        None => doc! {},
    }
}

pub fn key_filter(key: &DocumentKey) -> Document {
    doc! { KEY_FIELD: key.as_bson().clone() }
}

pub fn sample_pipeline(sample: &RandomSample) -> Vec<Document> {
    match *sample {
        RandomSample::Reservoir { size } => {
            vec![doc! { "$sample": { "size": size as i64 } }]
        }
        RandomSample::Bernoulli {
            probability,
            operator: RandomOperator::SampleRate,
        } => vec![doc! { "$match": { "$sampleRate": probability } }],
        RandomSample::Bernoulli {
            probability,
            operator: RandomOperator::Rand,
        } => vec![doc! { "$match": { "$expr": { "$lt": [ { "$rand": {} }, probability ] } } }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn test_ordered_filter_without_bound() {
        assert_eq!(ordered_filter(&OrderedFind::at_offset(3)), doc! {});
    }

    #[test]
    fn test_ordered_filter_with_bound() {
        let filter = ordered_filter(&OrderedFind::step_from(DocumentKey::new(10), 5));
        assert_eq!(filter, doc! { "_id": { "$gte": 10 } });
    }

    #[test]
    fn test_key_filter() {
        assert_eq!(
            key_filter(&DocumentKey::new("abc")),
            doc! { "_id": "abc" }
        );
    }

    #[test]
    fn test_reservoir_pipeline() {
        let pipeline = sample_pipeline(&RandomSample::Reservoir { size: 50 });
        assert_eq!(pipeline, vec![doc! { "$sample": { "size": 50_i64 } }]);
    }

    #[test]
    fn test_sample_rate_pipeline() {
        let pipeline = sample_pipeline(&RandomSample::Bernoulli {
            probability: 0.25,
            operator: RandomOperator::SampleRate,
        });
        assert_eq!(pipeline, vec![doc! { "$match": { "$sampleRate": 0.25 } }]);
    }

    #[test]
    fn test_rand_pipeline() {
        let pipeline = sample_pipeline(&RandomSample::Bernoulli {
            probability: 0.1,
            operator: RandomOperator::Rand,
        });
        let expr = pipeline[0]
            .get_document("$match")
            .unwrap()
            .get_document("$expr")
            .unwrap();
        let lt = expr.get_array("$lt").unwrap();
        assert_eq!(lt[1], Bson::Double(0.1));
    }
}
