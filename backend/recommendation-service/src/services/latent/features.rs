use crate::models::{Feedback, Interaction, InteractionRecord, UserId};
use ndarray::Array2;
use std::collections::BTreeMap;

pub const USER_FEATURE_COUNT: usize = 6;

/// Watch percentage above which an interaction counts as completed.
const COMPLETION_THRESHOLD: u8 = 80;

/// Behavioural summary of one user's history:
/// `[count, mean watch %, like ratio, dislike ratio, completion ratio, engagement]`.
pub fn user_features(history: &[Interaction]) -> Option<[f64; USER_FEATURE_COUNT]> {
    if history.is_empty() {
        return None;
    }

    let n = history.len() as f64;
    let ratio = |pred: fn(&Interaction) -> bool| {
        history.iter().filter(|i| pred(*i)).count() as f64 / n
    };

    let mean_watch = history
        .iter()
        .map(|i| f64::from(i.watched_percent.unwrap_or(0)))
        .sum::<f64>()
        / n;

    let engagement = history
        .iter()
        .map(|i| {
            let weight = match i.feedback {
                Feedback::Liked => 1.5,
                Feedback::Disliked => 0.5,
                Feedback::Neutral => 1.0,
            };
            i.watched_fraction() * weight
        })
        .sum::<f64>()
        / n;

    Some([
        n,
        mean_watch,
        ratio(|i| i.feedback == Feedback::Liked),
        ratio(|i| i.feedback == Feedback::Disliked),
        ratio(|i| i.watched_percent.unwrap_or(0) > COMPLETION_THRESHOLD),
        engagement,
    ])
}

/// Feature matrix for every user in `records`, rows ordered by user id.
pub fn user_feature_matrix(records: &[InteractionRecord]) -> (Vec<UserId>, Array2<f64>) {
    let mut histories: BTreeMap<UserId, Vec<Interaction>> = BTreeMap::new();
    for record in records {
        histories
            .entry(record.user_id)
            .or_default()
            .push(record.interaction);
    }

    let mut user_ids = Vec::with_capacity(histories.len());
    let mut matrix = Array2::zeros((histories.len(), USER_FEATURE_COUNT));

    for (user_id, history) in histories {
        if let Some(features) = user_features(&history) {
            let row = user_ids.len();
            for (col, value) in features.iter().enumerate() {
                matrix[[row, col]] = *value;
            }
            user_ids.push(user_id);
        }
    }

    (user_ids, matrix)
}
