use crate::models::{Feedback, Interaction};

pub const LIKE_REWARD: f64 = 1.0;
pub const DISLIKE_REWARD: f64 = -0.5;

/// Rewards produced by one interaction event.
///
/// A like or dislike yields one reward, reported watch progress yields
/// another (`watched / 100`). Each reward is a separate arm pull.
pub fn rewards_for(interaction: &Interaction) -> Vec<f64> {
    let mut rewards = Vec::with_capacity(2);

    match interaction.feedback {
        Feedback::Liked => rewards.push(LIKE_REWARD),
        Feedback::Disliked => rewards.push(DISLIKE_REWARD),
        Feedback::Neutral => {}
    }

    if interaction.watched_percent.is_some() {
        rewards.push(interaction.watched_fraction());
    }

    rewards
}
