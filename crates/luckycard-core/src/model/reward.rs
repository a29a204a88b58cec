use core::fmt;
use serde::{Deserialize, Serialize};

use crate::model::colour::Colour;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundResult {
    Win,
    Loss,
    Tie,
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RoundResult::Win => "win",
            RoundResult::Loss => "loss",
            RoundResult::Tie => "tie",
        };
        f.write_str(label)
    }
}

/// Points awarded to both sides for one round, from the player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScore {
    pub player: i8,
    pub opponent: i8,
    pub result: RoundResult,
}

/// How matching colours are scored. Mismatches are always zero-sum: blue beats red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicy {
    #[default]
    TieScoresZero,
    TieBothLose,
    TieBothWin,
}

impl RewardPolicy {
    pub fn score(self, opponent: Colour, player: Colour) -> RoundScore {
        match (opponent, player) {
            (Colour::Blue, Colour::Red) => RoundScore {
                player: -1,
                opponent: 1,
                result: RoundResult::Loss,
            },
            (Colour::Red, Colour::Blue) => RoundScore {
                player: 1,
                opponent: -1,
                result: RoundResult::Win,
            },
            _ => {
                let points = match self {
                    RewardPolicy::TieScoresZero => 0,
                    RewardPolicy::TieBothLose => -1,
                    RewardPolicy::TieBothWin => 1,
                };
                RoundScore {
                    player: points,
                    opponent: points,
                    result: RoundResult::Tie,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatches_are_zero_sum() {
        for policy in [
            RewardPolicy::TieScoresZero,
            RewardPolicy::TieBothLose,
            RewardPolicy::TieBothWin,
        ] {
            let loss = policy.score(Colour::Blue, Colour::Red);
            assert_eq!((loss.player, loss.opponent), (-1, 1));
            assert_eq!(loss.result, RoundResult::Loss);

            let win = policy.score(Colour::Red, Colour::Blue);
            assert_eq!((win.player, win.opponent), (1, -1));
            assert_eq!(win.result, RoundResult::Win);
        }
    }

    #[test]
    fn ties_follow_policy() {
        let zero = RewardPolicy::TieScoresZero.score(Colour::Red, Colour::Red);
        assert_eq!((zero.player, zero.opponent), (0, 0));
        let lose = RewardPolicy::TieBothLose.score(Colour::Blue, Colour::Blue);
        assert_eq!((lose.player, lose.opponent), (-1, -1));
        let win = RewardPolicy::TieBothWin.score(Colour::Red, Colour::Red);
        assert_eq!((win.player, win.opponent), (1, 1));
        assert_eq!(win.result, RoundResult::Tie);
    }

    #[test]
    fn policy_names_are_snake_case() {
        let policy: RewardPolicy = serde_json::from_str("\"tie_both_lose\"").unwrap();
        assert_eq!(policy, RewardPolicy::TieBothLose);
        assert_eq!(RewardPolicy::default(), RewardPolicy::TieScoresZero);
    }
}
