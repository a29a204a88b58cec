use crate::data::GameResponses;
use crate::model::colour::Colour;

/// What the participant sees when asked for a rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prompt {
    pub trial: usize,
    pub n_red: u32,
    pub opponent: Colour,
    pub selected_card: Option<Colour>,
    pub suspicion: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Response {
    pub rating: Option<f64>,
    pub latency_ms: Option<f64>,
}

/// Source of participant ratings; terminal prompts and replays both sit behind this.
pub trait Responder {
    fn respond(&mut self, prompt: &Prompt) -> Response;
}

/// Simulation-only sessions: never rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentResponder;

impl Responder for SilentResponder {
    fn respond(&mut self, _prompt: &Prompt) -> Response {
        Response::default()
    }
}

/// Replays recorded ratings in trial order; answers nothing once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponder {
    ratings: Vec<f64>,
    latencies: Vec<f64>,
    cursor: usize,
}

impl ScriptedResponder {
    pub fn new(ratings: Vec<f64>) -> Self {
        Self {
            ratings,
            latencies: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_latencies(mut self, latencies: Vec<f64>) -> Self {
        self.latencies = latencies;
        self
    }

    pub fn from_game_responses(responses: &GameResponses) -> Self {
        Self::new(responses.honesty_rating.clone()).with_latencies(responses.rt_honesty.clone())
    }

    pub fn remaining(&self) -> usize {
        self.ratings.len().saturating_sub(self.cursor)
    }
}

impl Responder for ScriptedResponder {
    fn respond(&mut self, _prompt: &Prompt) -> Response {
        let index = self.cursor;
        self.cursor += 1;
        Response {
            rating: self.ratings.get(index).copied(),
            latency_ms: self.latencies.get(index).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            trial: 1,
            n_red: 2,
            opponent: Colour::Red,
            selected_card: None,
            suspicion: 0.0,
        }
    }

    #[test]
    fn scripted_responder_replays_in_order() {
        let mut responder = ScriptedResponder::new(vec![3.0, 5.0]).with_latencies(vec![812.0]);
        assert_eq!(
            responder.respond(&prompt()),
            Response {
                rating: Some(3.0),
                latency_ms: Some(812.0)
            }
        );
        assert_eq!(responder.remaining(), 1);
        assert_eq!(responder.respond(&prompt()).rating, Some(5.0));
        assert_eq!(responder.respond(&prompt()), Response::default());
    }

    #[test]
    fn stored_responses_replay_ratings_with_their_latencies() {
        let record = serde_json::json!({
            "randomPick": [1, 3],
            "randomPickColour": [-1, 1],
            "reportColour": [1, 1],
            "RTreport": [500.0, 420.0],
            "honestyRating": [4.0, 2.0],
            "RThonesty": [930.0, 655.0],
            "results": [1, -1],
            "catchRating": [0.0, 1.0],
            "RTcatch": [300.0, 310.0]
        });
        let responses = GameResponses::from_value(&record).unwrap();
        let mut responder = ScriptedResponder::from_game_responses(&responses);

        assert_eq!(responder.remaining(), 2);
        assert_eq!(
            responder.respond(&prompt()),
            Response {
                rating: Some(4.0),
                latency_ms: Some(930.0)
            }
        );
        assert_eq!(
            responder.respond(&prompt()),
            Response {
                rating: Some(2.0),
                latency_ms: Some(655.0)
            }
        );
        assert_eq!(responder.remaining(), 0);
    }

    #[test]
    fn silent_responder_returns_nothing() {
        assert_eq!(SilentResponder.respond(&prompt()), Response::default());
    }
}
